#![cfg_attr(docsrs, feature(doc_cfg))]
//! Sequential, human-readable identifiers allocated from shared counters.
//!
//! `registrar` turns a concurrently updated counter record into a
//! collision-free identifier: student roll numbers (`YYMMDD-C-SS`), monthly
//! invoice IDs (`INV-RRYYMM-NNN-XXX`) and daily checked invoice IDs
//! (`YYMMDDNNNNC`). Allocation runs inside a store transaction, every issued
//! identifier is checked against the business records that already carry one,
//! and contention is absorbed by a bounded retry loop.
//!
//! The store is an external collaborator described by the [`CounterStore`]
//! and [`RecordIndex`] traits. [`MemoryStore`] is a reference implementation
//! used by the tests and the operator CLI.

mod allocator;
pub mod codec;
mod config;
mod error;
mod futures;
mod generator;
mod guard;
mod preview;
mod rand;
mod registrar;
mod scheme;
mod store;
mod time;

pub use crate::allocator::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::futures::*;
pub use crate::generator::*;
pub use crate::guard::*;
pub use crate::preview::*;
pub use crate::rand::*;
pub use crate::registrar::*;
pub use crate::scheme::*;
pub use crate::store::*;
pub use crate::time::*;
