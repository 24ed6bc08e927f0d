//! Operator CLI internals.
//!
//! - [`config`] - command-line arguments and their validation.
//! - [`commands`] - runs one command against a JSON-backed store.
//! - [`telemetry`] - console logging.

pub mod commands;
pub mod config;
pub mod telemetry;
