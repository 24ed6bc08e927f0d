use core::future::Future;

use chrono::{DateTime, FixedOffset};

use super::{CounterRecord, Disambiguator};
use crate::StoreError;

/// A store session opened by [`CounterStore::begin`].
///
/// Ending the session is explicit: [`commit`](Transaction::commit) makes its
/// writes durable, [`abort`](Transaction::abort) discards whatever the store
/// is able to discard. Dropping an open transaction must behave like an
/// abort.
pub trait Transaction: Send + Sized {
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn abort(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Keyed counter documents with atomic fetch-and-increment.
///
/// Implementations provide the isolation the allocator relies on: two
/// transactions incrementing the same key must observe distinct
/// post-increment sequences, and a read followed by a write of the same key
/// inside one transaction must not interleave with another transaction's
/// write.
///
/// All methods take the transaction explicitly so the same store can serve
/// owned (one identifier) and borrowed (batch) scopes.
pub trait CounterStore: Send + Sync {
    type Tx: Transaction;

    /// Opens a new transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;

    /// Adds `by` to the sequence under `key` and returns the record after the
    /// write.
    ///
    /// A missing record is created as `{ sequence: 0, disambiguator: seed }`
    /// before the increment. `last_updated` is set to `now` either way.
    fn increment(
        &self,
        tx: &mut Self::Tx,
        key: &str,
        by: u64,
        seed: &Disambiguator,
        now: DateTime<FixedOffset>,
    ) -> impl Future<Output = Result<CounterRecord, StoreError>> + Send;

    /// Overwrites (or creates) the record under `key`.
    fn set(
        &self,
        tx: &mut Self::Tx,
        key: &str,
        sequence: u64,
        disambiguator: Disambiguator,
        now: DateTime<FixedOffset>,
    ) -> impl Future<Output = Result<CounterRecord, StoreError>> + Send;

    /// Reads the record under `key` inside `tx`.
    fn get_in(
        &self,
        tx: &mut Self::Tx,
        key: &str,
    ) -> impl Future<Output = Result<Option<CounterRecord>, StoreError>> + Send;

    /// Reads the record under `key` outside any transaction.
    fn get(&self, key: &str)
    -> impl Future<Output = Result<Option<CounterRecord>, StoreError>> + Send;

    /// Deletes the record under `key`, returning whether one existed.
    fn remove(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Read-only lookups against the business records that carry identifiers.
pub trait RecordIndex<Tx>: Send + Sync {
    /// Returns `true` if a record already stores `value` in `field`.
    fn exists(
        &self,
        tx: &mut Tx,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Returns the subset of `values` already stored in `field`, in input
    /// order.
    fn find_existing(
        &self,
        field: &str,
        values: &[String],
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}

/// A store that provides both counters and the record index, sharing one
/// transaction type.
pub trait Backend: CounterStore + RecordIndex<<Self as CounterStore>::Tx> {}

impl<T> Backend for T where T: CounterStore + RecordIndex<<T as CounterStore>::Tx> {}
