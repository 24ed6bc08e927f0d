use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use portable_atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex as KeyLock, OwnedMutexGuard};

use super::{CounterRecord, CounterStore, Disambiguator, RecordIndex, Transaction};
use crate::StoreError;

/// An in-process [`CounterStore`] and [`RecordIndex`].
///
/// Each counter key behaves like a document with a write lock: the first
/// time a transaction touches a key it takes that key's lock and keeps it
/// until it commits, aborts or is dropped. Other transactions touching the
/// same key wait. Re-touching a key inside the same transaction does not
/// wait, so a batch can allocate many identifiers under one session.
///
/// Writes are applied immediately and are **not** rolled back on abort:
/// a sequence consumed by an aborted attempt stays consumed, the same as a
/// store whose counter lives outside the business transaction.
///
/// Clones share state.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    locks: Mutex<HashMap<String, Arc<KeyLock<()>>>>,
    commits: AtomicU64,
    aborts: AtomicU64,
}

#[derive(Debug, Default)]
struct State {
    counters: HashMap<String, CounterRecord>,
    records: HashMap<String, HashSet<String>>,
}

/// A point-in-time copy of a [`MemoryStore`], ordered for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Snapshot {
    pub counters: BTreeMap<String, CounterRecord>,
    /// Identifier values per business-record field.
    pub records: BTreeMap<String, BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from a [`Snapshot`].
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let state = State {
            counters: snapshot.counters.into_iter().collect(),
            records: snapshot
                .records
                .into_iter()
                .map(|(field, values)| (field, values.into_iter().collect()))
                .collect(),
        };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                ..Inner::default()
            }),
        }
    }

    /// Copies out the current counters and records.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.inner.state.lock();
        Snapshot {
            counters: state
                .counters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            records: state
                .records
                .iter()
                .map(|(field, values)| (field.clone(), values.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Registers a business record carrying `value` in `field`. Returns
    /// `false` if it was already present.
    pub fn insert_record(&self, field: &str, value: impl Into<String>) -> bool {
        self.inner
            .state
            .lock()
            .records
            .entry(field.to_owned())
            .or_default()
            .insert(value.into())
    }

    /// Registers many business records under `field`.
    pub fn extend_records<I>(&self, field: &str, values: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.inner
            .state
            .lock()
            .records
            .entry(field.to_owned())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Number of transactions committed so far.
    pub fn commits(&self) -> u64 {
        self.inner.commits.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.inner.locks.lock().len()
    }

    /// Number of transactions aborted (explicitly or by drop) so far.
    pub fn aborts(&self) -> u64 {
        self.inner.aborts.load(Ordering::Relaxed)
    }

    fn check_owner(&self, tx: &MemoryTx) -> Result<(), StoreError> {
        if Arc::ptr_eq(&self.inner, &tx.inner) {
            Ok(())
        } else {
            Err(StoreError::Backend(
                "transaction belongs to a different store".into(),
            ))
        }
    }
}

/// A [`MemoryStore`] session holding the locks of the keys it touched.
#[derive(Debug)]
pub struct MemoryTx {
    inner: Arc<Inner>,
    held: HashMap<String, OwnedMutexGuard<()>>,
    open: bool,
}

impl MemoryTx {
    async fn lock(&mut self, key: &str) {
        if self.held.contains_key(key) {
            return;
        }
        let lock = self
            .inner
            .locks
            .lock()
            .entry(key.to_owned())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        self.held.insert(key.to_owned(), guard);
    }

    fn finish(&mut self, committed: bool) {
        self.open = false;
        let released: Vec<String> = self.held.drain().map(|(key, _guard)| key).collect();
        self.prune(released);
        let counter = if committed {
            &self.inner.commits
        } else {
            &self.inner.aborts
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops the lock entries of `keys` that nobody holds or waits for.
    ///
    /// Waiters clone the lock under the map mutex, so a strong count of one
    /// means the entry is idle and the next transaction can recreate it.
    fn prune(&self, keys: Vec<String>) {
        let mut locks = self.inner.locks.lock();
        for key in keys {
            if locks.get(&key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(&key);
            }
        }
    }
}

impl Transaction for MemoryTx {
    async fn commit(mut self) -> Result<(), StoreError> {
        self.finish(true);
        Ok(())
    }

    async fn abort(mut self) -> Result<(), StoreError> {
        self.finish(false);
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.open {
            self.finish(false);
        }
    }
}

impl CounterStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        Ok(MemoryTx {
            inner: Arc::clone(&self.inner),
            held: HashMap::new(),
            open: true,
        })
    }

    async fn increment(
        &self,
        tx: &mut MemoryTx,
        key: &str,
        by: u64,
        seed: &Disambiguator,
        now: DateTime<FixedOffset>,
    ) -> Result<CounterRecord, StoreError> {
        self.check_owner(tx)?;
        tx.lock(key).await;

        let mut state = self.inner.state.lock();
        let record = state
            .counters
            .entry(key.to_owned())
            .or_insert_with(|| CounterRecord {
                key: key.to_owned(),
                sequence: 0,
                disambiguator: seed.clone(),
                last_updated: now,
            });
        record.sequence = record
            .sequence
            .checked_add(by)
            .ok_or_else(|| StoreError::Backend(format!("counter `{key}` overflowed")))?;
        record.last_updated = now;
        Ok(record.clone())
    }

    async fn set(
        &self,
        tx: &mut MemoryTx,
        key: &str,
        sequence: u64,
        disambiguator: Disambiguator,
        now: DateTime<FixedOffset>,
    ) -> Result<CounterRecord, StoreError> {
        self.check_owner(tx)?;
        tx.lock(key).await;

        let record = CounterRecord {
            key: key.to_owned(),
            sequence,
            disambiguator,
            last_updated: now,
        };
        self.inner
            .state
            .lock()
            .counters
            .insert(key.to_owned(), record.clone());
        Ok(record)
    }

    async fn get_in(
        &self,
        tx: &mut MemoryTx,
        key: &str,
    ) -> Result<Option<CounterRecord>, StoreError> {
        self.check_owner(tx)?;
        tx.lock(key).await;
        Ok(self.inner.state.lock().counters.get(key).cloned())
    }

    async fn get(&self, key: &str) -> Result<Option<CounterRecord>, StoreError> {
        Ok(self.inner.state.lock().counters.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.inner.state.lock().counters.remove(key).is_some())
    }
}

impl RecordIndex<MemoryTx> for MemoryStore {
    async fn exists(&self, tx: &mut MemoryTx, field: &str, value: &str) -> Result<bool, StoreError> {
        self.check_owner(tx)?;
        Ok(self
            .inner
            .state
            .lock()
            .records
            .get(field)
            .is_some_and(|values| values.contains(value)))
    }

    async fn find_existing(&self, field: &str, values: &[String]) -> Result<Vec<String>, StoreError> {
        let state = self.inner.state.lock();
        let Some(known) = state.records.get(field) else {
            return Ok(Vec::new());
        };
        Ok(values
            .iter()
            .filter(|v| known.contains(v.as_str()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-03-14T09:00:00+00:00").unwrap()
    }

    #[tokio::test]
    async fn increment_upserts_from_the_seed() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let first = store
            .increment(&mut tx, "250314", 1, &Disambiguator::Digit(0), now())
            .await
            .unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(first.disambiguator, Disambiguator::Digit(0));

        // The seed only applies on insert.
        let second = store
            .increment(&mut tx, "250314", 1, &Disambiguator::Digit(7), now())
            .await
            .unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(second.disambiguator, Disambiguator::Digit(0));

        tx.commit().await.unwrap();
        assert_eq!(store.commits(), 1);
        assert_eq!(store.get("250314").await.unwrap().unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn aborted_writes_stay_consumed() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        store
            .increment(&mut tx, "k", 1, &Disambiguator::None, now())
            .await
            .unwrap();
        tx.abort().await.unwrap();

        assert_eq!(store.aborts(), 1);
        assert_eq!(store.get("k").await.unwrap().unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn dropping_an_open_transaction_counts_as_abort() {
        let store = MemoryStore::new();
        {
            let _tx = store.begin().await.unwrap();
        }
        assert_eq!(store.aborts(), 1);
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn touched_keys_stay_locked_until_the_transaction_ends() {
        let store = MemoryStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        store
            .increment(&mut first, "k", 1, &Disambiguator::None, now())
            .await
            .unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            store.increment(&mut second, "k", 1, &Disambiguator::None, now()),
        )
        .await;
        assert!(blocked.is_err());

        // Other keys are independent.
        store
            .increment(&mut second, "other", 1, &Disambiguator::None, now())
            .await
            .unwrap();

        first.commit().await.unwrap();
        let record = store
            .increment(&mut second, "k", 1, &Disambiguator::None, now())
            .await
            .unwrap();
        assert_eq!(record.sequence, 2);
        second.commit().await.unwrap();
        assert_eq!(store.lock_entries(), 0);
    }

    #[tokio::test]
    async fn released_key_locks_are_pruned() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        for key in ["250314", "250315", "250316"] {
            store
                .increment(&mut tx, key, 1, &Disambiguator::Digit(0), now())
                .await
                .unwrap();
        }
        assert_eq!(store.lock_entries(), 3);
        tx.commit().await.unwrap();
        assert_eq!(store.lock_entries(), 0);

        {
            let mut dropped = store.begin().await.unwrap();
            store.get_in(&mut dropped, "250314").await.unwrap();
            assert_eq!(store.lock_entries(), 1);
        }
        assert_eq!(store.lock_entries(), 0);
    }

    #[tokio::test]
    async fn set_overwrites_and_remove_deletes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        store
            .set(&mut tx, "k", 1, Disambiguator::Digit(4), now())
            .await
            .unwrap();
        let read = store.get_in(&mut tx, "k").await.unwrap().unwrap();
        assert_eq!(read.disambiguator, Disambiguator::Digit(4));
        tx.commit().await.unwrap();

        assert!(store.remove("k").await.unwrap());
        assert!(!store.remove("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn record_lookups() {
        let store = MemoryStore::new();
        store.extend_records("registration_no", ["250314-0-01", "250314-0-03"]);
        assert!(!store.insert_record("registration_no", "250314-0-01"));

        let mut tx = store.begin().await.unwrap();
        assert!(store.exists(&mut tx, "registration_no", "250314-0-03").await.unwrap());
        assert!(!store.exists(&mut tx, "registration_no", "250314-0-02").await.unwrap());
        assert!(!store.exists(&mut tx, "invoiceId", "250314-0-03").await.unwrap());
        tx.commit().await.unwrap();

        let candidates: Vec<String> = ["250314-0-03", "250314-0-02", "250314-0-01"]
            .map(String::from)
            .into();
        assert_eq!(
            store.find_existing("registration_no", &candidates).await.unwrap(),
            vec!["250314-0-03".to_string(), "250314-0-01".to_string()]
        );
        assert!(store.find_existing("missing", &candidates).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_foreign_transactions() {
        let a = MemoryStore::new();
        let b = MemoryStore::new();
        let mut tx = a.begin().await.unwrap();
        let err = b
            .increment(&mut tx, "k", 1, &Disambiguator::None, now())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn snapshot_restores_counters_and_records() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        store
            .increment(&mut tx, "250314", 5, &Disambiguator::Digit(2), now())
            .await
            .unwrap();
        tx.commit().await.unwrap();
        store.insert_record("registration_no", "250314-2-05");

        let snapshot = store.snapshot();
        let restored = MemoryStore::from_snapshot(snapshot.clone());
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.get("250314").await.unwrap().unwrap().sequence, 5);
        assert_eq!(restored.commits(), 0);
    }
}
