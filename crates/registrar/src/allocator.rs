use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    CounterStore, Disambiguator, IdScheme, RotationPolicy, StoreError, codec::AUX_DIGIT_RADIX,
};

/// The counter state one allocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Allocation {
    pub key: String,
    pub sequence: u64,
    pub disambiguator: Disambiguator,
    /// `true` if this allocation reset the counter.
    pub rotated: bool,
}

/// Draws the next sequence from a [`CounterStore`] and applies the scheme's
/// [`RotationPolicy`].
///
/// The allocator never retries and never checks for collisions; store
/// failures are returned unchanged so the caller can decide.
#[derive(Debug)]
pub struct SequenceAllocator<B, S> {
    store: Arc<B>,
    scheme: S,
}

impl<B, S> SequenceAllocator<B, S>
where
    B: CounterStore,
    S: IdScheme,
{
    pub fn new(store: Arc<B>, scheme: S) -> Self {
        Self { store, scheme }
    }

    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    pub fn store(&self) -> &Arc<B> {
        &self.store
    }

    /// Allocates one sequence inside `tx`.
    ///
    /// 1. With [`RotationPolicy::Calendar`], a record last written in an
    ///    earlier month is reset to sequence 0 with a fresh seed.
    /// 2. The sequence is incremented, creating the record from the scheme's
    ///    seed if needed.
    /// 3. With [`RotationPolicy::Overflow`], a sequence past the maximum
    ///    advances the digit and restarts at 1.
    ///
    /// # Errors
    ///
    /// Any [`StoreError`] from the store. Overflow rotation of a record that
    /// carries no digit is a [`StoreError::Backend`].
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self, tx)))]
    pub async fn allocate(
        &self,
        tx: &mut B::Tx,
        now: DateTime<FixedOffset>,
    ) -> Result<Allocation, StoreError> {
        let key = self.scheme.period_key(&now);
        let seed = self.scheme.seed(&now);
        let policy = self.scheme.rotation();
        let mut rotated = false;

        if policy == RotationPolicy::Calendar {
            if let Some(record) = self.store.get_in(tx, &key).await? {
                if record.is_stale_month(&now) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(key = %key, previous = ?record.disambiguator, "calendar rotation");
                    self.store.set(tx, &key, 0, seed.clone(), now).await?;
                    rotated = true;
                }
            }
        }

        let mut record = self.store.increment(tx, &key, 1, &seed, now).await?;

        if let RotationPolicy::Overflow { max_sequence } = policy {
            if record.sequence > max_sequence {
                let digit = record.disambiguator.digit().ok_or_else(|| {
                    StoreError::Backend(format!("counter `{key}` has no digit to rotate"))
                })?;
                let next = (digit + 1) % AUX_DIGIT_RADIX;
                #[cfg(feature = "tracing")]
                tracing::debug!(key = %key, from = digit, to = next, "overflow rotation");
                record = self
                    .store
                    .set(tx, &key, 1, Disambiguator::Digit(next), now)
                    .await?;
                rotated = true;
            }
        }

        Ok(Allocation {
            key,
            sequence: record.sequence,
            disambiguator: record.disambiguator,
            rotated,
        })
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::{
        InvoiceConfig, InvoiceScheme, MemoryStore, RandSource, RollNumberScheme, Transaction,
    };

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    async fn allocate<S: IdScheme>(
        allocator: &SequenceAllocator<MemoryStore, S>,
        now: DateTime<FixedOffset>,
    ) -> Allocation {
        let mut tx = allocator.store().begin().await.unwrap();
        let allocation = allocator.allocate(&mut tx, now).await.unwrap();
        tx.commit().await.unwrap();
        allocation
    }

    #[tokio::test]
    async fn first_allocation_starts_at_one() {
        let allocator =
            SequenceAllocator::new(Arc::new(MemoryStore::new()), RollNumberScheme::default());
        let now = at("2025-03-14T09:00:00+00:00");

        let first = allocate(&allocator, now).await;
        assert_eq!(
            first,
            Allocation {
                key: "250314".into(),
                sequence: 1,
                disambiguator: Disambiguator::Digit(0),
                rotated: false,
            }
        );
        assert_eq!(allocate(&allocator, now).await.sequence, 2);
    }

    #[tokio::test]
    async fn overflow_advances_the_digit_and_wraps_nine_to_zero() {
        let store = Arc::new(MemoryStore::new());
        let allocator = SequenceAllocator::new(Arc::clone(&store), RollNumberScheme::default());
        let now = at("2025-03-14T09:00:00+00:00");

        let mut tx = store.begin().await.unwrap();
        store
            .set(&mut tx, "250314", 99, Disambiguator::Digit(9), now)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let rotated = allocate(&allocator, now).await;
        assert_eq!(rotated.sequence, 1);
        assert_eq!(rotated.disambiguator, Disambiguator::Digit(0));
        assert!(rotated.rotated);

        let next = allocate(&allocator, now).await;
        assert_eq!(next.sequence, 2);
        assert_eq!(next.disambiguator, Disambiguator::Digit(0));
        assert!(!next.rotated);
    }

    #[tokio::test]
    async fn new_day_new_counter() {
        let allocator =
            SequenceAllocator::new(Arc::new(MemoryStore::new()), RollNumberScheme::default());
        allocate(&allocator, at("2025-03-14T09:00:00+00:00")).await;
        let next_day = allocate(&allocator, at("2025-03-15T09:00:00+00:00")).await;
        assert_eq!(next_day.key, "250315");
        assert_eq!(next_day.sequence, 1);
    }

    struct Counting(portable_atomic::AtomicU64);
    impl RandSource<u64> for Counting {
        fn rand(&self) -> u64 {
            self.0.fetch_add(1, portable_atomic::Ordering::Relaxed)
        }
    }

    #[tokio::test]
    async fn calendar_rotation_resets_sequence_and_prefix() {
        let scheme = InvoiceScheme::with_rng(
            &InvoiceConfig::default(),
            Counting(portable_atomic::AtomicU64::new(0)),
        );
        let allocator = SequenceAllocator::new(Arc::new(MemoryStore::new()), scheme);

        let march = at("2025-03-31T10:00:00+00:00");
        let a = allocate(&allocator, march).await;
        let b = allocate(&allocator, march).await;
        assert_eq!((a.sequence, b.sequence), (1, 2));
        let march_prefix = a.disambiguator.prefix().unwrap().to_owned();
        assert!(march_prefix.ends_with("2503"));
        assert_eq!(b.disambiguator, a.disambiguator);

        let april = allocate(&allocator, at("2025-04-01T10:00:00+00:00")).await;
        assert_eq!(april.sequence, 1);
        assert!(april.rotated);
        let april_prefix = april.disambiguator.prefix().unwrap();
        assert!(april_prefix.ends_with("2504"));
        assert_ne!(&april_prefix[..2], &march_prefix[..2]);
    }
}
