use core::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

#[cfg(feature = "async-tokio")]
use crate::{LocalClock, TokioSleep};
use crate::{
    Backend, DailyInvoiceScheme, DryRunReport, Error, GeneratorConfig, IdGenerator, IdScheme,
    InvoiceScheme, PreviewEntry, PreviewSimulator, Result, RollNumberScheme, SleepProvider,
    TimeSource,
};

/// The counters a [`Registrar`] can reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum CounterKind {
    /// Today's roll-number counter.
    RollNumber,
    /// The monthly invoice counter.
    Invoice,
    /// Today's daily checked invoice counter.
    DailyInvoice,
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RollNumber => "roll-number",
            Self::Invoice => "invoice",
            Self::DailyInvoice => "daily-invoice",
        })
    }
}

/// Roll numbers, invoice IDs and previews over one shared store.
///
/// All generators share the store handle, the clock and one cancellation
/// token: [`Registrar::cancel`] stops every generator before its next
/// attempt.
///
/// ```
/// # #[cfg(all(feature = "memory", feature = "async-tokio"))]
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// use std::sync::Arc;
///
/// use registrar::{GeneratorConfig, MemoryStore, Registrar};
///
/// let registrar = Registrar::new(Arc::new(MemoryStore::new()), GeneratorConfig::default())?;
///
/// let preview = registrar.preview_next_roll_numbers(1).await?;
/// let issued = registrar.generate_roll_number().await?;
/// assert_eq!(preview[0].id, issued);
/// # Ok::<(), registrar::Error>(())
/// # }).unwrap();
/// ```
pub struct Registrar<B, C, Sl> {
    store: Arc<B>,
    clock: C,
    roll: IdGenerator<B, RollNumberScheme, C, Sl>,
    invoice: IdGenerator<B, InvoiceScheme, C, Sl>,
    daily_invoice: IdGenerator<B, DailyInvoiceScheme, C, Sl>,
    preview: PreviewSimulator<B, C>,
    cancel: CancellationToken,
}

#[cfg(feature = "async-tokio")]
impl<B> Registrar<B, LocalClock, TokioSleep>
where
    B: Backend,
{
    /// Creates a registrar on the local system clock and Tokio's timer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `config` does not validate.
    pub fn new(store: Arc<B>, config: GeneratorConfig) -> Result<Self> {
        Self::with_clock(store, config, LocalClock)
    }
}

impl<B, C, Sl> Registrar<B, C, Sl>
where
    B: Backend,
    C: TimeSource + Clone,
    Sl: SleepProvider,
{
    /// Creates a registrar on an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `config` does not validate.
    pub fn with_clock(store: Arc<B>, config: GeneratorConfig, clock: C) -> Result<Self> {
        config.validate()?;

        let cancel = CancellationToken::new();
        let roll_scheme = RollNumberScheme::new(&config.roll);
        let preview = PreviewSimulator::new(Arc::clone(&store), roll_scheme.clone(), clock.clone());
        let roll = IdGenerator::new(
            Arc::clone(&store),
            roll_scheme,
            config.retry.clone(),
            clock.clone(),
        )
        .with_cancellation(cancel.clone());
        let invoice = IdGenerator::new(
            Arc::clone(&store),
            InvoiceScheme::new(&config.invoice),
            config.retry.clone(),
            clock.clone(),
        )
        .with_cancellation(cancel.clone());
        let daily_invoice = IdGenerator::new(
            Arc::clone(&store),
            DailyInvoiceScheme::new(&config.daily_invoice),
            config.retry,
            clock.clone(),
        )
        .with_cancellation(cancel.clone());

        Ok(Self {
            store,
            clock,
            roll,
            invoice,
            daily_invoice,
            preview,
            cancel,
        })
    }

    pub fn store(&self) -> &Arc<B> {
        &self.store
    }

    pub fn roll_numbers(&self) -> &IdGenerator<B, RollNumberScheme, C, Sl> {
        &self.roll
    }

    pub fn invoices(&self) -> &IdGenerator<B, InvoiceScheme, C, Sl> {
        &self.invoice
    }

    pub fn daily_invoices(&self) -> &IdGenerator<B, DailyInvoiceScheme, C, Sl> {
        &self.daily_invoice
    }

    /// Issues the next roll number for today.
    ///
    /// # Errors
    ///
    /// See [`IdGenerator::generate_one`].
    pub async fn generate_roll_number(&self) -> Result<String> {
        self.roll.generate_one().await
    }

    /// Issues `count` roll numbers in one transaction, all or nothing.
    /// `count == 0` returns an empty list.
    ///
    /// # Errors
    ///
    /// See [`IdGenerator::generate_batch`].
    pub async fn reserve_roll_numbers(&self, count: usize) -> Result<Vec<String>> {
        self.roll.generate_batch(count).await
    }

    /// Issues the next monthly invoice ID.
    ///
    /// # Errors
    ///
    /// See [`IdGenerator::generate_one`].
    pub async fn generate_invoice_id(&self) -> Result<String> {
        self.invoice.generate_one().await
    }

    /// Issues `count` invoice IDs in one transaction, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `count` is zero, otherwise see
    /// [`IdGenerator::generate_batch`].
    pub async fn generate_invoice_id_batch(&self, count: usize) -> Result<Vec<String>> {
        if count == 0 {
            return Err(Error::invalid("invoice batch size must be at least 1"));
        }
        self.invoice.generate_batch(count).await
    }

    /// Issues the next daily checked invoice ID.
    ///
    /// # Errors
    ///
    /// See [`IdGenerator::generate_one`].
    pub async fn generate_daily_invoice_id(&self) -> Result<String> {
        self.daily_invoice.generate_one().await
    }

    /// Forecasts the next `count` roll numbers without writing anything.
    ///
    /// # Errors
    ///
    /// See [`PreviewSimulator::preview`].
    pub async fn preview_next_roll_numbers(&self, count: usize) -> Result<Vec<PreviewEntry>> {
        self.preview.preview(count).await
    }

    /// Forecasts the next `count` roll numbers and reports collisions with
    /// existing records.
    ///
    /// # Errors
    ///
    /// See [`PreviewSimulator::dry_run`].
    pub async fn dry_run_with_collision_report(&self, count: usize) -> Result<DryRunReport> {
        self.preview.dry_run(count).await
    }

    /// Deletes the current counter of `kind`. Returns whether one existed.
    ///
    /// The next allocation starts the counter over, so previously issued
    /// identifiers will come up again and be caught (and skipped) by the
    /// collision check.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn reset_counter(&self, kind: CounterKind) -> Result<bool> {
        let now = self.clock.now();
        let key = match kind {
            CounterKind::RollNumber => self.roll.scheme().period_key(&now),
            CounterKind::Invoice => self.invoice.scheme().period_key(&now),
            CounterKind::DailyInvoice => self.daily_invoice.scheme().period_key(&now),
        };
        let removed = self.store.remove(&key).await?;
        #[cfg(feature = "tracing")]
        tracing::info!(%kind, key = %key, removed, "counter reset");
        Ok(removed)
    }

    /// Stops every generator before its next attempt. Attempts already in
    /// flight finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(all(test, feature = "memory", feature = "async-tokio"))]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::{
        CounterStore, Disambiguator, FixedClock, MemoryStore, TokioYield, Transaction,
        codec::parse_invoice_id,
    };

    type TestRegistrar = Registrar<MemoryStore, FixedClock, TokioYield>;

    fn registrar(store: &Arc<MemoryStore>) -> TestRegistrar {
        let clock =
            FixedClock::new(DateTime::parse_from_rfc3339("2025-03-14T09:00:00+00:00").unwrap());
        Registrar::with_clock(Arc::clone(store), GeneratorConfig::default(), clock).unwrap()
    }

    async fn seed_roll_counter(store: &MemoryStore, sequence: u64, digit: u8) {
        let mut tx = store.begin().await.unwrap();
        store
            .set(
                &mut tx,
                "250314",
                sequence,
                Disambiguator::Digit(digit),
                DateTime::parse_from_rfc3339("2025-03-14T08:00:00+00:00").unwrap(),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn preview_matches_the_next_allocations() {
        let store = Arc::new(MemoryStore::new());
        seed_roll_counter(&store, 97, 4).await;
        let registrar = registrar(&store);

        let preview: Vec<String> = registrar
            .preview_next_roll_numbers(5)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();

        let mut issued = Vec::new();
        for _ in 0..5 {
            issued.push(registrar.generate_roll_number().await.unwrap());
        }
        assert_eq!(preview, issued);
        assert_eq!(
            issued,
            [
                "250314-4-98",
                "250314-4-99",
                "250314-5-01",
                "250314-5-02",
                "250314-5-03"
            ]
        );
    }

    #[tokio::test]
    async fn reserve_and_preview_agree() {
        let store = Arc::new(MemoryStore::new());
        let registrar = registrar(&store);

        let preview = registrar.preview_next_roll_numbers(3).await.unwrap();
        let reserved = registrar.reserve_roll_numbers(3).await.unwrap();
        let previewed: Vec<_> = preview.into_iter().map(|e| e.id).collect();
        assert_eq!(previewed, reserved);
        assert!(registrar.reserve_roll_numbers(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invoice_batch_of_zero_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let registrar = registrar(&store);

        assert!(matches!(
            registrar.generate_invoice_id_batch(0).await,
            Err(Error::InvalidArgument { .. })
        ));

        let batch = registrar.generate_invoice_id_batch(3).await.unwrap();
        let sequences: Vec<u64> = batch
            .iter()
            .map(|id| parse_invoice_id(id).unwrap().sequence)
            .collect();
        assert_eq!(sequences, [1, 2, 3]);
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn reset_counter_starts_over() {
        let store = Arc::new(MemoryStore::new());
        let registrar = registrar(&store);

        registrar.generate_roll_number().await.unwrap();
        registrar.generate_invoice_id().await.unwrap();
        registrar.generate_daily_invoice_id().await.unwrap();

        assert!(registrar.reset_counter(CounterKind::RollNumber).await.unwrap());
        assert!(!registrar.reset_counter(CounterKind::RollNumber).await.unwrap());
        assert!(registrar.reset_counter(CounterKind::Invoice).await.unwrap());
        assert!(registrar.reset_counter(CounterKind::DailyInvoice).await.unwrap());

        assert_eq!(registrar.generate_roll_number().await.unwrap(), "250314-0-01");
        let invoice = parse_invoice_id(&registrar.generate_invoice_id().await.unwrap()).unwrap();
        assert_eq!(invoice.sequence, 1);
    }

    #[tokio::test]
    async fn cancel_stops_every_generator() {
        let store = Arc::new(MemoryStore::new());
        let registrar = registrar(&store);
        registrar.cancel();

        assert!(registrar.is_cancelled());
        assert_eq!(registrar.generate_roll_number().await.unwrap_err(), Error::Cancelled);
        assert_eq!(registrar.generate_invoice_id().await.unwrap_err(), Error::Cancelled);
        assert_eq!(
            registrar.generate_daily_invoice_id().await.unwrap_err(),
            Error::Cancelled
        );
        assert_eq!(store.commits(), 0);
    }

    #[test]
    fn rejects_invalid_config() {
        let store = Arc::new(MemoryStore::new());
        let mut config = GeneratorConfig::default();
        config.retry.max_attempts = 0;
        let clock =
            FixedClock::new(DateTime::parse_from_rfc3339("2025-03-14T09:00:00+00:00").unwrap());
        assert!(TestRegistrar::with_clock(store, config, clock).is_err());
    }

    #[test]
    fn counter_kinds_display_in_kebab_case() {
        assert_eq!(CounterKind::RollNumber.to_string(), "roll-number");
        assert_eq!(CounterKind::DailyInvoice.to_string(), "daily-invoice");
    }
}
