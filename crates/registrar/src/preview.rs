use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Backend, CollisionGuard, Error, IdScheme, Result, RollNumberScheme, TimeSource,
    codec::{AUX_DIGIT_RADIX, MAX_ROLL_SEQUENCE, format_roll_number},
};

/// One roll number the allocator would hand out.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreviewEntry {
    pub id: String,
    pub period_key: String,
    pub sequence: u64,
    pub aux_digit: u8,
    /// 1-based position in the preview.
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DryRunSummary {
    pub total_simulated: usize,
    pub potential_collisions: usize,
    /// Period key of the first entry, empty if nothing was simulated.
    pub start_key: String,
    /// Period key of the last entry, empty if nothing was simulated.
    pub end_key: String,
    /// `"{first}-{last}"` sequence numbers, empty if nothing was simulated.
    pub sequence_range: String,
}

impl DryRunSummary {
    fn new(simulated: &[PreviewEntry], potential_collisions: usize) -> Self {
        let (Some(first), Some(last)) = (simulated.first(), simulated.last()) else {
            return Self::default();
        };
        Self {
            total_simulated: simulated.len(),
            potential_collisions,
            start_key: first.period_key.clone(),
            end_key: last.period_key.clone(),
            sequence_range: format!("{}-{}", first.sequence, last.sequence),
        }
    }
}

/// The outcome of [`PreviewSimulator::dry_run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DryRunReport {
    pub simulated: Vec<PreviewEntry>,
    /// Simulated identifiers that existing records already carry.
    pub collisions: Vec<String>,
    pub summary: DryRunSummary,
}

/// Simulates `count` roll numbers under `period_key` without touching a
/// store.
///
/// Applies the allocator's overflow rule: after `max_sequence` the digit
/// advances (mod 10) and the sequence restarts at 1. A start already past
/// `max_sequence` is rotated before the first entry, and a start of 0 is
/// treated as 1, since the allocator never issues either.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `start_digit` is not a decimal
/// digit, if `max_sequence` is outside `1..=99`, or if `period_key` cannot be
/// formatted.
///
/// ```
/// use registrar::simulate_roll_numbers;
///
/// let entries = simulate_roll_numbers("250314", 3, 98, 4, 99).unwrap();
/// let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
/// assert_eq!(ids, ["250314-4-98", "250314-4-99", "250314-5-01"]);
/// assert_eq!(entries[2].index, 3);
/// ```
pub fn simulate_roll_numbers(
    period_key: &str,
    count: usize,
    start_sequence: u64,
    start_digit: u8,
    max_sequence: u64,
) -> Result<Vec<PreviewEntry>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if start_digit >= AUX_DIGIT_RADIX {
        return Err(Error::invalid(format!(
            "start digit {start_digit} is not a single decimal digit"
        )));
    }
    if max_sequence == 0 || max_sequence > MAX_ROLL_SEQUENCE {
        return Err(Error::invalid(format!(
            "max sequence {max_sequence} must be within 1..={MAX_ROLL_SEQUENCE}"
        )));
    }

    let mut sequence = start_sequence.max(1);
    let mut digit = start_digit;
    if sequence > max_sequence {
        sequence = 1;
        digit = (digit + 1) % AUX_DIGIT_RADIX;
    }

    let mut entries = Vec::with_capacity(count);
    for index in 1..=count {
        entries.push(PreviewEntry {
            id: format_roll_number(period_key, digit, sequence)?,
            period_key: period_key.to_owned(),
            sequence,
            aux_digit: digit,
            index,
        });
        sequence += 1;
        if sequence > max_sequence {
            sequence = 1;
            digit = (digit + 1) % AUX_DIGIT_RADIX;
        }
    }
    Ok(entries)
}

/// Read-only forecasting of roll numbers against live counter state.
pub struct PreviewSimulator<B, C> {
    store: Arc<B>,
    scheme: RollNumberScheme,
    guard: CollisionGuard<B>,
    clock: C,
}

impl<B, C> PreviewSimulator<B, C>
where
    B: Backend,
    C: TimeSource,
{
    pub fn new(store: Arc<B>, scheme: RollNumberScheme, clock: C) -> Self {
        let guard = CollisionGuard::new(Arc::clone(&store), scheme.field());
        Self {
            store,
            scheme,
            guard,
            clock,
        }
    }

    /// Forecasts the next `count` roll numbers for today.
    ///
    /// The counter is read once, outside any transaction, and never written.
    /// Concurrent allocations can overtake the forecast.
    ///
    /// # Errors
    ///
    /// Store read failures and the errors of [`simulate_roll_numbers`].
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub async fn preview(&self, count: usize) -> Result<Vec<PreviewEntry>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let key = self.scheme.period_key(&self.clock.now());
        let (start_sequence, start_digit) = match self.store.get(&key).await? {
            Some(record) => (
                record.sequence.saturating_add(1),
                record.disambiguator.digit().unwrap_or(0),
            ),
            None => (1, 0),
        };
        simulate_roll_numbers(
            &key,
            count,
            start_sequence,
            start_digit,
            self.scheme.max_sequence(),
        )
    }

    /// Returns the members of `ids` that existing records already carry.
    ///
    /// # Errors
    ///
    /// Store read failures.
    pub async fn find_collisions(&self, ids: &[String]) -> Result<Vec<String>> {
        Ok(self.guard.find_collisions::<B::Tx>(ids).await?)
    }

    /// Previews `count` roll numbers and reports which of them are taken.
    ///
    /// # Errors
    ///
    /// Same as [`PreviewSimulator::preview`].
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub async fn dry_run(&self, count: usize) -> Result<DryRunReport> {
        let simulated = self.preview(count).await?;
        let ids: Vec<String> = simulated.iter().map(|e| e.id.clone()).collect();
        let collisions = self.find_collisions(&ids).await?;
        let summary = DryRunSummary::new(&simulated, collisions.len());

        #[cfg(feature = "tracing")]
        tracing::info!(
            total = summary.total_simulated,
            collisions = summary.potential_collisions,
            range = %summary.sequence_range,
            "dry run finished"
        );

        Ok(DryRunReport {
            simulated,
            collisions,
            summary,
        })
    }
}
