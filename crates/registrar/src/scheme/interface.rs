use chrono::{DateTime, FixedOffset};

use crate::{Allocation, Disambiguator, Result};

/// When a counter starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    /// Once the post-increment sequence exceeds `max_sequence`, the
    /// auxiliary digit advances (mod 10) and the sequence restarts at 1.
    Overflow { max_sequence: u64 },
    /// The sequence restarts at 0 with a fresh disambiguator whenever the
    /// record was last written in an earlier calendar month.
    Calendar,
    /// The counter key already changes with the period; nothing rotates.
    Fixed,
}

/// Describes one family of identifiers: which counter it draws from, how
/// that counter rotates, how allocations are rendered and which record field
/// must not already hold the result.
pub trait IdScheme: Send + Sync {
    /// Business-record field that stores identifiers of this scheme.
    fn field(&self) -> &str;

    fn rotation(&self) -> RotationPolicy;

    /// Counter key that `now` allocates from.
    fn period_key(&self, now: &DateTime<FixedOffset>) -> String;

    /// Disambiguator for a counter created (or calendar-rotated) at `now`.
    fn seed(&self, now: &DateTime<FixedOffset>) -> Disambiguator;

    /// Renders an allocation as an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// the allocation cannot be represented (wrong disambiguator kind, a
    /// sequence wider than the format allows).
    fn format(&self, allocation: &Allocation) -> Result<String>;
}
