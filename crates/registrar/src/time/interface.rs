use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use parking_lot::Mutex;

/// A trait for clocks that report the current wall-clock time.
///
/// Period keys (`YYMMDD`, invoice month prefixes) are derived from the
/// calendar date in the returned offset, so implementations decide which
/// timezone a "day" belongs to.
///
/// # Example
///
/// ```
/// use chrono::{DateTime, FixedOffset};
/// use registrar::TimeSource;
///
/// struct Noon;
/// impl TimeSource for Noon {
///     fn now(&self) -> DateTime<FixedOffset> {
///         DateTime::parse_from_rfc3339("2025-03-14T12:00:00+05:45").unwrap()
///     }
/// }
///
/// assert_eq!(Noon.now().date_naive().to_string(), "2025-03-14");
/// ```
pub trait TimeSource: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The system clock in the host's local timezone.
#[derive(Default, Clone, Copy, Debug)]
pub struct LocalClock;

impl TimeSource for LocalClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock that stays where it is put.
///
/// Useful for previewing or backfilling identifiers for a specific date, and
/// for tests that cross day or month boundaries. Clones share the same
/// instant.
#[derive(Clone, Debug)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<FixedOffset>>>,
}

impl FixedClock {
    /// Creates a clock frozen at `now`.
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Moves the clock (forwards or backwards) to `now`.
    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock() = now;
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_clones_share_the_instant() {
        let start = DateTime::parse_from_rfc3339("2025-03-14T08:00:00+00:00").unwrap();
        let later = DateTime::parse_from_rfc3339("2025-04-01T08:00:00+00:00").unwrap();

        let clock = FixedClock::new(start);
        let shared = clock.clone();
        assert_eq!(shared.now(), start);

        clock.set(later);
        assert_eq!(shared.now(), later);
    }
}
