use chrono::{DateTime, Datelike, FixedOffset};

/// The per-counter value that keeps otherwise equal sequences apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "kind", content = "value", rename_all = "snake_case")
)]
pub enum Disambiguator {
    /// The counter needs nothing beyond its key.
    #[default]
    None,
    /// Auxiliary check digit of a roll number, `0..=9`.
    Digit(u8),
    /// Invoice prefix: random characters followed by `YYMM`.
    Prefix(String),
}

impl Disambiguator {
    /// Returns the auxiliary digit, if this is a [`Disambiguator::Digit`].
    pub fn digit(&self) -> Option<u8> {
        match self {
            Self::Digit(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the prefix, if this is a [`Disambiguator::Prefix`].
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::Prefix(p) => Some(p),
            _ => None,
        }
    }
}

/// A persisted counter document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterRecord {
    /// Counter identity: a `YYMMDD` stamp or a fixed counter name.
    pub key: String,
    /// Last sequence handed out under `key`.
    pub sequence: u64,
    pub disambiguator: Disambiguator,
    /// When the record was last written.
    pub last_updated: DateTime<FixedOffset>,
}

impl CounterRecord {
    /// Returns `true` if the record was last written in a different calendar
    /// month (or year) than `now`.
    ///
    /// Both instants are compared in `now`'s offset.
    pub fn is_stale_month(&self, now: &DateTime<FixedOffset>) -> bool {
        let last = self.last_updated.with_timezone(&now.timezone());
        last.year() != now.year() || last.month() != now.month()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn record(last_updated: &str) -> CounterRecord {
        CounterRecord {
            key: "invoice".into(),
            sequence: 4,
            disambiguator: Disambiguator::Prefix("AB2503".into()),
            last_updated: at(last_updated),
        }
    }

    #[test]
    fn same_month_is_not_stale() {
        let r = record("2025-03-01T00:00:00+00:00");
        assert!(!r.is_stale_month(&at("2025-03-31T23:59:59+00:00")));
    }

    #[test]
    fn month_and_year_changes_are_stale() {
        let r = record("2025-03-31T23:59:59+00:00");
        assert!(r.is_stale_month(&at("2025-04-01T00:00:00+00:00")));
        assert!(r.is_stale_month(&at("2026-03-15T00:00:00+00:00")));
    }

    #[test]
    fn compares_in_the_callers_offset() {
        // 23:30 UTC on March 31st is already April 1st at +05:45.
        let r = record("2025-03-31T23:30:00+00:00");
        assert!(!r.is_stale_month(&at("2025-04-01T10:00:00+05:45")));
    }

    #[test]
    fn accessors_match_variants() {
        assert_eq!(Disambiguator::Digit(3).digit(), Some(3));
        assert_eq!(Disambiguator::Digit(3).prefix(), None);
        assert_eq!(Disambiguator::Prefix("X".into()).prefix(), Some("X"));
        assert_eq!(Disambiguator::None.digit(), None);
    }
}
