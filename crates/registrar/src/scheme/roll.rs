use chrono::{DateTime, FixedOffset};

use crate::{
    Allocation, Disambiguator, Error, IdScheme, Result, RollConfig, RotationPolicy,
    codec::{format_roll_number, roll_period_key},
};

/// Student roll numbers: `YYMMDD-C-SS`, one counter per local calendar day.
#[derive(Debug, Clone)]
pub struct RollNumberScheme {
    max_sequence: u64,
    field: String,
}

impl RollNumberScheme {
    pub fn new(config: &RollConfig) -> Self {
        Self {
            max_sequence: config.max_sequence,
            field: config.field.clone(),
        }
    }

    pub fn max_sequence(&self) -> u64 {
        self.max_sequence
    }
}

impl Default for RollNumberScheme {
    fn default() -> Self {
        Self::new(&RollConfig::default())
    }
}

impl IdScheme for RollNumberScheme {
    fn field(&self) -> &str {
        &self.field
    }

    fn rotation(&self) -> RotationPolicy {
        RotationPolicy::Overflow {
            max_sequence: self.max_sequence,
        }
    }

    fn period_key(&self, now: &DateTime<FixedOffset>) -> String {
        roll_period_key(now.date_naive())
    }

    fn seed(&self, _now: &DateTime<FixedOffset>) -> Disambiguator {
        Disambiguator::Digit(0)
    }

    fn format(&self, allocation: &Allocation) -> Result<String> {
        let digit = allocation.disambiguator.digit().ok_or_else(|| {
            Error::invalid(format!(
                "counter `{}` carries no auxiliary digit",
                allocation.key
            ))
        })?;
        format_roll_number(&allocation.key, digit, allocation.sequence)
    }
}
