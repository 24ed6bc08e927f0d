use chrono::{DateTime, FixedOffset, Utc};

use crate::{
    Allocation, DailyInvoiceConfig, Disambiguator, Error, IdScheme, Result, RotationPolicy,
    codec::{format_checked_invoice_id, roll_period_key, widened},
};

/// Daily checked invoice IDs: `YYMMDDNNNNC`.
///
/// The day is taken in UTC regardless of the clock's offset. Counters are
/// stored under `{namespace}:{YYMMDD}` so they never share a document with
/// roll-number counters of the same day. As with monthly invoices, the
/// padding width is a minimum.
#[derive(Debug, Clone)]
pub struct DailyInvoiceScheme {
    namespace: String,
    padding_width: usize,
    field: String,
}

impl DailyInvoiceScheme {
    pub fn new(config: &DailyInvoiceConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            padding_width: config.padding_width,
            field: config.field.clone(),
        }
    }

    fn date_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.namespace.as_str())?.strip_prefix(':')
    }
}

impl Default for DailyInvoiceScheme {
    fn default() -> Self {
        Self::new(&DailyInvoiceConfig::default())
    }
}

impl IdScheme for DailyInvoiceScheme {
    fn field(&self) -> &str {
        &self.field
    }

    fn rotation(&self) -> RotationPolicy {
        RotationPolicy::Fixed
    }

    fn period_key(&self, now: &DateTime<FixedOffset>) -> String {
        let day = roll_period_key(now.with_timezone(&Utc).date_naive());
        format!("{}:{day}", self.namespace)
    }

    fn seed(&self, _now: &DateTime<FixedOffset>) -> Disambiguator {
        Disambiguator::None
    }

    fn format(&self, allocation: &Allocation) -> Result<String> {
        let date_key = self.date_key(&allocation.key).ok_or_else(|| {
            Error::invalid(format!(
                "counter `{}` is not a `{}` counter",
                allocation.key, self.namespace
            ))
        })?;
        let width = widened(allocation.sequence, self.padding_width);
        format_checked_invoice_id(date_key, allocation.sequence, width)
    }
}
