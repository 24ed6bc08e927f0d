use chrono::{DateTime, FixedOffset};

use crate::{
    Allocation, Disambiguator, Error, IdScheme, InvoiceConfig, RandSource, Result,
    RotationPolicy, ThreadRandom,
    codec::{confusable_free_suffix, format_invoice_id, invoice_prefix, widened},
};

/// Random characters at the start of a monthly invoice prefix.
pub const INVOICE_PREFIX_CHARS: usize = 2;

/// Monthly invoice IDs: `INV-RRYYMM-NNN-XXX` from a single named counter.
///
/// The counter's prefix (`RR` random characters plus `YYMM`) is drawn when
/// the counter is created and again whenever a new calendar month starts,
/// at which point the sequence restarts.
///
/// The padding width is a minimum: a month that outgrows it keeps issuing
/// wider sequences (`INV-AB2503-1000-K9Q`) instead of failing.
#[derive(Debug, Clone)]
pub struct InvoiceScheme<R = ThreadRandom> {
    counter_name: String,
    padding_width: usize,
    random_chars: usize,
    field: String,
    rng: R,
}

impl InvoiceScheme<ThreadRandom> {
    pub fn new(config: &InvoiceConfig) -> Self {
        Self::with_rng(config, ThreadRandom)
    }
}

impl Default for InvoiceScheme<ThreadRandom> {
    fn default() -> Self {
        Self::new(&InvoiceConfig::default())
    }
}

impl<R> InvoiceScheme<R>
where
    R: RandSource<u64>,
{
    /// Creates a scheme that draws its random characters from `rng`.
    pub fn with_rng(config: &InvoiceConfig, rng: R) -> Self {
        Self {
            counter_name: config.counter_name.clone(),
            padding_width: config.padding_width,
            random_chars: config.random_chars,
            field: config.field.clone(),
            rng,
        }
    }

    pub fn counter_name(&self) -> &str {
        &self.counter_name
    }
}

impl<R> IdScheme for InvoiceScheme<R>
where
    R: RandSource<u64> + Send + Sync,
{
    fn field(&self) -> &str {
        &self.field
    }

    fn rotation(&self) -> RotationPolicy {
        RotationPolicy::Calendar
    }

    fn period_key(&self, _now: &DateTime<FixedOffset>) -> String {
        self.counter_name.clone()
    }

    fn seed(&self, now: &DateTime<FixedOffset>) -> Disambiguator {
        let random = confusable_free_suffix(INVOICE_PREFIX_CHARS, &self.rng);
        Disambiguator::Prefix(invoice_prefix(now.date_naive(), &random))
    }

    fn format(&self, allocation: &Allocation) -> Result<String> {
        let prefix = allocation.disambiguator.prefix().ok_or_else(|| {
            Error::invalid(format!(
                "counter `{}` carries no invoice prefix",
                allocation.key
            ))
        })?;
        let suffix = confusable_free_suffix(self.random_chars, &self.rng);
        let width = widened(allocation.sequence, self.padding_width);
        format_invoice_id(prefix, allocation.sequence, width, &suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Zero;
    impl RandSource<u64> for Zero {
        fn rand(&self) -> u64 {
            0
        }
    }

    fn march() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-03-14T12:00:00+00:00").unwrap()
    }

    #[test]
    fn seed_is_random_chars_then_year_month() {
        let scheme = InvoiceScheme::with_rng(&InvoiceConfig::default(), Zero);
        assert_eq!(
            scheme.seed(&march()),
            Disambiguator::Prefix("222503".into())
        );
        assert_eq!(scheme.period_key(&march()), "invoice");
    }

    #[test]
    fn formats_with_padding_and_suffix() {
        let scheme = InvoiceScheme::with_rng(&InvoiceConfig::default(), Zero);
        let allocation = Allocation {
            key: "invoice".into(),
            sequence: 12,
            disambiguator: Disambiguator::Prefix("AB2503".into()),
            rotated: false,
        };
        assert_eq!(scheme.format(&allocation).unwrap(), "INV-AB2503-012-222");
    }

    #[test]
    fn sequence_past_the_padding_widens() {
        let scheme = InvoiceScheme::with_rng(&InvoiceConfig::default(), Zero);
        let allocation = Allocation {
            key: "invoice".into(),
            sequence: 1000,
            disambiguator: Disambiguator::Prefix("AB2503".into()),
            rotated: false,
        };
        assert_eq!(scheme.format(&allocation).unwrap(), "INV-AB2503-1000-222");
    }
}
