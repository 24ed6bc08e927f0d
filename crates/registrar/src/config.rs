use crate::{
    Error, Result, RetryConfig,
    codec::{MAX_PADDING_WIDTH, MAX_ROLL_SEQUENCE},
};

/// Longest random suffix an invoice ID may carry.
pub const MAX_RANDOM_CHARS: usize = 16;

/// Everything a [`Registrar`](crate::Registrar) needs besides its store and
/// clock.
///
/// With the `serde` feature every section and field is optional on input
/// and falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct GeneratorConfig {
    pub retry: RetryConfig,
    pub roll: RollConfig,
    pub invoice: InvoiceConfig,
    pub daily_invoice: DailyInvoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct RollConfig {
    /// Largest sequence before the auxiliary digit rotates.
    pub max_sequence: u64,
    pub field: String,
}

impl Default for RollConfig {
    fn default() -> Self {
        Self {
            max_sequence: MAX_ROLL_SEQUENCE,
            field: "registration_no".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct InvoiceConfig {
    pub counter_name: String,
    pub padding_width: usize,
    /// Length of the random suffix; `0` drops the segment.
    pub random_chars: usize,
    pub field: String,
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            counter_name: "invoice".into(),
            padding_width: 3,
            random_chars: 3,
            field: "invoiceId".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct DailyInvoiceConfig {
    /// Counter keys are `{namespace}:{YYMMDD}`.
    pub namespace: String,
    pub padding_width: usize,
    pub field: String,
}

impl Default for DailyInvoiceConfig {
    fn default() -> Self {
        Self {
            namespace: "daily-invoice".into(),
            padding_width: 4,
            field: "invoiceId".into(),
        }
    }
}

impl GeneratorConfig {
    /// Checks that every value can produce well-formed identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid("retry.max_attempts must be at least 1"));
        }
        if self.roll.max_sequence == 0 || self.roll.max_sequence > MAX_ROLL_SEQUENCE {
            return Err(Error::invalid(format!(
                "roll.max_sequence must be within 1..={MAX_ROLL_SEQUENCE}"
            )));
        }
        check_width("invoice.padding_width", self.invoice.padding_width)?;
        check_width(
            "daily_invoice.padding_width",
            self.daily_invoice.padding_width,
        )?;
        if self.invoice.random_chars > MAX_RANDOM_CHARS {
            return Err(Error::invalid(format!(
                "invoice.random_chars must be at most {MAX_RANDOM_CHARS}"
            )));
        }
        check_name("invoice.counter_name", &self.invoice.counter_name)?;
        check_name("daily_invoice.namespace", &self.daily_invoice.namespace)?;
        for (name, field) in [
            ("roll.field", &self.roll.field),
            ("invoice.field", &self.invoice.field),
            ("daily_invoice.field", &self.daily_invoice.field),
        ] {
            if field.is_empty() {
                return Err(Error::invalid(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

fn check_width(name: &str, width: usize) -> Result<()> {
    if width == 0 || width > MAX_PADDING_WIDTH {
        return Err(Error::invalid(format!(
            "{name} must be within 1..={MAX_PADDING_WIDTH}"
        )));
    }
    Ok(())
}

fn check_name(name: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains(':') {
        return Err(Error::invalid(format!(
            "{name} must be non-empty and free of ':'"
        )));
    }
    Ok(())
}
