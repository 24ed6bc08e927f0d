use core::{fmt, str::FromStr};

use chrono::NaiveDate;

use super::{check_segment, decimal_width};
use crate::{Error, Result};

/// Leading tag of every monthly invoice ID.
pub const INVOICE_TAG: &str = "INV";

/// Widest sequence padding accepted; a `u64` never needs more.
pub const MAX_PADDING_WIDTH: usize = 20;

/// Builds the monthly invoice prefix `{disambiguator}{YY}{MM}`.
///
/// ```
/// use chrono::NaiveDate;
/// use registrar::codec::invoice_prefix;
///
/// let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
/// assert_eq!(invoice_prefix(date, "XZ"), "XZ2503");
/// ```
pub fn invoice_prefix(date: NaiveDate, disambiguator: &str) -> String {
    format!("{disambiguator}{}", date.format("%y%m"))
}

/// Formats `INV-{prefix}-{sequence:0padding_width}-{random_suffix}`.
///
/// An empty `random_suffix` drops the trailing segment entirely.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `padding_width` is zero or above
/// [`MAX_PADDING_WIDTH`], if `sequence` needs more digits than
/// `padding_width`, or if the prefix or suffix contain `-`.
///
/// ```
/// use registrar::codec::format_invoice_id;
///
/// let id = format_invoice_id("XZ2503", 1, 3, "A7B").unwrap();
/// assert_eq!(id, "INV-XZ2503-001-A7B");
/// assert!(format_invoice_id("XZ2503", 1000, 3, "A7B").is_err());
/// ```
pub fn format_invoice_id(
    prefix: &str,
    sequence: u64,
    padding_width: usize,
    random_suffix: &str,
) -> Result<String> {
    check_padding(padding_width)?;
    check_segment("invoice prefix", prefix)?;
    if random_suffix.contains('-') {
        return Err(Error::invalid(format!(
            "invoice suffix `{random_suffix}` must not contain '-'"
        )));
    }
    if decimal_width(sequence) > padding_width {
        return Err(Error::invalid(format!(
            "sequence {sequence} does not fit in {padding_width} digits"
        )));
    }

    let mut id = format!("{INVOICE_TAG}-{prefix}-{sequence:0padding_width$}");
    if !random_suffix.is_empty() {
        id.push('-');
        id.push_str(random_suffix);
    }
    Ok(id)
}

pub(crate) fn check_padding(padding_width: usize) -> Result<()> {
    if padding_width == 0 || padding_width > MAX_PADDING_WIDTH {
        return Err(Error::invalid(format!(
            "padding width {padding_width} must be within 1..={MAX_PADDING_WIDTH}"
        )));
    }
    Ok(())
}

/// A parsed monthly invoice ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InvoiceId {
    pub prefix: String,
    pub sequence: u64,
    /// Width the sequence was padded to.
    pub padding_width: usize,
    pub suffix: String,
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{INVOICE_TAG}-{}-{:0width$}",
            self.prefix,
            self.sequence,
            width = self.padding_width
        )?;
        if !self.suffix.is_empty() {
            write!(f, "-{}", self.suffix)?;
        }
        Ok(())
    }
}

impl FromStr for InvoiceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_invoice_id(s)
    }
}

/// Parses an ID produced by [`format_invoice_id`].
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the tag is missing, the prefix is
/// empty, or the sequence segment is not all digits.
///
/// ```
/// use registrar::codec::parse_invoice_id;
///
/// let invoice = parse_invoice_id("INV-XZ2503-042-A7B").unwrap();
/// assert_eq!(invoice.prefix, "XZ2503");
/// assert_eq!(invoice.sequence, 42);
/// assert_eq!(invoice.suffix, "A7B");
/// ```
pub fn parse_invoice_id(s: &str) -> Result<InvoiceId> {
    let malformed = || Error::invalid(format!("`{s}` is not an invoice ID"));

    let mut parts = s.split('-');
    if parts.next() != Some(INVOICE_TAG) {
        return Err(malformed());
    }
    let (Some(prefix), Some(sequence)) = (parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let suffix = parts.next().unwrap_or_default();
    if parts.next().is_some() || prefix.is_empty() {
        return Err(malformed());
    }
    if sequence.is_empty()
        || sequence.len() > MAX_PADDING_WIDTH
        || !sequence.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }

    Ok(InvoiceId {
        prefix: prefix.to_owned(),
        sequence: sequence.parse().map_err(|_| malformed())?,
        padding_width: sequence.len(),
        suffix: suffix.to_owned(),
    })
}
