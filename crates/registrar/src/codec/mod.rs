//! Pure formatting and parsing of identifiers.
//!
//! Nothing in this module touches a store or a clock: identical inputs always
//! produce identical output (random suffixes take their randomness from an
//! explicit [`RandSource`](crate::RandSource)).

mod checked;
mod invoice;
mod roll;
mod suffix;

pub use checked::*;
pub use invoice::*;
pub use roll::*;
pub use suffix::*;

/// Number of decimal digits needed to print `n`.
pub(crate) fn decimal_width(n: u64) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}

/// `padding_width` as a minimum: wide enough for `sequence` in any case.
pub(crate) fn widened(sequence: u64, padding_width: usize) -> usize {
    padding_width.max(decimal_width(sequence))
}

/// Rejects empty segments and segments that would break `-` separated parsing.
pub(crate) fn check_segment(name: &str, value: &str) -> crate::Result<()> {
    if value.is_empty() {
        return Err(crate::Error::invalid(format!("{name} must not be empty")));
    }
    if value.contains('-') {
        return Err(crate::Error::invalid(format!(
            "{name} `{value}` must not contain '-'"
        )));
    }
    Ok(())
}
