use super::{check_segment, decimal_width, invoice::check_padding};
use crate::{Error, Result};

const CHECK_RADIX: u32 = 36;

/// Computes the base-36 check character of `body`.
///
/// Every character is read as a base-36 digit (`0-9`, then `A-Z` in either
/// case), the values are summed, and the sum modulo 36 is rendered as an
/// uppercase base-36 digit.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `body` contains a character that is
/// not an ASCII letter or digit.
///
/// ```
/// use registrar::codec::check_character;
///
/// // 2+5+0+3+1+4 + 0+0+0+1 = 16 -> 'G'
/// assert_eq!(check_character("2503140001").unwrap(), 'G');
/// assert_eq!(check_character("Z1").unwrap(), '0');
/// ```
pub fn check_character(body: &str) -> Result<char> {
    let mut sum = 0u32;
    for c in body.chars() {
        let value = c.to_digit(CHECK_RADIX).ok_or_else(|| {
            Error::invalid(format!("`{c}` in `{body}` is not a base-36 digit"))
        })?;
        sum = (sum + value) % CHECK_RADIX;
    }
    char::from_digit(sum, CHECK_RADIX)
        .map(|c| c.to_ascii_uppercase())
        .ok_or_else(|| Error::invalid(format!("no check character for `{body}`")))
}

/// Formats a daily checked invoice ID: `{date_key}{sequence:0padding_width}{C}`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `date_key` is empty or not
/// alphanumeric, if `padding_width` is out of range, or if `sequence` needs
/// more than `padding_width` digits.
///
/// ```
/// use registrar::codec::format_checked_invoice_id;
///
/// let id = format_checked_invoice_id("250314", 1, 4).unwrap();
/// assert_eq!(id, "2503140001G");
/// assert_eq!(id.len(), 11);
/// ```
pub fn format_checked_invoice_id(
    date_key: &str,
    sequence: u64,
    padding_width: usize,
) -> Result<String> {
    check_segment("date key", date_key)?;
    check_padding(padding_width)?;
    if decimal_width(sequence) > padding_width {
        return Err(Error::invalid(format!(
            "sequence {sequence} does not fit in {padding_width} digits"
        )));
    }

    let mut id = format!("{date_key}{sequence:0padding_width$}");
    let check = check_character(&id)?;
    id.push(check);
    Ok(id)
}

/// Returns `true` if the last character of `id` is the check character of
/// the rest.
///
/// ```
/// use registrar::codec::verify_checked_invoice_id;
///
/// assert!(verify_checked_invoice_id("2503140001G"));
/// assert!(!verify_checked_invoice_id("2503140002G"));
/// assert!(!verify_checked_invoice_id("G"));
/// ```
pub fn verify_checked_invoice_id(id: &str) -> bool {
    let mut chars = id.chars();
    let Some(last) = chars.next_back() else {
        return false;
    };
    let body = chars.as_str();
    !body.is_empty() && matches!(check_character(body), Ok(c) if c == last)
}
