use core::{fmt, str::FromStr};

use chrono::NaiveDate;

use super::check_segment;
use crate::{Error, Result};

/// Number of digits in the sequence part of a roll number.
pub const ROLL_SEQUENCE_WIDTH: usize = 2;

/// Largest sequence a roll number can carry before the auxiliary digit
/// rotates.
pub const MAX_ROLL_SEQUENCE: u64 = 99;

/// The auxiliary digit cycles through `0..AUX_DIGIT_RADIX`.
pub const AUX_DIGIT_RADIX: u8 = 10;

/// Returns the `YYMMDD` period key for `date`.
///
/// ```
/// use chrono::NaiveDate;
/// use registrar::codec::roll_period_key;
///
/// let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
/// assert_eq!(roll_period_key(date), "250314");
/// ```
pub fn roll_period_key(date: NaiveDate) -> String {
    date.format("%y%m%d").to_string()
}

/// Formats a roll number as `{period_key}-{aux_digit}-{sequence:02}`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `aux_digit` is not a single decimal
/// digit, if `sequence` does not fit in two digits, or if `period_key` is
/// empty or contains `-`.
///
/// ```
/// use registrar::codec::format_roll_number;
///
/// assert_eq!(format_roll_number("250314", 3, 7).unwrap(), "250314-3-07");
/// assert!(format_roll_number("250314", 10, 7).is_err());
/// assert!(format_roll_number("250314", 3, 100).is_err());
/// ```
pub fn format_roll_number(period_key: &str, aux_digit: u8, sequence: u64) -> Result<String> {
    check_segment("period key", period_key)?;
    if aux_digit >= AUX_DIGIT_RADIX {
        return Err(Error::invalid(format!(
            "auxiliary digit {aux_digit} is not a single decimal digit"
        )));
    }
    if sequence > MAX_ROLL_SEQUENCE {
        return Err(Error::invalid(format!(
            "sequence {sequence} does not fit in {ROLL_SEQUENCE_WIDTH} digits"
        )));
    }
    Ok(format!(
        "{period_key}-{aux_digit}-{sequence:0ROLL_SEQUENCE_WIDTH$}"
    ))
}

/// A parsed roll number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RollNumber {
    pub period_key: String,
    pub aux_digit: u8,
    pub sequence: u64,
}

impl fmt::Display for RollNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:0width$}",
            self.period_key,
            self.aux_digit,
            self.sequence,
            width = ROLL_SEQUENCE_WIDTH
        )
    }
}

impl FromStr for RollNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_roll_number(s)
    }
}

/// Parses `{period_key}-{aux_digit}-{sequence:02}` back into its parts.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] unless the input has exactly three
/// `-` separated segments, a single-digit auxiliary part and a two-digit
/// sequence.
///
/// ```
/// use registrar::codec::parse_roll_number;
///
/// let roll = parse_roll_number("250314-3-07").unwrap();
/// assert_eq!(roll.period_key, "250314");
/// assert_eq!(roll.aux_digit, 3);
/// assert_eq!(roll.sequence, 7);
/// ```
pub fn parse_roll_number(s: &str) -> Result<RollNumber> {
    let malformed = || Error::invalid(format!("`{s}` is not a roll number"));

    let mut parts = s.split('-');
    let (Some(period_key), Some(aux), Some(sequence), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    if period_key.is_empty() {
        return Err(malformed());
    }

    let aux_digit = match aux.as_bytes() {
        [d @ b'0'..=b'9'] => d - b'0',
        _ => return Err(malformed()),
    };

    if sequence.len() != ROLL_SEQUENCE_WIDTH || !sequence.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let sequence = sequence.parse().map_err(|_| malformed())?;

    Ok(RollNumber {
        period_key: period_key.to_owned(),
        aux_digit,
        sequence,
    })
}
