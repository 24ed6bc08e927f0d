use crate::{Error, RandSource, Result};

/// Default alphabet for random identifier characters.
///
/// Digits and uppercase letters without `0`, `O`, `1` and `I`, which are easy
/// to confuse when read aloud or copied by hand.
pub const SUFFIX_ALPHABET: &str = "23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Draws `len` characters from `alphabet` using `rng`.
///
/// Each character is chosen as `rng.rand() % alphabet.len()`; the modulo bias
/// is negligible for a 64-bit source and short alphabets.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `alphabet` is empty, is not ASCII,
/// or contains the `-` separator.
///
/// ```
/// use registrar::{RandSource, codec::{SUFFIX_ALPHABET, random_suffix}};
///
/// struct Zero;
/// impl RandSource<u64> for Zero {
///     fn rand(&self) -> u64 {
///         0
///     }
/// }
///
/// assert_eq!(random_suffix(3, SUFFIX_ALPHABET, &Zero).unwrap(), "222");
/// assert!(random_suffix(3, "", &Zero).is_err());
/// ```
pub fn random_suffix<R>(len: usize, alphabet: &str, rng: &R) -> Result<String>
where
    R: RandSource<u64> + ?Sized,
{
    if alphabet.is_empty() || !alphabet.is_ascii() || alphabet.contains('-') {
        return Err(Error::invalid(format!(
            "alphabet `{alphabet}` must be non-empty ASCII without '-'"
        )));
    }
    Ok(draw(len, alphabet.as_bytes(), rng))
}

/// [`random_suffix`] over [`SUFFIX_ALPHABET`], which cannot fail.
pub fn confusable_free_suffix<R>(len: usize, rng: &R) -> String
where
    R: RandSource<u64> + ?Sized,
{
    draw(len, SUFFIX_ALPHABET.as_bytes(), rng)
}

fn draw<R>(len: usize, alphabet: &[u8], rng: &R) -> String
where
    R: RandSource<u64> + ?Sized,
{
    let n = alphabet.len() as u64;
    (0..len)
        .map(|_| char::from(alphabet[(rng.rand() % n) as usize]))
        .collect()
}
