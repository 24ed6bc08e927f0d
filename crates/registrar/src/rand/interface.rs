/// A trait for random sources that return random integers.
///
/// Invoice schemes draw their prefix and suffix characters from a
/// `RandSource`, which lets tests pin the output.
///
/// # Example
/// ```
/// use registrar::RandSource;
///
/// struct FixedRand;
/// impl RandSource<u64> for FixedRand {
///     fn rand(&self) -> u64 {
///         1234
///     }
/// }
///
/// let rng = FixedRand;
/// assert_eq!(rng.rand(), 1234);
/// ```
pub trait RandSource<T> {
    /// Returns a random integer.
    fn rand(&self) -> T;
}
