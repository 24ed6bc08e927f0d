use rand::{Rng, rng};

use crate::RandSource;

/// A `RandSource` backed by the thread-local RNG (`rand::rng()`).
///
/// The generator is ChaCha-based and reseeded from the OS, so suffix
/// characters are not predictable from earlier ones. They are still not a
/// security boundary: invoice IDs stay guessable through their sequence.
///
/// This type does not store the RNG; it reaches the thread-local generator on
/// each call, so it is `Send + Sync` and free to share.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource<u64> for ThreadRandom {
    fn rand(&self) -> u64 {
        rng().random()
    }
}
