use core::{future::Future, time::Duration};

/// A trait that abstracts over how to sleep, and how to bound a future in
/// time, in async contexts.
///
/// This allows the generator's retry loop to be generic over runtimes like
/// `Tokio` or `Smol`.
pub trait SleepProvider {
    /// Waits for `dur` between retry attempts.
    fn sleep_for(dur: Duration) -> impl Future<Output = ()> + Send;

    /// Drives `fut` to completion unless `dur` elapses first, in which case
    /// `fut` is dropped and `None` is returned.
    fn timeout<F>(dur: Duration, fut: F) -> impl Future<Output = Option<F::Output>> + Send
    where
        F: Future + Send,
        F::Output: Send;
}
