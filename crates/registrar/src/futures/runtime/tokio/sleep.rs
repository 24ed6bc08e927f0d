use core::{future::Future, time::Duration};

use crate::futures::SleepProvider;

/// An implementation of [`SleepProvider`] using Tokio's timer.
///
/// This is the default provider for use in async applications built on Tokio.
pub struct TokioSleep;
impl SleepProvider for TokioSleep {
    async fn sleep_for(dur: Duration) {
        tokio::time::sleep(dur).await
    }

    async fn timeout<F>(dur: Duration, fut: F) -> Option<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        tokio::time::timeout(dur, fut).await.ok()
    }
}

/// An implementation of [`SleepProvider`] using Tokio's yield.
///
/// Backoff between attempts becomes a single trip through the scheduler,
/// which keeps retries responsive in low-concurrency scenarios. Under heavy
/// contention the retries bunch up and collide again, so a timer-based sleep
/// (e.g., [`TokioSleep`]) is usually the better choice.
///
/// Attempt timeouts still use Tokio's timer.
pub struct TokioYield;
impl SleepProvider for TokioYield {
    async fn sleep_for(_dur: Duration) {
        tokio::task::yield_now().await
    }

    async fn timeout<F>(dur: Duration, fut: F) -> Option<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        tokio::time::timeout(dur, fut).await.ok()
    }
}
