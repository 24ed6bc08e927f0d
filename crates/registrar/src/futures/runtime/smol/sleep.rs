use core::{future::Future, time::Duration};

use smol::Timer;

use crate::futures::SleepProvider;

async fn race_timer<F>(dur: Duration, fut: F) -> Option<F::Output>
where
    F: Future,
{
    smol::future::or(async { Some(fut.await) }, async {
        Timer::after(dur).await;
        None
    })
    .await
}

/// An implementation of [`SleepProvider`] using Smol's timer.
///
/// This is the default provider for use in async applications built on Smol.
pub struct SmolSleep;
impl SleepProvider for SmolSleep {
    async fn sleep_for(dur: Duration) {
        Timer::after(dur).await;
    }

    async fn timeout<F>(dur: Duration, fut: F) -> Option<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        race_timer(dur, fut).await
    }
}

/// An implementation of [`SleepProvider`] using Smol's yield.
///
/// Backoff between attempts becomes a single trip through the scheduler,
/// which keeps retries responsive in low-concurrency scenarios. Under heavy
/// contention the retries bunch up and collide again, so a timer-based sleep
/// (e.g., [`SmolSleep`]) is usually the better choice.
///
/// Attempt timeouts still use Smol's timer.
pub struct SmolYield;
impl SleepProvider for SmolYield {
    async fn sleep_for(_dur: Duration) {
        smol::future::yield_now().await;
    }

    async fn timeout<F>(dur: Duration, fut: F) -> Option<F::Output>
    where
        F: Future + Send,
        F::Output: Send,
    {
        race_timer(dur, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_drops_slow_futures() {
        smol::block_on(async {
            let slow = async {
                Timer::after(Duration::from_secs(10)).await;
                7
            };
            assert_eq!(SmolSleep::timeout(Duration::from_millis(20), slow).await, None);
            assert_eq!(
                SmolSleep::timeout(Duration::from_millis(20), async { 7 }).await,
                Some(7)
            );
        });
    }
}
