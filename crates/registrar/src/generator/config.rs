use core::time::Duration;

/// Bounds on the per-identifier retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct RetryConfig {
    /// Attempts per identifier, including the first.
    pub max_attempts: u32,
    /// Backoff unit in milliseconds; attempt `n` sleeps `n * base_delay_ms`
    /// after a transient failure.
    pub base_delay_ms: u64,
    /// Upper bound on one attempt's store work, in milliseconds.
    pub attempt_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            attempt_timeout_ms: 5_000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Linear backoff after the `attempt`-th failure (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay().saturating_mul(attempt)
    }
}
