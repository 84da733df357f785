//! Bounded exponential-backoff retry for async operations.
//!
//! Every failure is retried, whatever its cause: the provider calls this wraps
//! fail in ways (timeouts, 5xx, rate limits, dropped connections) that are not
//! worth classifying for a once-a-day job. The delay doubles after each wait
//! and is never capped.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// How many times to retry and how long to wait before the first retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` means a single attempt.
    pub retries: u32,
    /// Wait before the first retry; doubles for each one after.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, initial_delay: Duration) -> Self {
        Self {
            retries,
            initial_delay,
        }
    }

    /// The waits this policy will perform if every attempt fails, in order.
    #[cfg(test)]
    pub(crate) fn delays(&self) -> impl Iterator<Item = Duration> {
        std::iter::successors(Some(self.initial_delay), |d| Some(d.saturating_mul(2)))
            .take(self.retries as usize)
    }
}

/// `delay` in milliseconds, pinned at `u64::MAX` once the doubling saturates.
fn whole_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Run `operation` until it succeeds or the policy's retries are spent.
///
/// Returns the first success as-is. When the last attempt fails its error is
/// returned unchanged. A warning is logged before every wait.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut remaining = policy.retries;
    let mut delay = policy.initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if remaining > 0 => {
                warn!(
                    remaining,
                    delay_ms = whole_millis(delay),
                    error = %err,
                    "Retrying in {}ms (remaining retries: {remaining})",
                    delay.as_millis()
                );
                sleep(delay).await;
                delay = delay.saturating_mul(2);
                remaining -= 1;
            }
            Err(err) => return Err(err),
        }
    }
}
