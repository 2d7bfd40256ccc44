//! Fixed-budget retry with exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::Reporter;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff unit; the wait after attempt `n` is `unit * 2^n`.
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after the 1-based `attempt` failed: 2, 4, 8 ... units.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `op` until it succeeds or the attempt budget is spent.
///
/// `op` receives the 1-based attempt number. Waits happen only between
/// attempts; the final attempt's error is returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    reporter: &R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    R: Reporter + ?Sized,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max => return Err(e),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                reporter.warning(&format!("Download failed (attempt {attempt}/{max}): {e}"));
                reporter.info(&format!("Retrying in {}s...", delay.as_secs_f64()));
                tracing::debug!(attempt, ?delay, "backing off before retry");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
