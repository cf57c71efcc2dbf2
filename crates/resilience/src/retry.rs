//! Bounded retry with exponential backoff.

use std::time::Duration;

/// Retry policy: bounded attempts with exponential backoff.
///
/// The delay before attempt `n + 1` is `base_delay * multiplier^(n-1)`,
/// capped at `max_delay`. Which errors are worth retrying is decided by the
/// caller through a predicate, so business rejections can pass through
/// untouched while transient conflicts are absorbed here.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Backoff growth factor per attempt.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt bound and default backoff.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Returns the backoff delay after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let millis = self.base_delay.as_millis() as f64 * self.multiplier.powi(exp as i32);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Runs `operation` until it succeeds, fails non-retryably, or the
    /// attempt budget is exhausted.
    ///
    /// `should_retry` inspects each error; a `false` return propagates the
    /// error immediately. The final attempt's error is propagated as-is, so
    /// callers can distinguish "exhausted retries" by the error they passed
    /// through the predicate.
    pub async fn run<T, E, F, Fut, P>(&self, should_retry: P, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && should_retry(&e) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying after backoff");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
