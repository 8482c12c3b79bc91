//! Bounded retries for idempotent reads.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use super::error::{ApiError, ApiResult};

/// Upper bound on a single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Exponential backoff with jitter.
///
/// Attempt `n` (1-based) that fails transiently waits
/// `base * 2^(n-1)` plus up to half of that again before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base: Duration,
}

impl RetryPolicy {
    /// `attempts` is the total number of tries, clamped to at least one.
    #[must_use]
    pub fn new(attempts: u32, base: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base,
        }
    }

    /// A single attempt.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            attempts: 1,
            base: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `op` until it succeeds, fails permanently or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `op`.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    let delay = self.delay_for(attempt, &err);
                    warn!(
                        request = label,
                        attempt,
                        max_attempts = self.attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retrying read"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn delay_for(&self, attempt: u32, err: &ApiError) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(MAX_DELAY);
        let half = u64::try_from(exp.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = if half == 0 {
            0
        } else {
            rand::rng().random_range(0..=half)
        };
        let delay = exp + Duration::from_millis(jitter);

        match err {
            ApiError::RateLimited(secs) => delay.max(Duration::from_secs(*secs)).min(MAX_DELAY),
            _ => delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}
