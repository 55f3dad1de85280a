//! Exponential backoff for calls to external services.
//!
//! Waiting happens with `tokio::time::sleep`, so only the calling task is
//! suspended between attempts. Dropping the returned future abandons the
//! remaining attempts.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Upper bound of the random extra added to each delay, as a fraction of it.
const JITTER_RATIO: f64 = 0.3;

/// Classification of an error for retry purposes.
///
/// The default treats authorization failures, forbidden and not-found as
/// permanent; everything else is worth another attempt.
pub trait Retryable {
    fn status_code(&self) -> Option<u16> {
        None
    }

    fn is_retryable(&self) -> bool {
        !matches!(self.status_code(), Some(401 | 403 | 404))
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Base delay after the failed attempt `attempt` (0-indexed), before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter {
            return base;
        }
        let extra = rand::rng().random_range(0.0..JITTER_RATIO);
        (base + base.mul_f64(extra)).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_if(operation, |_| true).await
    }

    /// Like [`execute`](Self::execute), with an extra predicate that can veto a retry.
    pub async fn execute_if<T, E, F, Fut, P>(&self, mut operation: F, should_retry: P) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() || !should_retry(&err) {
                return Err(err);
            }
            if attempt + 1 >= max_attempts {
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            tracing::warn!(
                "Retry attempt {}/{max_attempts} after {}ms: {err}",
                attempt + 1,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
