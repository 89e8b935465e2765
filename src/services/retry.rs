//! Bounded retry with exponential backoff for outbound API calls
//!
//! Transient failures (timeouts, connection errors, 429, 5xx) are retried
//! with delays of `base_delay * 2^(n-1)` capped at `max_delay`. Everything
//! else is terminal and returned after the first attempt.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::types::{ApiError, RetryError};

/// Retry tuning for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Applied by the transport to each attempt independently
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Suspension point between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A successful call and how many attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
    pub elapsed: Duration,
}

pub struct RetryableCaller<S = ThreadSleeper> {
    policy: RetryPolicy,
    sleeper: S,
}

impl RetryableCaller<ThreadSleeper> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, ThreadSleeper)
    }
}

impl<S: Sleeper> RetryableCaller<S> {
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Run `operation` until it succeeds, fails terminally, or the attempt
    /// budget is spent. The closure receives the 1-based attempt number.
    pub fn invoke<T, F>(&self, mut operation: F) -> Result<Attempted<T>, RetryError>
    where
        F: FnMut(u32) -> Result<T, ApiError>,
    {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt) {
                Ok(value) => {
                    debug!(attempt, "call succeeded");
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    });
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(attempts = attempt, error = %err, "retry budget exhausted");
                    } else {
                        debug!(attempt, error = %err, "terminal failure, not retrying");
                    }
                    return Err(RetryError {
                        source: err,
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    });
                }
            }
        }
    }
}
