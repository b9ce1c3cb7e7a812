use crate::utils::constants::RETRY_FACTOR;
use std::time::Duration;

/// Exponential backoff schedule for transient fetch failures.
///
/// Iterating yields one delay per retry: `initial`, `initial * 2`, ... capped
/// at `max_delay`, for at most `max_retries` retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    max_retries: usize,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_retries,
        }
    }

    /// Fail on the first error.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 0)
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let max_delay = self.max_delay;
        std::iter::successors(Some(self.initial_delay), |d| {
            Some(d.saturating_mul(RETRY_FACTOR))
        })
        .map(move |d| d.min(max_delay))
        .take(self.max_retries)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        use crate::utils::constants::{
            DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INITIAL_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_SECS,
        };
        Self::new(
            Duration::from_millis(DEFAULT_RETRY_INITIAL_DELAY_MS),
            Duration::from_secs(DEFAULT_RETRY_MAX_DELAY_SECS),
            DEFAULT_MAX_RETRIES,
        )
    }
}
