//! Retry timing for conflicting units of work.

use std::time::Duration;

/// How often and how patiently a conflicting unit of work is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first run. Zero disables retrying.
    pub max_retries: u32,
    /// Delay before every retry.
    pub initial_delay: Duration,
    /// Extra delay added per retry already made.
    pub delay_factor: Duration,
}

impl RetryConfig {
    /// Creates a configuration retrying up to `max_retries` times.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Creates a configuration with no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            delay_factor: Duration::ZERO,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the per-retry delay increment.
    #[must_use]
    pub fn with_delay_factor(mut self, factor: Duration) -> Self {
        self.delay_factor = factor;
        self
    }

    /// Delay before retry number `attempt` (0-indexed): linear backoff of
    /// `initial_delay + delay_factor * attempt`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_add(self.delay_factor.saturating_mul(attempt))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay: Duration::ZERO,
            delay_factor: Duration::from_millis(10),
        }
    }
}
