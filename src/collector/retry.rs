//! Retry policy for outbound API calls.
//!
//! Implements capped exponential backoff with proportional jitter.
//! Server `Retry-After` hints are honored up to their own cap.

use crate::config::RetryConfig;
use crate::ApiError;
use rand::Rng;
use std::time::Duration;

const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Retry policy implementing exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per request, the first one included.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Cap for exponential growth.
    pub max_delay: Duration,
    /// Extra random delay as a fraction of the computed delay, in `[0, 1]`.
    pub jitter: f64,
    /// Longest `Retry-After` hint taken at face value.
    pub max_retry_after: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, jitter: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: if jitter.is_finite() {
                jitter.clamp(0.0, 1.0)
            } else {
                0.0
            },
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
        }
    }

    pub fn with_max_retry_after(mut self, max_retry_after: Duration) -> Self {
        self.max_retry_after = max_retry_after;
        self
    }

    /// Create a RetryPolicy from configuration settings.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.jitter,
        )
        .with_max_retry_after(Duration::from_millis(config.max_retry_after_ms))
    }

    /// A policy that never waits, for tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 0.0)
            .with_max_retry_after(Duration::ZERO)
    }

    /// Check if an error should be retried after `attempt` attempts.
    pub fn should_retry(&self, error: &ApiError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }

    /// Backoff after failed attempt number `attempt` (1-based).
    ///
    /// `min(max_delay, base_delay * 2^(attempt-1) * (1 + jitter * sample))`
    /// with `sample` in `[0, 1)`. Because jitter never exceeds the doubling,
    /// consecutive delays never decrease.
    pub fn backoff(&self, attempt: u32, sample: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let sample = sample.clamp(0.0, 1.0);
        let base = self.base_delay.as_secs_f64() * 2f64.powi(exponent);
        let delay = base * (1.0 + self.jitter * sample);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Backoff with the jitter sample drawn from `rng`.
    pub fn backoff_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        self.backoff(attempt, rng.gen::<f64>())
    }

    /// Wait before the next attempt: the larger of the capped hint and the backoff.
    pub fn delay_with<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        hint: Option<Duration>,
        rng: &mut R,
    ) -> Duration {
        let backoff = self.backoff_with(attempt, rng);
        match hint {
            Some(hint) => hint.min(self.max_retry_after).max(backoff),
            None => backoff,
        }
    }

    /// Same as `delay_with`, using the thread-local generator.
    pub fn next_delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        self.delay_with(attempt, hint, &mut rand::thread_rng())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
