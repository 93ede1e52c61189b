//! Reconnect backoff for the progress channel.

use std::time::Duration;

/// Default delay before the first reconnect attempt.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

/// Default ceiling for the reconnect delay.
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Default number of consecutive failed attempts before the failure is surfaced.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Capped exponential backoff with an optional ceiling on consecutive failures.
///
/// `max_attempts == 0` means reconnect until the caller cancels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (0-based count of consecutive failures
    /// already seen). Doubles from `initial_delay` and is capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // 2^31 already exceeds any sane ceiling
        let factor = 2_u32.saturating_pow(attempt.min(31));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether `failures` consecutive failed attempts exhaust the policy.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        self.max_attempts > 0 && failures >= self.max_attempts
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_attempts == 0
    }
}
