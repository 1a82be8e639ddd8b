//! Retry policy value object.
//!
//! The policy only describes *when* to retry; the loop that sleeps and
//! re-issues requests lives with the async runtime in the application crate.

use std::time::Duration;

/// Bounded retry with multiplicative backoff.
///
/// Attempt `n` (1-based) that fails is followed by a wait of
/// `initial_delay * growth_factor^(n - 1)`, unless it was the last attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub growth_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(2000),
            growth_factor: 1.5,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, growth_factor: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            growth_factor,
        }
    }

    /// A single attempt, never waiting.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after failed attempt `attempt` (1-based), or `None` when no attempt follows.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.attempts() {
            return None;
        }
        let factor = self.growth_factor.max(0.0).powi((attempt - 1) as i32);
        Some(self.initial_delay.mul_f64(factor))
    }

    /// Every wait a fully failing fetch goes through, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.attempts()).filter_map(|a| self.delay_after(a)).collect()
    }
}
