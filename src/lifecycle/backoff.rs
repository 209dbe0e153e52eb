//! Exponential reconnect delay.

use std::time::Duration;

/// Reconnect delay that doubles on every consecutive failure.
///
/// Attempts are unbounded. The delay returns to `base` as soon as a
/// connection is established.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    current: Duration,
    consecutive_failures: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            current: base,
            consecutive_failures: 0,
        }
    }

    /// Record a failure and return the delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        delay
    }

    /// Clear the failure count after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.base;
        self.consecutive_failures = 0;
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }
}
