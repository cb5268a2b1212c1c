//! Exponential backoff for connection establishment.

use std::time::Duration;

/// Retry schedule: `base`, `base * multiplier`, `base * multiplier²`, ...
/// for at most `max_retries` retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    multiplier: u32,
    max_retries: u32,
}

impl Backoff {
    /// Creates a schedule. A multiplier of zero is treated as one.
    #[must_use]
    pub const fn new(base: Duration, multiplier: u32, max_retries: u32) -> Self {
        Self {
            base,
            multiplier: if multiplier == 0 { 1 } else { multiplier },
            max_retries,
        }
    }

    /// A schedule that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(Duration::ZERO, 1, 0)
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `retry` (zero-based), or `None` once the
    /// schedule is exhausted.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Option<Duration> {
        if retry >= self.max_retries {
            return None;
        }
        let factor = self.multiplier.saturating_pow(retry);
        Some(self.base.saturating_mul(factor))
    }

    /// Iterates over every delay in the schedule.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).filter_map(|retry| self.delay(retry))
    }
}

impl Default for Backoff {
    /// One second, doubling, three retries.
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 2, 3)
    }
}
