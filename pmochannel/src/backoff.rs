//! Bounded multiplicative retry delay.

use crate::constants::{RETRY_BASE_MS, RETRY_MAX_MS, RETRY_MULTIPLIER};
use std::time::Duration;

/// Retry delay for consecutive failed cycles
///
/// Starts at the base delay; each [`Backoff::grow`] multiplies it by
/// [`RETRY_MULTIPLIER`] (floored to the millisecond) up to the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(RETRY_BASE_MS),
            Duration::from_millis(RETRY_MAX_MS),
        )
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: base,
        }
    }

    /// Delay to wait before the next retry
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Grow the delay after a failure and return the new value
    pub fn grow(&mut self) -> Duration {
        let grown = (self.current.as_millis() as f64 * RETRY_MULTIPLIER).floor() as u64;
        self.current = Duration::from_millis(grown).min(self.max);
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence() {
        let mut backoff = Backoff::default();
        let mut observed = vec![backoff.current().as_millis()];
        for _ in 0..5 {
            observed.push(backoff.grow().as_millis());
        }
        assert_eq!(observed, vec![3000, 5100, 8670, 14739, 20000, 20000]);
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut backoff = Backoff::default();
        backoff.grow();
        backoff.grow();
        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_millis(3000));
    }

    #[test]
    fn test_custom_bounds() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(200));
        assert_eq!(backoff.grow(), Duration::from_millis(170));
        assert_eq!(backoff.grow(), Duration::from_millis(200));
    }
}
