//! Retry delays for region loads.
//!
//! Each failure doubles the delay up to a cap; a success resets it.

use std::time::Duration;

/// Tracks consecutive load failures for one region.
#[derive(Debug, Clone)]
pub struct RetryTracker {
    failures: u32,
    current: Duration,
    initial: Duration,
    max: Duration,
}

impl RetryTracker {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            failures: 0,
            current: initial,
            initial,
            max: max.max(initial),
        }
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn record_failure(&mut self) -> Duration {
        let delay = self.current;
        self.failures += 1;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.current = self.initial;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay the next failure will wait.
    pub fn next_delay(&self) -> Duration {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_failure() {
        let mut tracker = RetryTracker::new(Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(tracker.record_failure(), Duration::from_secs(1));
        assert_eq!(tracker.record_failure(), Duration::from_secs(2));
        assert_eq!(tracker.record_failure(), Duration::from_secs(4));
        assert_eq!(tracker.next_delay(), Duration::from_secs(8));
        assert_eq!(tracker.failures(), 3);
    }

    #[test]
    fn delay_caps_at_max() {
        let mut tracker = RetryTracker::new(Duration::from_secs(1), Duration::from_secs(60));
        for _ in 0..10 {
            tracker.record_failure();
        }
        // 1 → 2 → 4 → 8 → 16 → 32 → 60 → 60 …
        assert_eq!(tracker.next_delay(), Duration::from_secs(60));
    }

    #[test]
    fn success_resets() {
        let mut tracker = RetryTracker::new(Duration::from_millis(10), Duration::from_secs(1));
        tracker.record_failure();
        tracker.record_failure();
        tracker.record_success();
        assert_eq!(tracker.failures(), 0);
        assert_eq!(tracker.next_delay(), Duration::from_millis(10));
    }

    #[test]
    fn max_below_initial_keeps_initial() {
        let mut tracker = RetryTracker::new(Duration::from_secs(5), Duration::from_secs(1));
        tracker.record_failure();
        assert_eq!(tracker.next_delay(), Duration::from_secs(5));
    }
}
