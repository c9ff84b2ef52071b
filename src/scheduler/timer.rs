//! Countdown timer advanced by caller-supplied elapsed time

use std::time::Duration;

/// A countdown with a fixed reset period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerTimer {
    period: Duration,
    remaining: Duration,
}

impl SchedulerTimer {
    /// Create a timer that first fires one full period from now
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            remaining: period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Restart the countdown from the full period
    pub fn reset(&mut self) {
        self.remaining = self.period;
    }

    /// Advance by `elapsed`; returns true when the countdown reached zero.
    ///
    /// Overshoot carries into the next countdown. A tick longer than a whole
    /// period still fires only once and restarts from the full period.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        if elapsed < self.remaining {
            self.remaining -= elapsed;
            return false;
        }

        let overshoot = elapsed - self.remaining;
        self.remaining = match self.period.checked_sub(overshoot) {
            Some(rest) if !rest.is_zero() => rest,
            _ => self.period,
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_full_period() {
        let mut timer = SchedulerTimer::new(Duration::from_secs(15));
        assert!(!timer.advance(Duration::from_secs(10)));
        assert!(!timer.advance(Duration::from_millis(4999)));
        assert!(timer.advance(Duration::from_millis(1)));
        assert_eq!(timer.remaining(), Duration::from_secs(15));
    }

    #[test]
    fn test_overshoot_carries_over() {
        let mut timer = SchedulerTimer::new(Duration::from_millis(1500));
        assert!(!timer.advance(Duration::from_millis(1000)));
        assert!(timer.advance(Duration::from_millis(1000)));
        assert_eq!(timer.remaining(), Duration::from_millis(1000));
    }

    #[test]
    fn test_long_tick_fires_once() {
        let mut timer = SchedulerTimer::new(Duration::from_secs(1));
        assert!(timer.advance(Duration::from_secs(5)));
        assert_eq!(timer.remaining(), Duration::from_secs(1));
    }

    #[test]
    fn test_reset() {
        let mut timer = SchedulerTimer::new(Duration::from_secs(2));
        timer.advance(Duration::from_millis(1500));
        timer.reset();
        assert_eq!(timer.remaining(), Duration::from_secs(2));
    }
}
