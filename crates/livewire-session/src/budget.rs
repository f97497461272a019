//! A time-windowed I/O error counter.

use std::time::Duration;

use tokio::time::Instant;

/// Counts I/O failures inside a window and trips once too many land
/// close together.
///
/// On each failure: if more than `quiet_period` has passed since the
/// window started, the window restarts at that failure with a count of
/// zero. Otherwise the count goes up, and the budget is blown as soon as
/// it exceeds `ceiling`. [`record_failure`](Self::record_failure) returns
/// `true` exactly once, on the failure that blew it.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    quiet_period: Duration,
    ceiling: u32,
    window_start: Instant,
    count: u32,
    blown: bool,
}

impl ErrorBudget {
    /// Default quiet period between failure bursts.
    pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(3);

    /// Default number of failures tolerated per window.
    pub const DEFAULT_CEILING: u32 = 10;

    /// Creates a budget whose first window starts now.
    pub fn new(quiet_period: Duration, ceiling: u32) -> Self {
        Self::starting_at(quiet_period, ceiling, Instant::now())
    }

    /// Creates a budget whose first window starts at `start`.
    pub fn starting_at(quiet_period: Duration, ceiling: u32, start: Instant) -> Self {
        Self {
            quiet_period,
            ceiling,
            window_start: start,
            count: 0,
            blown: false,
        }
    }

    /// Records a failure now. See [`record_failure_at`](Self::record_failure_at).
    pub fn record_failure(&mut self) -> bool {
        self.record_failure_at(Instant::now())
    }

    /// Records a failure at `now`. Returns `true` if this failure blew the
    /// budget.
    pub fn record_failure_at(&mut self, now: Instant) -> bool {
        if self.blown {
            return false;
        }

        if now.saturating_duration_since(self.window_start) > self.quiet_period {
            self.window_start = now;
            self.count = 0;
            return false;
        }

        self.count += 1;
        if self.count > self.ceiling {
            self.blown = true;
            return true;
        }
        false
    }

    /// Failures counted in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns `true` once the budget has tripped.
    pub fn is_blown(&self) -> bool {
        self.blown
    }
}

impl Default for ErrorBudget {
    fn default() -> Self {
        Self::new(Self::DEFAULT_QUIET_PERIOD, Self::DEFAULT_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget_at(start: Instant) -> ErrorBudget {
        ErrorBudget::starting_at(Duration::from_secs(3), 10, start)
    }

    #[test]
    fn test_record_failure_eleventh_in_window_blows() {
        let start = Instant::now();
        let mut budget = budget_at(start);

        for i in 1..=10 {
            let at = start + Duration::from_millis(i * 100);
            assert!(!budget.record_failure_at(at), "failure {i} is within budget");
        }
        assert_eq!(budget.count(), 10);

        assert!(budget.record_failure_at(start + Duration::from_millis(1_100)));
        assert!(budget.is_blown());
    }

    #[test]
    fn test_record_failure_signals_blown_only_once() {
        let start = Instant::now();
        let mut budget = budget_at(start);
        for _ in 0..11 {
            budget.record_failure_at(start);
        }
        assert!(budget.is_blown());

        assert!(!budget.record_failure_at(start));
        assert!(!budget.record_failure_at(start + Duration::from_secs(60)));
        assert!(budget.is_blown(), "stays blown after a quiet gap");
    }

    #[test]
    fn test_record_failure_after_quiet_gap_resets_count() {
        let start = Instant::now();
        let mut budget = budget_at(start);
        for _ in 0..5 {
            budget.record_failure_at(start);
        }

        let later = start + Duration::from_millis(3_001);
        assert!(!budget.record_failure_at(later));

        assert_eq!(budget.count(), 0);
        assert!(!budget.is_blown());
    }

    #[test]
    fn test_record_failure_exactly_at_quiet_period_still_counts() {
        let start = Instant::now();
        let mut budget = budget_at(start);

        budget.record_failure_at(start + Duration::from_secs(3));

        assert_eq!(budget.count(), 1);
    }

    #[test]
    fn test_record_failure_window_restarts_at_reset_failure() {
        let start = Instant::now();
        let mut budget = budget_at(start);

        let reset_at = start + Duration::from_secs(10);
        budget.record_failure_at(reset_at);
        for i in 1..=10 {
            budget.record_failure_at(reset_at + Duration::from_millis(i * 10));
        }

        assert!(budget.record_failure_at(reset_at + Duration::from_secs(2)));
    }

    #[test]
    fn test_default_uses_three_seconds_and_ten() {
        let budget = ErrorBudget::default();

        assert_eq!(budget.quiet_period, Duration::from_secs(3));
        assert_eq!(budget.ceiling, 10);
        assert_eq!(budget.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_failure_follows_runtime_clock() {
        let mut budget = ErrorBudget::default();
        for _ in 0..10 {
            budget.record_failure();
        }

        tokio::time::advance(Duration::from_secs(4)).await;

        assert!(!budget.record_failure(), "gap on the paused clock resets");
        assert_eq!(budget.count(), 0);
    }
}
