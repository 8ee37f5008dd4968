//! Polling interval policy and scheduler state

use std::time::Duration;

/// Interval bounds and growth for an adaptive refresh loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub growth_factor: f64,
}

impl BackoffPolicy {
    /// Builds a policy; `max_interval` is raised to `min_interval` and a
    /// growth factor below 1.0 (or not finite) is treated as 1.0
    pub fn new(min_interval: Duration, max_interval: Duration, growth_factor: f64) -> Self {
        let growth_factor = if growth_factor.is_finite() && growth_factor >= 1.0 {
            growth_factor
        } else {
            1.0
        };
        Self {
            min_interval,
            max_interval: max_interval.max(min_interval),
            growth_factor,
        }
    }

    /// Interval to wait after a fetch that did (or did not) change anything
    pub fn next_interval(&self, current: Duration, changed: bool) -> Duration {
        if changed {
            return self.min_interval;
        }
        current
            .min(self.max_interval)
            .mul_f64(self.growth_factor)
            .min(self.max_interval)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(60), 1.5)
    }
}

/// Where the refresh loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scheduled,
    Fetching,
}

/// Interval bookkeeping of one refresh loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshState {
    pub phase: Phase,
    pub current_interval: Duration,
    pub policy: BackoffPolicy,
}

impl RefreshState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            phase: Phase::Idle,
            current_interval: policy.min_interval,
            policy,
        }
    }

    /// Applies a fetch outcome and returns the delay before the next fetch
    pub fn on_fetch_complete(&mut self, changed: bool) -> Duration {
        self.current_interval = self.policy.next_interval(self.current_interval, changed);
        self.phase = Phase::Scheduled;
        self.current_interval
    }

    pub(crate) fn reset(&mut self) {
        self.current_interval = self.policy.min_interval;
    }
}
