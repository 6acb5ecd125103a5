//! Caller-side pacing for status reads. The gate itself never throttles;
//! the controller owns one [`GateThrottle`] and asks it before every read.

use serde::{Deserialize, Serialize};

use autofarm_core_types::Timestamp;

/// Actions to perform without any status read after a restriction.
pub const DEFAULT_BACKOFF_ACTIONS: u32 = 10;
/// Minimum spacing between status reads.
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 900;

/// Remaining actions during which the status endpoint must not be queried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffBudget {
    remaining: u32,
}

impl BackoffBudget {
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Re-arming replaces whatever was left.
    pub fn arm(&mut self, actions: u32) {
        self.remaining = actions;
    }

    /// Consumes one unit for a confirmed action. Returns `true` when the
    /// budget was active, meaning the caller must skip its status refresh.
    pub fn on_success(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateThrottle {
    min_interval_ms: u64,
    last_call_at: Option<Timestamp>,
    budget: BackoffBudget,
}

impl Default for GateThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL_MS)
    }
}

impl GateThrottle {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_call_at: None,
            budget: BackoffBudget::default(),
        }
    }

    /// `true` when a read is allowed at `now`: no backoff is active and the
    /// previous read is at least the minimum interval old.
    pub fn may_call(&self, now: Timestamp) -> bool {
        !self.budget.is_active() && self.interval_elapsed(now, self.min_interval_ms)
    }

    /// Like [`may_call`](Self::may_call) with a caller-chosen spacing that is
    /// never shorter than the minimum interval.
    pub fn may_call_every(&self, now: Timestamp, interval_ms: u64) -> bool {
        !self.budget.is_active() && self.interval_elapsed(now, interval_ms.max(self.min_interval_ms))
    }

    fn interval_elapsed(&self, now: Timestamp, interval_ms: u64) -> bool {
        match self.last_call_at {
            None => true,
            Some(last) => now.saturating_sub(last) >= interval_ms,
        }
    }

    pub fn record_call(&mut self, now: Timestamp) {
        self.last_call_at = Some(now);
    }

    pub fn last_call_at(&self) -> Option<Timestamp> {
        self.last_call_at
    }

    pub fn budget(&self) -> &BackoffBudget {
        &self.budget
    }

    pub fn budget_mut(&mut self) -> &mut BackoffBudget {
        &mut self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_decrements_once_per_success() {
        let mut budget = BackoffBudget::default();
        assert!(!budget.on_success());

        budget.arm(DEFAULT_BACKOFF_ACTIONS);
        for expected in (0..10).rev() {
            assert!(budget.on_success());
            assert_eq!(budget.remaining(), expected);
        }
        assert!(!budget.is_active());
        assert!(!budget.on_success());
    }

    #[test]
    fn throttle_enforces_spacing() {
        let mut throttle = GateThrottle::new(900);
        assert!(throttle.may_call(0));
        throttle.record_call(1_000);
        assert!(!throttle.may_call(1_899));
        assert!(throttle.may_call(1_900));
        assert!(!throttle.may_call_every(1_900, 1_500));
        assert!(throttle.may_call_every(2_500, 1_500));
        assert!(!throttle.may_call_every(1_800, 100));
    }

    #[test]
    fn active_budget_blocks_reads() {
        let mut throttle = GateThrottle::default();
        throttle.budget_mut().arm(2);
        assert!(!throttle.may_call(10_000));
        throttle.budget_mut().on_success();
        throttle.budget_mut().on_success();
        assert!(throttle.may_call(10_000));
    }
}
