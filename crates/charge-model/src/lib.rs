//! Local model of the remote charge pool.
//!
//! The authoritative count is only read occasionally (it is rate limited and
//! slow); between reads the model extrapolates regeneration so the controller
//! can make sub-second decisions. Invariant kept by every mutation:
//! `next_regen_at` is `None` exactly when `count == max`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use autofarm_core_types::{FarmError, Timestamp};

/// Pool size assumed until the first authoritative read.
pub const DEFAULT_MAX_CHARGES: u32 = 80;
/// Regeneration interval assumed until the first authoritative read.
pub const DEFAULT_REGEN_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChargeError {
    #[error("max charges must be at least 1")]
    ZeroMax,
    #[error("regeneration interval must be positive")]
    ZeroInterval,
    #[error("count {count} exceeds max {max}")]
    CountExceedsMax { count: u32, max: u32 },
}

impl From<ChargeError> for FarmError {
    fn from(err: ChargeError) -> Self {
        FarmError::new(format!("charge model: {err}"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeState {
    count: u32,
    max: u32,
    regen_interval_ms: u64,
    next_regen_at: Option<Timestamp>,
}

impl ChargeState {
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn regen_interval_ms(&self) -> u64 {
        self.regen_interval_ms
    }

    pub fn next_regen_at(&self) -> Option<Timestamp> {
        self.next_regen_at
    }

    pub fn is_full(&self) -> bool {
        self.count == self.max
    }

    /// Returns the state `now` would produce after regeneration, and the
    /// number of units gained.
    fn extrapolated(&self, now: Timestamp) -> (ChargeState, u32) {
        let mut next = self.clone();
        let Some(due) = self.next_regen_at else {
            return (next, 0);
        };
        if now < due {
            return (next, 0);
        }
        let missing = self.max.saturating_sub(self.count);
        let elapsed_units = ((now - due) / self.regen_interval_ms.max(1)).saturating_add(1);
        let gained = elapsed_units.min(missing as u64) as u32;
        next.count = self.count + gained;
        next.next_regen_at = if next.count >= self.max {
            next.count = self.max;
            None
        } else {
            Some(due.saturating_add((gained as u64).saturating_mul(self.regen_interval_ms)))
        };
        (next, gained)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub count: u32,
    pub max: u32,
    /// Time until the next unit; 0 when the pool is full.
    pub eta_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ChargeModel {
    state: ChargeState,
    last_authoritative_at: Option<Timestamp>,
}

impl ChargeModel {
    /// Empty pool with the service defaults, regenerating from `now`.
    pub fn new(now: Timestamp) -> Self {
        Self {
            state: ChargeState {
                count: 0,
                max: DEFAULT_MAX_CHARGES,
                regen_interval_ms: DEFAULT_REGEN_INTERVAL_MS,
                next_regen_at: Some(now.saturating_add(DEFAULT_REGEN_INTERVAL_MS)),
            },
            last_authoritative_at: None,
        }
    }

    pub fn from_authoritative(
        count: u32,
        max: u32,
        regen_interval_ms: u64,
        now: Timestamp,
    ) -> Result<Self, ChargeError> {
        let mut model = Self::new(now);
        model.apply_authoritative(count, max, regen_interval_ms, now)?;
        Ok(model)
    }

    pub fn state(&self) -> &ChargeState {
        &self.state
    }

    pub fn last_authoritative_at(&self) -> Option<Timestamp> {
        self.last_authoritative_at
    }

    /// Advances local regeneration up to `now`. Returns the units gained.
    pub fn tick(&mut self, now: Timestamp) -> u32 {
        let (next, gained) = self.state.extrapolated(now);
        if gained > 0 {
            debug!(gained, count = next.count, max = next.max, "charge regen tick");
        }
        self.state = next;
        gained
    }

    /// Predicted count and time to the next unit at `now`, without mutating.
    pub fn predict(&self, now: Timestamp) -> Prediction {
        let (state, _) = self.state.extrapolated(now);
        let eta_ms = state
            .next_regen_at
            .map(|due| due.saturating_sub(now))
            .unwrap_or(0);
        Prediction {
            count: state.count,
            max: state.max,
            eta_ms,
        }
    }

    /// Estimated time until at least `target` units are available.
    pub fn eta_to(&self, target: u32, now: Timestamp) -> u64 {
        let prediction = self.predict(now);
        let target = target.min(prediction.max);
        if prediction.count >= target {
            return 0;
        }
        let remaining_after_next = (target - prediction.count - 1) as u64;
        prediction
            .eta_ms
            .saturating_add(remaining_after_next.saturating_mul(self.state.regen_interval_ms))
    }

    /// Overwrites the state from a trusted read.
    pub fn apply_authoritative(
        &mut self,
        count: u32,
        max: u32,
        regen_interval_ms: u64,
        now: Timestamp,
    ) -> Result<(), ChargeError> {
        if max == 0 {
            return Err(ChargeError::ZeroMax);
        }
        if regen_interval_ms == 0 {
            return Err(ChargeError::ZeroInterval);
        }
        if count > max {
            return Err(ChargeError::CountExceedsMax { count, max });
        }
        self.state = ChargeState {
            count,
            max,
            regen_interval_ms,
            next_regen_at: (count < max).then_some(now.saturating_add(regen_interval_ms)),
        };
        self.last_authoritative_at = Some(now);
        Ok(())
    }

    /// Applies a count read from the host page. Not authoritative: the pool
    /// size and interval are kept, and a pending regen deadline survives.
    pub fn apply_observed(&mut self, count: u32, now: Timestamp) {
        self.tick(now);
        let count = count.min(self.state.max);
        self.state.count = count;
        if count == self.state.max {
            self.state.next_regen_at = None;
        } else if self.state.next_regen_at.is_none() {
            self.state.next_regen_at = Some(now.saturating_add(self.state.regen_interval_ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariant(model: &ChargeModel) {
        let state = model.state();
        assert_eq!(state.next_regen_at().is_none(), state.count() == state.max());
        assert!(state.count() <= state.max());
    }

    #[test]
    fn tick_regenerates_one_unit_per_interval() {
        let mut model = ChargeModel::from_authoritative(3, 10, 1_000, 0).unwrap();
        assert_eq!(model.tick(999), 0);
        assert_eq!(model.tick(1_000), 1);
        assert_eq!(model.state().count(), 4);
        assert_eq!(model.state().next_regen_at(), Some(2_000));
        assert_eq!(model.tick(4_500), 3);
        assert_eq!(model.state().count(), 7);
        assert_eq!(model.state().next_regen_at(), Some(5_000));
    }

    #[test]
    fn regen_is_monotonic_and_stops_at_max() {
        let mut model = ChargeModel::from_authoritative(0, 5, 700, 0).unwrap();
        let mut last = 0;
        let mut now = 0;
        for step in [13u64, 400, 1, 999, 250, 3_000, 77, 10_000, 5] {
            now += step;
            model.tick(now);
            assert!(model.state().count() >= last);
            last = model.state().count();
            assert_invariant(&model);
        }
        assert_eq!(model.state().count(), 5);
        assert_eq!(model.state().next_regen_at(), None);
        model.tick(now + 1_000_000);
        assert_eq!(model.state().count(), 5);
        assert_eq!(model.state().next_regen_at(), None);
    }

    #[test]
    fn authoritative_overwrite_sets_exact_state() {
        let mut model = ChargeModel::new(0);
        model.apply_authoritative(12, 80, 30_000, 5_000).unwrap();
        assert_eq!(model.state().count(), 12);
        assert_eq!(model.state().max(), 80);
        assert_eq!(model.state().next_regen_at(), Some(35_000));
        assert_eq!(model.last_authoritative_at(), Some(5_000));

        model.apply_authoritative(80, 80, 30_000, 6_000).unwrap();
        assert_eq!(model.state().next_regen_at(), None);
        assert_invariant(&model);
    }

    #[test]
    fn authoritative_overwrite_rejects_bad_payloads() {
        let mut model = ChargeModel::new(0);
        assert_eq!(
            model.apply_authoritative(1, 0, 1_000, 0),
            Err(ChargeError::ZeroMax)
        );
        assert_eq!(
            model.apply_authoritative(1, 5, 0, 0),
            Err(ChargeError::ZeroInterval)
        );
        assert_eq!(
            model.apply_authoritative(6, 5, 10, 0),
            Err(ChargeError::CountExceedsMax { count: 6, max: 5 })
        );
        assert_eq!(model.state().count(), 0);
    }

    #[test]
    fn predict_does_not_mutate() {
        let model = ChargeModel::from_authoritative(2, 4, 1_000, 0).unwrap();
        let p = model.predict(1_500);
        assert_eq!(p.count, 3);
        assert_eq!(p.eta_ms, 500);
        assert_eq!(model.state().count(), 2);

        let full = model.predict(10_000);
        assert_eq!(full.count, 4);
        assert_eq!(full.eta_ms, 0);
    }

    #[test]
    fn eta_to_target_accounts_for_each_unit() {
        let model = ChargeModel::from_authoritative(0, 80, 30_000, 0).unwrap();
        assert_eq!(model.eta_to(1, 10_000), 20_000);
        assert_eq!(model.eta_to(3, 10_000), 80_000);
        assert_eq!(model.eta_to(0, 10_000), 0);
    }

    #[test]
    fn huge_interval_saturates_instead_of_overflowing() {
        let now = 1_700_000_000_000;
        let mut model = ChargeModel::from_authoritative(1, 5, u64::MAX, now).unwrap();
        assert_eq!(model.state().next_regen_at(), Some(u64::MAX));
        assert_eq!(model.tick(now + 60_000), 0);
        assert_eq!(model.eta_to(5, now), u64::MAX);
        model.apply_observed(0, now);
        assert_eq!(model.state().count(), 0);
        assert_invariant(&model);
    }

    #[test]
    fn observed_count_keeps_pending_deadline() {
        let mut model = ChargeModel::from_authoritative(10, 20, 1_000, 0).unwrap();
        model.apply_observed(9, 400);
        assert_eq!(model.state().count(), 9);
        assert_eq!(model.state().next_regen_at(), Some(1_000));

        let mut full = ChargeModel::from_authoritative(5, 5, 1_000, 0).unwrap();
        full.apply_observed(4, 100);
        assert_eq!(full.state().next_regen_at(), Some(1_100));
        full.apply_observed(99, 200);
        assert_eq!(full.state().count(), 5);
        assert_invariant(&full);
    }
}
