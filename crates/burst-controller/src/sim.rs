//! A simulated host: charge pool, paint target, status endpoint and
//! interstitial in one place. Used by `autofarm simulate` and by tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use autofarm_challenge_monitor::{
    ChallengeObservation, ChallengeProbe, DispatchStrategy, ElementHint, ElementKind,
    InterstitialElement,
};
use autofarm_core_types::{Clock, Timestamp};
use autofarm_status_gate::{ChargeSnapshot, FetchOutcome, RemoteStatusGate, StatusPayload, UserInfo};

use crate::ports::{ActionSink, ReloadHook};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub start_count: u32,
    pub max: u32,
    pub regen_interval_ms: u64,
    /// Chance that a dispatched action is not accepted at all.
    pub reject_rate: f64,
    /// Chance that an accepted action silently does nothing.
    pub lost_rate: f64,
    /// Raise an interstitial after this many applied actions.
    pub challenge_every: Option<u32>,
    /// Whether activating the interstitial clears it.
    pub challenge_clears_on_click: bool,
    pub expose_local_count: bool,
    pub user_name: Option<String>,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_count: 20,
            max: 80,
            regen_interval_ms: 30_000,
            reject_rate: 0.0,
            lost_rate: 0.0,
            challenge_every: None,
            challenge_clears_on_click: true,
            expose_local_count: true,
            user_name: Some("simulated".into()),
            seed: 7,
        }
    }
}

/// Ordered record of what the host saw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimEvent {
    Action { batch: u32, applied: u32 },
    StatusRead { banned: bool },
    Activation { strategy: DispatchStrategy, cleared: bool },
    Reload { reason: String },
}

#[derive(Debug)]
struct SimState {
    count: u32,
    next_regen_at: Option<Timestamp>,
    challenge: bool,
    applied_actions: u32,
    painted: u64,
    ban_reads: u32,
    lose_actions: u32,
    log: Vec<SimEvent>,
    rng: StdRng,
}

pub struct SimulatedWorld {
    config: SimConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<SimState>,
}

impl SimulatedWorld {
    pub fn new(config: SimConfig, clock: Arc<dyn Clock>) -> Arc<Self> {
        let now = clock.now_ms();
        let max = config.max.max(1);
        let count = config.start_count.min(max);
        let state = SimState {
            count,
            next_regen_at: (count < max).then_some(now + config.regen_interval_ms),
            challenge: false,
            applied_actions: 0,
            painted: 0,
            ban_reads: 0,
            lose_actions: 0,
            log: Vec::new(),
            rng: StdRng::seed_from_u64(config.seed),
        };
        Arc::new(Self {
            config: SimConfig { max, ..config },
            clock,
            state: Mutex::new(state),
        })
    }

    fn settle(&self, state: &mut SimState) {
        let now = self.clock.now_ms();
        let interval = self.config.regen_interval_ms.max(1);
        while let Some(due) = state.next_regen_at {
            if due > now {
                break;
            }
            state.count += 1;
            state.next_regen_at = (state.count < self.config.max).then_some(due + interval);
        }
    }

    pub fn count(&self) -> u32 {
        let mut state = self.state.lock();
        self.settle(&mut state);
        state.count
    }

    pub fn set_count(&self, count: u32) {
        let mut state = self.state.lock();
        let count = count.min(self.config.max);
        state.count = count;
        state.next_regen_at = (count < self.config.max)
            .then_some(self.clock.now_ms() + self.config.regen_interval_ms);
    }

    pub fn painted(&self) -> u64 {
        self.state.lock().painted
    }

    pub fn set_challenge(&self, present: bool) {
        self.state.lock().challenge = present;
    }

    pub fn challenge_present(&self) -> bool {
        self.state.lock().challenge
    }

    /// The next `reads` status reads answer with a temporary ban.
    pub fn ban_next_reads(&self, reads: u32) {
        self.state.lock().ban_reads = reads;
    }

    /// The next `actions` accepted actions do not spend anything.
    pub fn lose_next_actions(&self, actions: u32) {
        self.state.lock().lose_actions = actions;
    }

    pub fn log(&self) -> Vec<SimEvent> {
        self.state.lock().log.clone()
    }

    pub fn status_reads(&self) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|ev| matches!(ev, SimEvent::StatusRead { .. }))
            .count()
    }

    pub fn reloads(&self) -> Vec<String> {
        self.state
            .lock()
            .log
            .iter()
            .filter_map(|ev| match ev {
                SimEvent::Reload { reason } => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ActionSink for SimulatedWorld {
    async fn perform_action(&self, batch: u32) -> bool {
        let mut state = self.state.lock();
        self.settle(&mut state);
        if state.challenge || state.count == 0 {
            state.log.push(SimEvent::Action { batch, applied: 0 });
            return false;
        }
        let reject_rate = self.config.reject_rate;
        if reject_rate > 0.0 && state.rng.gen_bool(reject_rate.min(1.0)) {
            state.log.push(SimEvent::Action { batch, applied: 0 });
            return false;
        }
        let lost = if state.lose_actions > 0 {
            state.lose_actions -= 1;
            true
        } else {
            let lost_rate = self.config.lost_rate;
            lost_rate > 0.0 && state.rng.gen_bool(lost_rate.min(1.0))
        };
        if lost {
            state.log.push(SimEvent::Action { batch, applied: 0 });
            return true;
        }

        let applied = batch.min(state.count);
        if state.count == self.config.max {
            state.next_regen_at = Some(self.clock.now_ms() + self.config.regen_interval_ms);
        }
        state.count -= applied;
        state.painted += applied as u64;
        state.applied_actions += 1;
        state.log.push(SimEvent::Action { batch, applied });
        if let Some(every) = self.config.challenge_every {
            if every > 0 && state.applied_actions % every == 0 {
                debug!(actions = state.applied_actions, "simulated interstitial raised");
                state.challenge = true;
            }
        }
        true
    }

    async fn read_local_count(&self) -> Option<u32> {
        if !self.config.expose_local_count {
            return None;
        }
        Some(self.count())
    }

    async fn recalibrate_view(&self) -> bool {
        true
    }
}

#[async_trait]
impl RemoteStatusGate for SimulatedWorld {
    async fn fetch_status(&self) -> FetchOutcome {
        let mut state = self.state.lock();
        self.settle(&mut state);
        if state.ban_reads > 0 {
            state.ban_reads -= 1;
            state.log.push(SimEvent::StatusRead { banned: true });
            return FetchOutcome::TemporaryBan;
        }
        state.log.push(SimEvent::StatusRead { banned: false });
        FetchOutcome::Ok(StatusPayload {
            charges: ChargeSnapshot {
                count: state.count,
                max: self.config.max,
                regen_interval_ms: self.config.regen_interval_ms,
            },
            user: UserInfo {
                name: self.config.user_name.clone(),
                ..UserInfo::default()
            },
        })
    }
}

#[async_trait]
impl ChallengeProbe for SimulatedWorld {
    async fn observe(&self) -> ChallengeObservation {
        if !self.challenge_present() {
            return ChallengeObservation::default();
        }
        ChallengeObservation {
            resource_urls: vec!["https://challenges.cloudflare.com/cdn-cgi/challenge-platform/h/g/turnstile".into()],
            elements: vec![ElementHint {
                kind: ElementKind::ChallengeWidget,
                visible: true,
                area: 300 * 65,
            }],
            text_sample: "Verify you are human".into(),
        }
    }

    async fn candidates(&self) -> Vec<InterstitialElement> {
        if !self.challenge_present() {
            return Vec::new();
        }
        vec![InterstitialElement {
            id: "sim-widget".into(),
            kind: ElementKind::ChallengeWidget,
            visible: true,
            area: 300 * 65,
        }]
    }

    async fn scroll_into_view(&self, _element: &InterstitialElement) {}

    async fn dispatch_activation(
        &self,
        _element: &InterstitialElement,
        strategy: DispatchStrategy,
    ) -> bool {
        let mut state = self.state.lock();
        let cleared = self.config.challenge_clears_on_click;
        if cleared {
            state.challenge = false;
        }
        state.log.push(SimEvent::Activation { strategy, cleared });
        cleared
    }
}

#[async_trait]
impl ReloadHook for SimulatedWorld {
    async fn request_reload(&self, reason: &str) {
        let mut state = self.state.lock();
        state.challenge = false;
        state.log.push(SimEvent::Reload {
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use autofarm_core_types::ManualClock;

    use super::*;

    #[tokio::test]
    async fn pool_regenerates_and_spends() {
        let clock = Arc::new(ManualClock::new(0));
        let world = SimulatedWorld::new(
            SimConfig {
                start_count: 2,
                max: 3,
                regen_interval_ms: 1_000,
                ..SimConfig::default()
            },
            clock.clone(),
        );
        assert!(world.perform_action(5).await);
        assert_eq!(world.count(), 0);
        assert_eq!(world.painted(), 2);
        clock.advance(std::time::Duration::from_millis(2_500));
        assert_eq!(world.read_local_count().await, Some(2));
        clock.advance(std::time::Duration::from_millis(10_000));
        assert_eq!(world.count(), 3);
    }

    #[tokio::test]
    async fn bans_and_lost_actions_are_scripted() {
        let clock = Arc::new(ManualClock::new(0));
        let world = SimulatedWorld::new(SimConfig::default(), clock);
        world.ban_next_reads(1);
        assert_eq!(world.fetch_status().await, FetchOutcome::TemporaryBan);
        assert!(world.fetch_status().await.is_ok());

        world.lose_next_actions(1);
        assert!(world.perform_action(1).await);
        assert_eq!(world.count(), 20);
        assert!(world.perform_action(1).await);
        assert_eq!(world.count(), 19);
        assert_eq!(world.status_reads(), 2);
    }

    #[tokio::test]
    async fn interstitial_blocks_actions_until_cleared() {
        let clock = Arc::new(ManualClock::new(0));
        let world = SimulatedWorld::new(
            SimConfig {
                challenge_every: Some(1),
                ..SimConfig::default()
            },
            clock,
        );
        assert!(world.perform_action(1).await);
        assert!(world.challenge_present());
        assert!(!world.perform_action(1).await);
        let element = world.find_interstitial_element().await.unwrap();
        assert!(
            world
                .dispatch_activation(&element, DispatchStrategy::Pointer)
                .await
        );
        assert!(!world.challenge_present());
    }
}
