use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use autofarm_core_types::timing::sleep_cancellable;
use autofarm_core_types::{Clock, SessionId};
use autofarm_event_bus::{ChallengePhase, EventBus, StatusEvent, StatusKind};

use crate::detect::detect;
use crate::probe::{ChallengeProbe, DispatchStrategy};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeState {
    Absent,
    Detected,
    Attempting,
    Solved,
    ManualRequired,
}

/// Result of one [`ChallengeMonitor::check`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// No interstitial on the page.
    Clear,
    /// An interstitial was present and went away after the activation.
    Solved,
    /// Needs a human; the caller halts the session.
    ManualRequired,
    /// The stop token fired while polling.
    Interrupted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Pause between scrolling the element into view and activating it.
    pub settle_ms: u64,
    pub poll_interval_ms: u64,
    /// Upper bound on the post-activation poll.
    pub solve_bound_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            settle_ms: 250,
            poll_interval_ms: 1_000,
            solve_bound_ms: 5_000,
        }
    }
}

/// Collaborators borrowed for the duration of a check.
pub struct MonitorDeps<'a> {
    pub probe: &'a dyn ChallengeProbe,
    pub clock: &'a dyn Clock,
    pub events: &'a dyn EventBus<StatusEvent>,
    pub session: &'a SessionId,
    pub cancel: &'a CancellationToken,
}

impl MonitorDeps<'_> {
    async fn emit(&self, phase: ChallengePhase) {
        let event = StatusEvent::new(
            self.session.clone(),
            self.clock.now_ms(),
            StatusKind::Challenge(phase),
        );
        if let Err(err) = self.events.publish(event).await {
            debug!(?err, "challenge event dropped");
        }
    }
}

#[derive(Debug)]
pub struct ChallengeMonitor {
    config: MonitorConfig,
    state: ChallengeState,
    occurrences: u32,
}

impl Default for ChallengeMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl ChallengeMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            state: ChallengeState::Absent,
            occurrences: 0,
        }
    }

    pub fn state(&self) -> ChallengeState {
        self.state
    }

    /// Number of distinct interstitial occurrences seen so far.
    pub fn occurrences(&self) -> u32 {
        self.occurrences
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Observes the page and, when an interstitial is present, makes one
    /// clearing attempt. Once an occurrence is marked `ManualRequired` no
    /// further attempt is made until the page is clear again.
    #[instrument(skip_all, fields(state = ?self.state))]
    pub async fn check(&mut self, deps: &MonitorDeps<'_>) -> ChallengeOutcome {
        let present = detect(&deps.probe.observe().await).detected();

        if !present {
            if self.state != ChallengeState::Absent {
                debug!(from = ?self.state, "interstitial gone");
            }
            self.state = ChallengeState::Absent;
            return ChallengeOutcome::Clear;
        }

        if self.state == ChallengeState::ManualRequired {
            return ChallengeOutcome::ManualRequired;
        }

        self.occurrences += 1;
        self.state = ChallengeState::Detected;
        info!(occurrence = self.occurrences, "security interstitial detected");
        deps.emit(ChallengePhase::Detected).await;

        self.state = ChallengeState::Attempting;
        deps.emit(ChallengePhase::Attempting).await;
        let acknowledged = self.activate(deps).await;
        debug!(?acknowledged, "activation dispatched");

        let started = deps.clock.now_ms();
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        loop {
            let elapsed = deps.clock.now_ms().saturating_sub(started);
            if elapsed >= self.config.solve_bound_ms {
                break;
            }
            let left_ms = self.config.solve_bound_ms - elapsed;
            deps.emit(ChallengePhase::Countdown {
                secs_left: left_ms.div_ceil(1_000),
            })
            .await;
            let slice = poll.min(Duration::from_millis(left_ms));
            if !sleep_cancellable(deps.clock, deps.cancel, slice).await {
                self.state = ChallengeState::Detected;
                return ChallengeOutcome::Interrupted;
            }
            if !detect(&deps.probe.observe().await).detected() {
                self.state = ChallengeState::Solved;
                info!("security interstitial cleared");
                deps.emit(ChallengePhase::Solved).await;
                return ChallengeOutcome::Solved;
            }
        }

        self.state = ChallengeState::ManualRequired;
        warn!("security interstitial still present; manual action required");
        deps.emit(ChallengePhase::ManualRequired).await;
        ChallengeOutcome::ManualRequired
    }

    async fn activate(&self, deps: &MonitorDeps<'_>) -> Option<DispatchStrategy> {
        let element = deps.probe.find_interstitial_element().await?;
        deps.probe.scroll_into_view(&element).await;
        deps.clock
            .sleep(Duration::from_millis(self.config.settle_ms))
            .await;
        for strategy in DispatchStrategy::ALL {
            if deps.probe.dispatch_activation(&element, strategy).await {
                return Some(strategy);
            }
        }
        None
    }
}
