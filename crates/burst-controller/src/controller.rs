use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use autofarm_challenge_monitor::{
    ChallengeMonitor, ChallengeOutcome, ChallengeProbe, MonitorConfig, MonitorDeps,
};
use autofarm_charge_model::ChargeModel;
use autofarm_core_types::timing::{format_time_short, sleep_cancellable, JitterRange};
use autofarm_core_types::{Clock, SessionId, Severity, SystemClock, Timestamp};
use autofarm_event_bus::{EventBus, StatsSnapshot, StatusEvent, StatusKind};
use autofarm_status_gate::{FetchOutcome, GateThrottle, RemoteStatusGate};

use crate::errors::ControllerError;
use crate::oracle::{ConfirmationVerdict, ConfirmationWindow};
use crate::ports::{ActionSink, ReloadHook};
use crate::recovery::{MemoryRecoveryStore, RecoveryStore, SessionRecoveryIntent};
use crate::settings::{ControllerTuning, FarmSettings, SettingsError};

/// Display cap for wait ETAs when no status read has landed yet.
const UNKNOWN_ETA_CAP_MS: u64 = 5 * 60 * 1_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    Idle,
    Waiting,
    Bursting,
    Confirming,
    Halted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum HaltReason {
    /// The stop token fired.
    Stopped,
    /// An interstitial needs a human.
    ChallengeManual,
    /// Too many unconfirmed actions in a row. `recovered` tells whether a
    /// session reload was requested.
    FailCeiling { recovered: bool },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Stopped => f.write_str("stopped by user"),
            HaltReason::ChallengeManual => f.write_str("security challenge needs manual action"),
            HaltReason::FailCeiling { recovered: true } => {
                f.write_str("too many failures, session reload requested")
            }
            HaltReason::FailCeiling { recovered: false } => f.write_str("too many failures"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Halted(HaltReason),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub painted: u64,
    pub confirmed_actions: u64,
    pub failed_actions: u64,
    pub recoveries: u32,
}

pub struct BurstControllerBuilder {
    settings: FarmSettings,
    tuning: ControllerTuning,
    monitor: MonitorConfig,
    session: Option<SessionId>,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Arc<dyn ActionSink>>,
    probe: Option<Arc<dyn ChallengeProbe>>,
    gate: Option<Arc<dyn RemoteStatusGate>>,
    events: Option<Arc<dyn EventBus<StatusEvent>>>,
    recovery: Option<Arc<dyn RecoveryStore>>,
    reload: Option<Arc<dyn ReloadHook>>,
    cancel: Option<CancellationToken>,
}

impl BurstControllerBuilder {
    pub fn new(settings: FarmSettings) -> Self {
        Self {
            settings,
            tuning: ControllerTuning::default(),
            monitor: MonitorConfig::default(),
            session: None,
            clock: None,
            sink: None,
            probe: None,
            gate: None,
            events: None,
            recovery: None,
            reload: None,
            cancel: None,
        }
    }

    pub fn with_tuning(mut self, tuning: ControllerTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor = config;
        self
    }

    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ActionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn ChallengeProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn RemoteStatusGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventBus<StatusEvent>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_recovery_store(mut self, store: Arc<dyn RecoveryStore>) -> Self {
        self.recovery = Some(store);
        self
    }

    pub fn with_reload_hook(mut self, hook: Arc<dyn ReloadHook>) -> Self {
        self.reload = Some(hook);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Result<BurstController, ControllerError> {
        self.settings.validate()?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let rng = match self.tuning.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let now = clock.now_ms();
        Ok(BurstController {
            session: self.session.unwrap_or_default(),
            throttle: GateThrottle::new(self.tuning.status_min_interval_ms),
            settings: self.settings,
            tuning: self.tuning,
            sink: self.sink.ok_or(ControllerError::MissingPort("action sink"))?,
            probe: self.probe.ok_or(ControllerError::MissingPort("challenge probe"))?,
            gate: self.gate.ok_or(ControllerError::MissingPort("status gate"))?,
            events: self.events.ok_or(ControllerError::MissingPort("event bus"))?,
            reload: self.reload.ok_or(ControllerError::MissingPort("reload hook"))?,
            recovery: self
                .recovery
                .unwrap_or_else(|| Arc::new(MemoryRecoveryStore::new())),
            cancel: self.cancel.unwrap_or_default(),
            monitor: ChallengeMonitor::new(self.monitor),
            model: ChargeModel::new(now),
            clock,
            rng,
            phase: ControllerPhase::Idle,
            started: false,
            resume_target: None,
            fail_streak: 0,
            stats: SessionStats::default(),
            user: None,
            last_tick_at: None,
            last_recalibrate_at: None,
        })
    }
}

/// Owns one painting session. Not shared: every method takes `&mut self`.
pub struct BurstController {
    session: SessionId,
    settings: FarmSettings,
    tuning: ControllerTuning,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ActionSink>,
    probe: Arc<dyn ChallengeProbe>,
    gate: Arc<dyn RemoteStatusGate>,
    events: Arc<dyn EventBus<StatusEvent>>,
    recovery: Arc<dyn RecoveryStore>,
    reload: Arc<dyn ReloadHook>,
    cancel: CancellationToken,
    monitor: ChallengeMonitor,
    model: ChargeModel,
    throttle: GateThrottle,
    rng: StdRng,
    phase: ControllerPhase,
    started: bool,
    resume_target: Option<u32>,
    fail_streak: u32,
    stats: SessionStats,
    user: Option<String>,
    last_tick_at: Option<Timestamp>,
    last_recalibrate_at: Option<Timestamp>,
}

impl BurstController {
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn settings(&self) -> &FarmSettings {
        &self.settings
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn model(&self) -> &ChargeModel {
        &self.model
    }

    pub fn resume_target(&self) -> Option<u32> {
        self.resume_target
    }

    pub fn fail_streak(&self) -> u32 {
        self.fail_streak
    }

    pub fn backoff_remaining(&self) -> u32 {
        self.throttle.budget().remaining()
    }

    /// Token that stops the session when cancelled.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Replaces the settings. A changed resume threshold or range drops the
    /// current resume target.
    pub fn update_settings(&mut self, settings: FarmSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        if settings.resume_threshold != self.settings.resume_threshold
            || settings.resume_min != self.settings.resume_min
            || settings.resume_max != self.settings.resume_max
        {
            self.resume_target = None;
        }
        info!(session = %self.session, "settings updated");
        self.settings = settings;
        Ok(())
    }

    /// Best-effort initial read; on failure the model keeps the service
    /// defaults.
    pub async fn start(&mut self, auto_resumed: bool) {
        self.started = true;
        self.phase = ControllerPhase::Idle;
        if self.refresh_authoritative().await.is_none() {
            debug!("initial status read failed; using default charge model");
        }
        info!(session = %self.session, auto_resumed, "session started");
        self.publish(StatusKind::Started { auto_resumed }).await;
        self.publish_stats().await;
    }

    /// Loops [`step`](Self::step) until the session halts.
    pub async fn run(&mut self) -> HaltReason {
        if !self.started {
            self.start(false).await;
        }
        let reason = loop {
            if let StepOutcome::Halted(reason) = self.step().await {
                break reason;
            }
        };
        let kind = match reason {
            HaltReason::Stopped => StatusKind::Paused,
            other => StatusKind::Stopped {
                reason: other.to_string(),
            },
        };
        self.publish(kind).await;
        reason
    }

    /// One scheduling cycle: challenge check, model upkeep, then either a
    /// wait for charges or a burst.
    #[instrument(skip_all, fields(session = %self.session, painted = self.stats.painted))]
    pub async fn step(&mut self) -> StepOutcome {
        if self.cancel.is_cancelled() {
            return self.halt(HaltReason::Stopped);
        }
        if let Some(reason) = self.check_challenge().await {
            return self.halt(reason);
        }

        let now = self.clock.now_ms();
        self.maybe_tick(now);
        if self
            .throttle
            .may_call_every(now, self.tuning.loop_refresh_interval_ms)
        {
            self.refresh_authoritative().await;
        }

        if self.model.state().count() == 0 {
            if let Some(reason) = self.wait_for_resume().await {
                return self.halt(reason);
            }
            return StepOutcome::Continue;
        }

        self.resume_target = None;
        if let Some(reason) = self.burst().await {
            return self.halt(reason);
        }
        self.phase = ControllerPhase::Idle;
        if !self.jitter(self.tuning.post_burst_jitter).await {
            return self.halt(HaltReason::Stopped);
        }
        StepOutcome::Continue
    }

    fn halt(&mut self, reason: HaltReason) -> StepOutcome {
        info!(session = %self.session, %reason, "session halted");
        self.phase = ControllerPhase::Halted;
        StepOutcome::Halted(reason)
    }

    fn maybe_tick(&mut self, now: Timestamp) {
        let due = self
            .last_tick_at
            .map_or(true, |last| now.saturating_sub(last) >= self.tuning.tick_min_interval_ms);
        if due {
            self.model.tick(now);
            self.last_tick_at = Some(now);
        }
    }

    fn ensure_resume_target(&mut self) -> u32 {
        if let Some(target) = self.resume_target {
            return target;
        }
        let max = self.model.state().max().max(1);
        let target = match self.settings.resume_threshold {
            Some(threshold) if threshold >= 1 => threshold,
            _ => self
                .rng
                .gen_range(self.settings.resume_min..=self.settings.resume_max),
        }
        .clamp(1, max);
        debug!(target, "resume target chosen");
        self.resume_target = Some(target);
        target
    }

    /// Waits until enough charges are back. Returns a halt reason when the
    /// session must stop instead.
    async fn wait_for_resume(&mut self) -> Option<HaltReason> {
        self.phase = ControllerPhase::Waiting;
        let mut target = self.ensure_resume_target();
        let started = self.clock.now_ms();
        let mut floor_ms = target as u64 * self.tuning.per_unit_wait_floor_ms;
        info!(target, floor_ms, "waiting for charges");

        loop {
            if self.cancel.is_cancelled() {
                return Some(HaltReason::Stopped);
            }
            if let Some(reason) = self.check_challenge().await {
                return Some(reason);
            }

            let now = self.clock.now_ms();
            self.model.tick(now);
            self.last_tick_at = Some(now);
            if self.throttle.may_call(now) {
                self.refresh_authoritative().await;
            } else if let Some(local) = self.sink.read_local_count().await {
                self.model.apply_observed(local, now);
            }

            // A read may have shrunk the pool below the chosen target.
            let max = self.model.state().max().max(1);
            if target > max {
                debug!(target, max, "resume target lowered to pool size");
                target = max;
                floor_ms = target as u64 * self.tuning.per_unit_wait_floor_ms;
                self.resume_target = Some(target);
            }

            let now = self.clock.now_ms();
            let count = self.model.state().count();
            let elapsed = now.saturating_sub(started);
            if count >= target || (elapsed >= floor_ms && count >= 1) {
                debug!(count, target, elapsed, "wait finished");
                return None;
            }

            let mut eta_ms = self.model.eta_to(target, now);
            if count >= 1 {
                eta_ms = eta_ms.min(floor_ms - elapsed);
            }
            if self.model.last_authoritative_at().is_none() {
                eta_ms = eta_ms.min(UNKNOWN_ETA_CAP_MS);
            }
            self.publish(StatusKind::WaitProgress {
                current: count,
                target,
                eta_ms,
                eta_short: format_time_short(eta_ms),
            })
            .await;

            let pause_ms = if eta_ms == 0 { 1_000 } else { eta_ms.min(1_000) };
            let pause = Duration::from_millis(pause_ms);
            if !sleep_cancellable(self.clock.as_ref(), &self.cancel, pause).await {
                return Some(HaltReason::Stopped);
            }
        }
    }

    /// Spends charges until the model says none are left.
    async fn burst(&mut self) -> Option<HaltReason> {
        self.phase = ControllerPhase::Bursting;
        loop {
            if self.cancel.is_cancelled() {
                return Some(HaltReason::Stopped);
            }
            let now = self.clock.now_ms();
            self.maybe_tick(now);
            let available = self.model.state().count();
            if available == 0 {
                return None;
            }

            let backoff = self.throttle.budget().is_active();
            let batch = if backoff {
                1
            } else {
                self.settings.squares_per_action.clamp(1, available)
            };
            let local_before = self.sink.read_local_count().await;
            let committed = self.sink.perform_action(batch).await;
            debug!(batch, committed, available, "action dispatched");

            let interrupted = !self.jitter(self.tuning.post_action_jitter).await;

            let (window, stopped) = if committed {
                self.phase = ControllerPhase::Confirming;
                self.confirm(available, local_before, interrupted).await
            } else {
                (ConfirmationWindow::new(available, local_before), interrupted)
            };
            self.phase = ControllerPhase::Bursting;

            let verdict = window.verdict(committed, batch);
            if stopped {
                // A landed action is still credited; a stop is never a failure.
                if verdict.success {
                    self.on_success(verdict, available, window.had_authoritative_read())
                        .await;
                } else {
                    debug!("stopped before the action was confirmed; not counted");
                }
                return Some(HaltReason::Stopped);
            }
            if verdict.success {
                self.on_success(verdict, available, window.had_authoritative_read())
                    .await;
            } else if let Some(reason) = self.on_failure(committed).await {
                return Some(reason);
            }

            if let Some(reason) = self.check_challenge().await {
                return Some(reason);
            }
            if !self.jitter(self.tuning.inter_action_jitter).await {
                return Some(HaltReason::Stopped);
            }
        }
    }

    /// Samples counts after an action until a drop shows up or the window
    /// closes. The flag reports a stop; the window then holds one final
    /// sample taken at the stop.
    async fn confirm(
        &mut self,
        model_before: u32,
        local_before: Option<u32>,
        interrupted: bool,
    ) -> (ConfirmationWindow, bool) {
        let mut window = ConfirmationWindow::new(model_before, local_before);
        if interrupted {
            self.sample(&mut window).await;
            return (window, true);
        }
        let total_ms = self.settings.confirm_wait_secs as u64 * 1_000;
        let sample = self.tuning.confirm_sample_interval_ms.max(1);
        let started = self.clock.now_ms();

        loop {
            let elapsed = self.clock.now_ms().saturating_sub(started);
            if elapsed >= total_ms {
                break;
            }
            let left = total_ms - elapsed;
            self.publish(StatusKind::ConfirmCountdown {
                secs_left: left.div_ceil(1_000),
            })
            .await;
            let pause = Duration::from_millis(sample.min(left));
            let slept = sleep_cancellable(self.clock.as_ref(), &self.cancel, pause).await;
            self.sample(&mut window).await;
            if !slept {
                debug!("stopped during confirmation");
                return (window, true);
            }
            if window.decreased() {
                break;
            }
        }
        (window, false)
    }

    async fn sample(&mut self, window: &mut ConfirmationWindow) {
        match self.sink.read_local_count().await {
            Some(count) => window.record_local(count),
            None => {
                if self.throttle.may_call(self.clock.now_ms()) {
                    if let Some(count) = self.refresh_authoritative().await {
                        window.record_authoritative(count);
                    }
                }
            }
        }
    }

    async fn on_success(&mut self, verdict: ConfirmationVerdict, before: u32, had_read: bool) {
        self.fail_streak = 0;
        self.stats.painted += verdict.consumed as u64;
        self.stats.confirmed_actions += 1;
        let now = self.clock.now_ms();
        if !had_read {
            self.model
                .apply_observed(before.saturating_sub(verdict.consumed), now);
        }
        info!(consumed = verdict.consumed, painted = self.stats.painted, "action confirmed");
        self.publish(StatusKind::ActionSucceeded {
            consumed: verdict.consumed,
            painted_total: self.stats.painted,
        })
        .await;

        if self.throttle.budget_mut().on_success() {
            let remaining = self.throttle.budget().remaining();
            self.publish(StatusKind::BackoffProgress { remaining }).await;
        } else if !had_read && self.throttle.may_call(now) {
            self.refresh_authoritative().await;
        }
        self.publish_stats().await;
    }

    async fn on_failure(&mut self, committed: bool) -> Option<HaltReason> {
        self.fail_streak += 1;
        self.stats.failed_actions += 1;
        warn!(committed, fail_streak = self.fail_streak, "action not confirmed");
        self.publish(StatusKind::ActionFailed {
            committed,
            fail_streak: self.fail_streak,
        })
        .await;

        if self.fail_streak >= self.settings.max_fail_streak {
            let reason = format!("{} consecutive failures", self.fail_streak);
            let recovered = self.trigger_recovery(&reason).await;
            return Some(HaltReason::FailCeiling { recovered });
        }

        if self.throttle.budget().is_active() {
            let wait_ms = self.tuning.backoff_fail_wait_ms;
            self.publish(StatusKind::BackoffWait { wait_ms }).await;
            if !sleep_cancellable(
                self.clock.as_ref(),
                &self.cancel,
                Duration::from_millis(wait_ms),
            )
            .await
            {
                return Some(HaltReason::Stopped);
            }
        }
        if self.settings.auto_recalibrate {
            self.maybe_recalibrate().await;
        }
        None
    }

    async fn maybe_recalibrate(&mut self) {
        let now = self.clock.now_ms();
        let due = self.last_recalibrate_at.map_or(true, |last| {
            now.saturating_sub(last) >= self.tuning.recalibrate_interval_ms
        });
        if !due {
            return;
        }
        self.last_recalibrate_at = Some(now);
        let ok = self.sink.recalibrate_view().await;
        debug!(ok, "view recalibration");
        self.publish(StatusKind::Recalibrated { ok }).await;
    }

    /// Saves a recovery intent and asks the host to reload. Suppressed inside
    /// the recovery cooldown; aborted when the intent cannot be persisted.
    /// Returns `true` when the reload was requested.
    pub async fn trigger_recovery(&mut self, reason: &str) -> bool {
        let now = self.clock.now_ms();
        match self.recovery.last_recovery_at() {
            Ok(Some(last)) if now.saturating_sub(last) < self.tuning.recovery_cooldown_ms => {
                let cooldown_left_ms = self.tuning.recovery_cooldown_ms - now.saturating_sub(last);
                info!(cooldown_left_ms, "recovery suppressed by cooldown");
                self.publish(StatusKind::RecoverySuppressed {
                    reason: reason.to_string(),
                    cooldown_left_ms,
                })
                .await;
                return false;
            }
            Ok(_) => {}
            Err(err) => {
                error!(%err, "could not read recovery state");
                self.publish_recovery_error(reason, &err.to_string()).await;
                return false;
            }
        }

        let intent = SessionRecoveryIntent {
            auto_start: true,
            saved_at: now,
            reason: reason.to_string(),
            settings: self.settings.clone(),
        };
        let persisted = self
            .recovery
            .save_intent(&intent)
            .and_then(|_| self.recovery.mark_recovery(now));
        if let Err(err) = persisted {
            error!(%err, "could not persist recovery intent; reload aborted");
            self.publish_recovery_error(reason, &err.to_string()).await;
            return false;
        }

        self.stats.recoveries += 1;
        warn!(reason, "requesting session reload");
        self.publish(StatusKind::RecoveryTriggered {
            reason: reason.to_string(),
        })
        .await;
        self.reload.request_reload(reason).await;
        true
    }

    async fn publish_recovery_error(&self, reason: &str, err: &str) {
        let event = StatusEvent::new(
            self.session.clone(),
            self.clock.now_ms(),
            StatusKind::RecoverySuppressed {
                reason: format!("{reason}: {err}"),
                cooldown_left_ms: 0,
            },
        )
        .with_severity(Severity::Error);
        if let Err(err) = self.events.publish(event).await {
            debug!(?err, "status event dropped");
        }
    }

    async fn check_challenge(&mut self) -> Option<HaltReason> {
        let deps = MonitorDeps {
            probe: self.probe.as_ref(),
            clock: self.clock.as_ref(),
            events: self.events.as_ref(),
            session: &self.session,
            cancel: &self.cancel,
        };
        match self.monitor.check(&deps).await {
            ChallengeOutcome::Clear | ChallengeOutcome::Solved => None,
            ChallengeOutcome::ManualRequired => Some(HaltReason::ChallengeManual),
            ChallengeOutcome::Interrupted => Some(HaltReason::Stopped),
        }
    }

    /// One status read. Applies a good payload to the model and returns the
    /// fresh count; arms the backoff budget on a temporary ban.
    async fn refresh_authoritative(&mut self) -> Option<u32> {
        let now = self.clock.now_ms();
        self.throttle.record_call(now);
        match self.gate.fetch_status().await {
            FetchOutcome::Ok(payload) => {
                let charges = payload.charges;
                let now = self.clock.now_ms();
                if let Err(err) = self.model.apply_authoritative(
                    charges.count,
                    charges.max,
                    charges.regen_interval_ms,
                    now,
                ) {
                    warn!(%err, "status payload rejected");
                    return None;
                }
                self.last_tick_at = Some(now);
                if payload.user.name.is_some() {
                    self.user = payload.user.name;
                }
                debug!(count = charges.count, max = charges.max, "status refreshed");
                Some(charges.count)
            }
            FetchOutcome::TemporaryBan => {
                let actions = self.tuning.backoff_actions;
                warn!(actions, "status endpoint restricted; backing off");
                self.throttle.budget_mut().arm(actions);
                self.publish(StatusKind::BackoffArmed { actions }).await;
                None
            }
            FetchOutcome::Unavailable(reason) => {
                debug!(%reason, "status read unavailable");
                None
            }
        }
    }

    async fn jitter(&mut self, range: JitterRange) -> bool {
        let pause = range.sample(&mut self.rng);
        sleep_cancellable(self.clock.as_ref(), &self.cancel, pause).await
    }

    async fn publish_stats(&self) {
        let now = self.clock.now_ms();
        let prediction = self.model.predict(now);
        self.publish(StatusKind::StatsUpdated(StatsSnapshot {
            painted: self.stats.painted,
            charges: prediction.count,
            max_charges: prediction.max,
            cooldown_ms: prediction.eta_ms,
            user: self.user.clone(),
        }))
        .await;
    }

    async fn publish(&self, kind: StatusKind) {
        let event = StatusEvent::new(self.session.clone(), self.clock.now_ms(), kind);
        if let Err(err) = self.events.publish(event).await {
            debug!(?err, "status event dropped");
        }
    }
}
