use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use autofarm_burst_controller::{
    ControllerTuning, FarmSettings, HaltReason, MemoryRecoveryStore, RecoveryStore,
    SessionRecoveryIntent, SimConfig,
};
use autofarm_cli::cli::{run_simulation, SimulationPlan};
use autofarm_cli::metrics::FarmMetrics;
use autofarm_cli::AppConfig;
use autofarm_core_types::{Clock, SystemClock};

fn config(simulation: SimConfig) -> AppConfig {
    AppConfig {
        tuning: ControllerTuning {
            rng_seed: Some(3),
            ..ControllerTuning::default()
        },
        simulation,
        ..AppConfig::default()
    }
}

fn failing_settings() -> FarmSettings {
    FarmSettings {
        confirm_wait_secs: 1,
        max_fail_streak: 2,
        ..FarmSettings::default()
    }
}

fn plan(config: AppConfig, settings: FarmSettings, recovery: Arc<MemoryRecoveryStore>) -> SimulationPlan {
    SimulationPlan {
        config,
        settings,
        recovery,
        speed: 1_000,
        duration: None,
        max_restarts: 3,
        metrics: None,
        print_events: false,
    }
}

#[tokio::test(start_paused = true)]
async fn simulated_session_paints_until_time_runs_out() -> Result<()> {
    let metrics = Arc::new(FarmMetrics::new()?);
    let recovery = Arc::new(MemoryRecoveryStore::new());
    let mut plan = plan(
        config(SimConfig::default()),
        FarmSettings::default(),
        recovery.clone(),
    );
    plan.duration = Some(Duration::from_secs(30 * 60));
    plan.metrics = Some(metrics.clone());

    let report = run_simulation(plan, CancellationToken::new()).await?;

    assert_eq!(report.halt, HaltReason::Stopped);
    assert_eq!(report.restarts, 0);
    assert!(!report.auto_resumed);
    assert!(report.painted >= 15, "painted only {}", report.painted);
    assert!(recovery.peek_intent()?.is_none());
    assert!(metrics.render()?.contains("autofarm_actions_confirmed_total"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reload_restarts_once_then_cooldown_halts() -> Result<()> {
    let recovery = Arc::new(MemoryRecoveryStore::new());
    let plan = plan(
        config(SimConfig {
            lost_rate: 1.0,
            ..SimConfig::default()
        }),
        failing_settings(),
        recovery.clone(),
    );

    let report = run_simulation(plan, CancellationToken::new()).await?;

    assert_eq!(report.restarts, 1);
    assert_eq!(report.painted, 0);
    assert_eq!(report.halt, HaltReason::FailCeiling { recovered: false });
    assert!(recovery.peek_intent()?.is_none());
    assert!(recovery.last_recovery_at()?.is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fresh_intent_resumes_with_saved_settings() -> Result<()> {
    let recovery = Arc::new(MemoryRecoveryStore::new());
    recovery.save_intent(&SessionRecoveryIntent {
        auto_start: true,
        saved_at: SystemClock.now_ms(),
        reason: "5 consecutive failures".into(),
        settings: failing_settings(),
    })?;
    let mut plan = plan(
        config(SimConfig {
            lost_rate: 1.0,
            ..SimConfig::default()
        }),
        FarmSettings::default(),
        recovery.clone(),
    );
    plan.max_restarts = 0;

    let report = run_simulation(plan, CancellationToken::new()).await?;

    assert!(report.auto_resumed);
    assert_eq!(report.halt, HaltReason::FailCeiling { recovered: true });
    // The new reload left a fresh intent behind for the next start.
    let intent = recovery.peek_intent()?.expect("intent saved by the reload");
    assert_eq!(intent.settings, failing_settings());
    assert_eq!(intent.reason, "2 consecutive failures");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stale_intent_is_ignored() -> Result<()> {
    let recovery = Arc::new(MemoryRecoveryStore::new());
    recovery.save_intent(&SessionRecoveryIntent {
        auto_start: true,
        saved_at: SystemClock.now_ms().saturating_sub(10 * 60 * 1_000),
        reason: "old".into(),
        settings: failing_settings(),
    })?;
    let mut plan = plan(config(SimConfig::default()), FarmSettings::default(), recovery.clone());
    plan.duration = Some(Duration::from_secs(60));

    let cancel = CancellationToken::new();
    let report = run_simulation(plan, cancel).await?;

    assert!(!report.auto_resumed);
    assert_eq!(report.halt, HaltReason::Stopped);
    assert!(recovery.peek_intent()?.is_none());
    Ok(())
}
