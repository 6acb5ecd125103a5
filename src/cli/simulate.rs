use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use autofarm_burst_controller::{
    consume_recovery_intent, BurstControllerBuilder, FarmSettings, HaltReason, RecoveryStore,
    SettingsStore, SimConfig, SimulatedWorld,
};
use autofarm_core_types::{Clock, ScaledClock};
use autofarm_event_bus::{to_mpsc, EventBus, InMemoryBus, StatusEvent};
use autofarm_status_gate::TimedGate;

use crate::cli::context::CliContext;
use crate::cli::output::render_event;
use crate::config::AppConfig;
use crate::metrics::{spawn_metrics_server, spawn_recorder, FarmMetrics};

#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// How many times faster than real time the simulation runs
    #[arg(long, default_value_t = 60)]
    pub speed: u32,

    /// Stop after this many simulated seconds
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Charges available when the simulation starts
    #[arg(long)]
    pub start_count: Option<u32>,

    /// Raise an interstitial after every N painted actions
    #[arg(long, value_name = "N")]
    pub challenge_every: Option<u32>,

    /// Chance (0..1) that an accepted action is silently lost
    #[arg(long)]
    pub lost_rate: Option<f64>,

    /// Seed for the simulated host
    #[arg(long)]
    pub seed: Option<u64>,

    /// Automatic restarts after a recovery reload
    #[arg(long, default_value_t = 1)]
    pub max_restarts: u32,

    /// Print prometheus metrics when the run ends
    #[arg(long)]
    pub dump_metrics: bool,

    /// Do not print status events
    #[arg(short, long)]
    pub quiet: bool,
}

pub struct SimulationPlan {
    pub config: AppConfig,
    pub settings: FarmSettings,
    pub recovery: Arc<dyn RecoveryStore>,
    pub speed: u32,
    pub duration: Option<Duration>,
    pub max_restarts: u32,
    pub metrics: Option<Arc<FarmMetrics>>,
    pub print_events: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationReport {
    pub halt: HaltReason,
    pub painted: u64,
    pub restarts: u32,
    pub auto_resumed: bool,
}

pub async fn cmd_simulate(args: SimulateArgs, ctx: &CliContext) -> Result<()> {
    let mut config = ctx.config().clone();
    apply_sim_args(&mut config.simulation, &args);

    let settings = ctx
        .settings_store()
        .load()
        .context("failed to load settings")?;
    let metrics = Arc::new(FarmMetrics::new()?);
    let _metrics_server = spawn_metrics_server(ctx.metrics_port(), metrics.clone());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            interrupt.cancel();
        }
    });

    let plan = SimulationPlan {
        config,
        settings,
        recovery: Arc::new(ctx.recovery_store()),
        speed: args.speed,
        duration: args.duration.map(Duration::from_secs),
        max_restarts: args.max_restarts,
        metrics: Some(metrics.clone()),
        print_events: !args.quiet,
    };
    let report = run_simulation(plan, cancel).await?;

    println!(
        "Simulation ended: {} (painted {}, restarts {})",
        report.halt, report.painted, report.restarts
    );
    if args.dump_metrics {
        print!("{}", metrics.render()?);
    }
    Ok(())
}

fn apply_sim_args(sim: &mut SimConfig, args: &SimulateArgs) {
    if let Some(count) = args.start_count {
        sim.start_count = count;
    }
    if let Some(every) = args.challenge_every {
        sim.challenge_every = Some(every);
    }
    if let Some(rate) = args.lost_rate {
        sim.lost_rate = rate.clamp(0.0, 1.0);
    }
    if let Some(seed) = args.seed {
        sim.seed = seed;
    }
}

/// Runs controller sessions against a simulated host until one halts for
/// good. A requested reload restarts the session from its recovery intent,
/// up to `max_restarts` times.
pub async fn run_simulation(
    plan: SimulationPlan,
    cancel: CancellationToken,
) -> Result<SimulationReport> {
    let clock: Arc<dyn Clock> = Arc::new(ScaledClock::new(plan.speed));
    let world = SimulatedWorld::new(plan.config.simulation.clone(), clock.clone());
    let bus = InMemoryBus::<StatusEvent>::new(512);

    let recorder = plan
        .metrics
        .clone()
        .map(|metrics| spawn_recorder(metrics, bus.subscribe()));
    let printer = plan.print_events.then(|| {
        let mut rx = to_mpsc(bus.clone() as Arc<dyn EventBus<StatusEvent>>, 512);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                println!("{}", render_event(&event));
            }
        })
    });

    if let Some(duration) = plan.duration {
        let clock = clock.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            clock.sleep(duration).await;
            cancel.cancel();
        });
    }

    let tuning = plan.config.tuning.clone();
    let gate_timeout = Duration::from_millis(plan.config.gate_timeout_ms);
    let mut settings = plan.settings;
    let mut auto_resumed = false;
    if let Some(intent) = consume_recovery_intent(
        plan.recovery.as_ref(),
        clock.now_ms(),
        tuning.intent_freshness_ms,
    )? {
        if intent.auto_start {
            info!(reason = %intent.reason, "resuming from recovery intent");
            settings = intent.settings;
            auto_resumed = true;
        }
    }
    let resumed_at_start = auto_resumed;

    let mut painted = 0;
    let mut restarts = 0;
    let halt = loop {
        let mut controller = BurstControllerBuilder::new(settings.clone())
            .with_tuning(tuning.clone())
            .with_monitor_config(plan.config.challenge.clone())
            .with_clock(clock.clone())
            .with_sink(world.clone())
            .with_probe(world.clone())
            .with_gate(Arc::new(TimedGate::new(world.clone(), gate_timeout)))
            .with_events(bus.clone())
            .with_recovery_store(plan.recovery.clone())
            .with_reload_hook(world.clone())
            .with_cancel(cancel.clone())
            .build()?;
        controller.start(auto_resumed).await;
        let halt = controller.run().await;
        painted += controller.stats().painted;

        if halt != (HaltReason::FailCeiling { recovered: true }) || restarts >= plan.max_restarts {
            break halt;
        }
        let intent = consume_recovery_intent(
            plan.recovery.as_ref(),
            clock.now_ms(),
            tuning.intent_freshness_ms,
        )?;
        match intent {
            Some(intent) if intent.auto_start => {
                settings = intent.settings;
                auto_resumed = true;
                restarts += 1;
            }
            _ => {
                warn!("reload requested but no usable recovery intent was found");
                break halt;
            }
        }
    };

    drop(bus);
    if let Some(handle) = recorder {
        let _ = handle.await;
    }
    if let Some(handle) = printer {
        let _ = handle.await;
    }

    Ok(SimulationReport {
        halt,
        painted,
        restarts,
        auto_resumed: resumed_at_start,
    })
}
