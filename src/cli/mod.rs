pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod probe;
pub mod recovery;
pub mod runtime;
pub mod settings;
pub mod simulate;

pub use probe::{cmd_probe, ProbeArgs};
pub use recovery::{cmd_recovery, RecoveryAction};
pub use settings::{cmd_settings, SettingsAction};
pub use simulate::{cmd_simulate, run_simulation, SimulateArgs, SimulationPlan, SimulationReport};
