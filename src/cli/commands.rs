use clap::Subcommand;

use super::probe::ProbeArgs;
use super::recovery::RecoveryAction;
use super::settings::SettingsAction;
use super::simulate::SimulateArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Run the controller against a simulated host
    Simulate(SimulateArgs),

    /// Read the remote charge status once
    Probe(ProbeArgs),

    /// Show or edit saved settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Inspect or clear the session recovery record
    Recovery {
        #[command(subcommand)]
        action: RecoveryAction,
    },
}
