use anyhow::Result;

use super::env::CliArgs;
use super::probe::cmd_probe;
use super::recovery::cmd_recovery;
use super::settings::cmd_settings;
use super::simulate::cmd_simulate;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Simulate(args) => cmd_simulate(args, ctx).await,
        Commands::Probe(args) => cmd_probe(args, ctx).await,
        Commands::Settings { action } => cmd_settings(action, ctx),
        Commands::Recovery { action } => cmd_recovery(action, ctx),
    }
}
