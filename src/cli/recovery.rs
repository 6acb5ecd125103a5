use anyhow::{Context, Result};
use clap::Subcommand;

use autofarm_burst_controller::RecoveryStore;

use crate::cli::context::CliContext;
use crate::cli::output::format_timestamp;

#[derive(Subcommand, Clone, Debug)]
pub enum RecoveryAction {
    /// Print the pending intent and the last recovery time
    Show,
    /// Remove the pending intent and the last recovery time
    Clear,
}

pub fn cmd_recovery(action: RecoveryAction, ctx: &CliContext) -> Result<()> {
    let store = ctx.recovery_store();
    match action {
        RecoveryAction::Show => {
            match store.peek_intent().context("failed to read recovery record")? {
                Some(intent) => {
                    println!("Pending recovery intent:");
                    println!("  reason:     {}", intent.reason);
                    println!("  saved at:   {}", format_timestamp(intent.saved_at));
                    println!("  auto start: {}", intent.auto_start);
                }
                None => println!("No pending recovery intent"),
            }
            match store
                .last_recovery_at()
                .context("failed to read recovery record")?
            {
                Some(at) => println!("Last recovery: {}", format_timestamp(at)),
                None => println!("Last recovery: never"),
            }
        }
        RecoveryAction::Clear => {
            store.clear().context("failed to clear recovery record")?;
            println!("Recovery record cleared");
        }
    }
    Ok(())
}
