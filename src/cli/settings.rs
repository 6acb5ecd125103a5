use anyhow::{anyhow, Context, Result};
use clap::Subcommand;

use autofarm_burst_controller::SettingsStore;

use crate::cli::context::CliContext;

#[derive(Subcommand, Clone, Debug)]
pub enum SettingsAction {
    /// Print the saved settings
    Show,
    /// Change one or more settings
    Set {
        /// Assignments such as `resume_threshold=25` or `auto_recalibrate=true`
        #[arg(value_name = "KEY=VALUE", required = true)]
        assignments: Vec<String>,
    },
    /// Restore the defaults
    Reset,
}

pub fn cmd_settings(action: SettingsAction, ctx: &CliContext) -> Result<()> {
    let store = ctx.settings_store();
    match action {
        SettingsAction::Show => {
            let settings = store.load().context("failed to load settings")?;
            print!("{}", serde_yaml::to_string(&settings)?);
        }
        SettingsAction::Set { assignments } => {
            let mut settings = store.load().context("failed to load settings")?;
            for assignment in &assignments {
                let (key, value) = assignment
                    .split_once('=')
                    .ok_or_else(|| anyhow!("expected KEY=VALUE, got `{assignment}`"))?;
                settings = settings.with_override(key.trim(), value)?;
            }
            store.save(&settings).context("failed to save settings")?;
            println!("Saved settings to {}", store.path().display());
        }
        SettingsAction::Reset => {
            store
                .save(&Default::default())
                .context("failed to save settings")?;
            println!("Settings reset to defaults");
        }
    }
    Ok(())
}
