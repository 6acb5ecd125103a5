use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;

use autofarm_status_gate::{FetchOutcome, HttpStatusGate, RemoteStatusGate, TimedGate};

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ProbeArgs {
    /// Status endpoint, overriding the configuration
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Raw Cookie header to send
    #[arg(long)]
    pub cookie: Option<String>,

    /// Print the payload as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn cmd_probe(args: ProbeArgs, ctx: &CliContext) -> Result<()> {
    let mut gate_config = ctx.config().gate.clone();
    if let Some(endpoint) = args.endpoint {
        gate_config.endpoint = endpoint;
    }
    if let Some(cookie) = args.cookie {
        gate_config.cookie = Some(cookie);
    }
    let http = HttpStatusGate::new(gate_config).context("invalid status endpoint")?;
    let gate = TimedGate::new(http, Duration::from_millis(ctx.config().gate_timeout_ms));

    match gate.fetch_status().await {
        FetchOutcome::Ok(payload) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }
            let charges = payload.charges;
            println!("Charges:  {}/{}", charges.count, charges.max);
            println!("Cooldown: {} ms per charge", charges.regen_interval_ms);
            if let Some(name) = payload.user.name {
                println!("User:     {name}");
            }
            if let Some(level) = payload.user.level {
                println!("Level:    {level}");
            }
            if let Some(droplets) = payload.user.droplets {
                println!("Droplets: {droplets}");
            }
            Ok(())
        }
        FetchOutcome::TemporaryBan => {
            bail!("status endpoint reports a temporary restriction; try again later")
        }
        FetchOutcome::Unavailable(reason) => bail!("status endpoint unavailable: {reason}"),
    }
}
