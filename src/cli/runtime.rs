use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
}

/// Resolves the config file (`--config`, then `./config/autofarm.yaml`, then
/// the user config directory), falls back to defaults when it is missing, and
/// applies environment overrides last.
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => {
            let local_config = PathBuf::from("config/autofarm.yaml");
            if local_config.exists() {
                local_config
            } else {
                let mut path = dirs::config_dir().context("Failed to get config directory")?;
                path.push("autofarm");
                path.push("config.yaml");
                path
            }
        }
    };

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;
        let config: AppConfig =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;
        info!("Loaded configuration from: {}", config_path.display());
        config
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        AppConfig::default()
    };
    config.apply_env_overrides();

    Ok(LoadedConfig {
        config,
        path: config_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[serial_test::serial]
    async fn explicit_path_is_loaded_and_env_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autofarm.yaml");
        std::fs::write(
            &path,
            "gate:\n  endpoint: http://file.test/me\ngate_timeout_ms: 900\n",
        )
        .unwrap();

        std::env::set_var(crate::config::ENV_ENDPOINT, "http://env.test/me");
        let loaded = load_config(Some(&path)).await;
        std::env::remove_var(crate::config::ENV_ENDPOINT);

        let loaded = loaded.unwrap();
        assert_eq!(loaded.path, path);
        assert_eq!(loaded.config.gate.endpoint, "http://env.test/me");
        assert_eq!(loaded.config.gate_timeout_ms, 900);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded.config.tuning, AppConfig::default().tuning);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "gate: [unclosed").unwrap();
        assert!(load_config(Some(&path)).await.is_err());
    }
}
