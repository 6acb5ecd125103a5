use std::path::{Path, PathBuf};

use autofarm_burst_controller::{FileRecoveryStore, FileSettingsStore};

use crate::config::AppConfig;

pub struct CliContext {
    config: AppConfig,
    config_path: PathBuf,
    metrics_port: u16,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: PathBuf, metrics_port: u16) -> Self {
        Self {
            config,
            config_path,
            metrics_port,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn metrics_port(&self) -> u16 {
        self.metrics_port
    }

    pub fn settings_store(&self) -> FileSettingsStore {
        FileSettingsStore::new(self.config.settings_path())
    }

    pub fn recovery_store(&self) -> FileRecoveryStore {
        FileRecoveryStore::new(self.config.recovery_path())
    }
}
