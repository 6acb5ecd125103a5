//! Application configuration
//!
//! Loaded from YAML by the CLI runtime; environment variables win over the
//! file for the endpoint, the cookie and the state directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use autofarm_burst_controller::{ControllerTuning, SimConfig};
use autofarm_challenge_monitor::MonitorConfig;
use autofarm_status_gate::{HttpGateConfig, DEFAULT_GATE_TIMEOUT};

pub const ENV_ENDPOINT: &str = "AUTOFARM_ENDPOINT";
pub const ENV_COOKIE: &str = "AUTOFARM_COOKIE";
pub const ENV_STATE_DIR: &str = "AUTOFARM_STATE_DIR";

const SETTINGS_FILE: &str = "settings.yaml";
const RECOVERY_FILE: &str = "recovery.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gate: HttpGateConfig,
    /// Bound on a single authoritative status read.
    pub gate_timeout_ms: u64,
    /// Where settings and the recovery record live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    pub tuning: ControllerTuning,
    pub challenge: MonitorConfig,
    pub simulation: SimConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gate: HttpGateConfig::default(),
            gate_timeout_ms: DEFAULT_GATE_TIMEOUT.as_millis() as u64,
            state_dir: None,
            tuning: ControllerTuning::default(),
            challenge: MonitorConfig::default(),
            simulation: SimConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`; blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(endpoint) = value(ENV_ENDPOINT) {
            self.gate.endpoint = endpoint;
        }
        if let Some(cookie) = value(ENV_COOKIE) {
            self.gate.cookie = Some(cookie);
        }
        if let Some(dir) = value(ENV_STATE_DIR) {
            self.state_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }
        match dirs::data_dir() {
            Some(mut dir) => {
                dir.push("autofarm");
                dir
            }
            None => PathBuf::from(".autofarm"),
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.state_dir().join(SETTINGS_FILE)
    }

    pub fn recovery_path(&self) -> PathBuf {
        self.state_dir().join(RECOVERY_FILE)
    }
}
