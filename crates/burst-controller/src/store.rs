use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use autofarm_core_types::FarmError;

use crate::settings::{FarmSettings, SettingsError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(#[from] SettingsError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for FarmError {
    fn from(err: StoreError) -> Self {
        FarmError::storage(err.to_string())
    }
}

pub trait SettingsStore: Send + Sync {
    /// Saved settings, or the defaults when nothing was saved yet.
    fn load(&self) -> Result<FarmSettings, StoreError>;
    fn save(&self, settings: &FarmSettings) -> Result<(), StoreError>;
}

/// Settings kept as a YAML document on disk.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<FarmSettings, StoreError> {
        let _guard = self.lock.lock();
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved settings, using defaults");
                return Ok(FarmSettings::default());
            }
            Err(err) => return Err(err.into()),
        };
        let settings: FarmSettings = serde_yaml::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    fn save(&self, settings: &FarmSettings) -> Result<(), StoreError> {
        settings.validate()?;
        let _guard = self.lock.lock();
        let yaml = serde_yaml::to_string(settings)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, yaml)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: Mutex<Option<FarmSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<FarmSettings, StoreError> {
        Ok(self.inner.lock().clone().unwrap_or_default())
    }

    fn save(&self, settings: &FarmSettings) -> Result<(), StoreError> {
        settings.validate()?;
        *self.inner.lock() = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("settings.yaml"));
        assert_eq!(store.load().unwrap(), FarmSettings::default());
    }

    #[test]
    fn saved_settings_round_trip_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("nested/settings.yaml"));
        let settings = FarmSettings {
            resume_threshold: Some(30),
            squares_per_action: 4,
            auto_recalibrate: true,
            ..FarmSettings::default()
        };
        store.save(&settings).unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("squares_per_action: 4"));
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "resume_min: 60\nresume_max: 10\n").unwrap();
        let store = FileSettingsStore::new(path);
        assert!(matches!(store.load(), Err(StoreError::Invalid(_))));
    }

    #[test]
    fn memory_store_refuses_invalid_settings() {
        let store = MemorySettingsStore::new();
        let bad = FarmSettings {
            max_fail_streak: 0,
            ..FarmSettings::default()
        };
        assert!(store.save(&bad).is_err());
        assert_eq!(store.load().unwrap(), FarmSettings::default());
    }
}
