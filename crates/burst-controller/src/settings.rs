use serde::{Deserialize, Serialize};
use thiserror::Error;

use autofarm_core_types::timing::JitterRange;
use autofarm_core_types::FarmError;
use autofarm_status_gate::throttle::{DEFAULT_BACKOFF_ACTIONS, DEFAULT_MIN_INTERVAL_MS};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("resume_min ({min}) is greater than resume_max ({max})")]
    InvertedResumeRange { min: u32, max: u32 },
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<SettingsError> for FarmError {
    fn from(err: SettingsError) -> Self {
        FarmError::InvalidSetting(err.to_string())
    }
}

/// User-facing settings, persisted between sessions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmSettings {
    pub confirm_wait_secs: u32,
    /// Fixed resume threshold; `None` draws a random one per wait.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_threshold: Option<u32>,
    pub resume_min: u32,
    pub resume_max: u32,
    pub max_fail_streak: u32,
    pub squares_per_action: u32,
    pub auto_recalibrate: bool,
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            confirm_wait_secs: 10,
            resume_threshold: None,
            resume_min: 15,
            resume_max: 50,
            max_fail_streak: 5,
            squares_per_action: 1,
            auto_recalibrate: false,
        }
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), SettingsError> {
    if value < min || value > max {
        return Err(SettingsError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

impl FarmSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("confirm_wait_secs", self.confirm_wait_secs as u64, 1, 120)?;
        if let Some(threshold) = self.resume_threshold {
            check_range("resume_threshold", threshold as u64, 1, 500)?;
        }
        check_range("resume_min", self.resume_min as u64, 1, 500)?;
        check_range("resume_max", self.resume_max as u64, 1, 500)?;
        if self.resume_min > self.resume_max {
            return Err(SettingsError::InvertedResumeRange {
                min: self.resume_min,
                max: self.resume_max,
            });
        }
        check_range("max_fail_streak", self.max_fail_streak as u64, 1, 100)?;
        check_range("squares_per_action", self.squares_per_action as u64, 1, 500)?;
        Ok(())
    }

    /// Applies a `key=value` edit from the command line. The result is
    /// validated before it is returned.
    pub fn with_override(&self, key: &str, value: &str) -> Result<Self, SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let parse_u32 = |v: &str| v.trim().parse::<u32>().map_err(|_| invalid());
        let mut next = self.clone();
        match key {
            "confirm_wait_secs" => next.confirm_wait_secs = parse_u32(value)?,
            "resume_threshold" => {
                next.resume_threshold = match value.trim() {
                    "" | "none" | "random" => None,
                    other => Some(parse_u32(other)?),
                }
            }
            "resume_min" => next.resume_min = parse_u32(value)?,
            "resume_max" => next.resume_max = parse_u32(value)?,
            "max_fail_streak" => next.max_fail_streak = parse_u32(value)?,
            "squares_per_action" => next.squares_per_action = parse_u32(value)?,
            "auto_recalibrate" => {
                next.auto_recalibrate = value.trim().parse::<bool>().map_err(|_| invalid())?
            }
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        next.validate()?;
        Ok(next)
    }
}

/// Loop pacing. Comes from the application config, not from the user's
/// saved settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerTuning {
    pub tick_min_interval_ms: u64,
    pub status_min_interval_ms: u64,
    pub loop_refresh_interval_ms: u64,
    pub confirm_sample_interval_ms: u64,
    pub per_unit_wait_floor_ms: u64,
    pub backoff_actions: u32,
    pub backoff_fail_wait_ms: u64,
    pub recovery_cooldown_ms: u64,
    pub recalibrate_interval_ms: u64,
    pub intent_freshness_ms: u64,
    pub post_action_jitter: JitterRange,
    pub inter_action_jitter: JitterRange,
    pub post_burst_jitter: JitterRange,
    /// Fixed seed for the resume target and jitter draws.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl Default for ControllerTuning {
    fn default() -> Self {
        Self {
            tick_min_interval_ms: 250,
            status_min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            loop_refresh_interval_ms: 1_500,
            confirm_sample_interval_ms: 1_000,
            per_unit_wait_floor_ms: 30_000,
            backoff_actions: DEFAULT_BACKOFF_ACTIONS,
            backoff_fail_wait_ms: 120_000,
            recovery_cooldown_ms: 120_000,
            recalibrate_interval_ms: 60_000,
            intent_freshness_ms: 60_000,
            post_action_jitter: JitterRange::new(120, 340),
            inter_action_jitter: JitterRange::new(250, 650),
            post_burst_jitter: JitterRange::new(500, 1_100),
            rng_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(FarmSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_resume_range() {
        let settings = FarmSettings {
            resume_min: 40,
            resume_max: 20,
            ..FarmSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::InvertedResumeRange { min: 40, max: 20 })
        );
    }

    #[test]
    fn overrides_parse_and_validate() {
        let base = FarmSettings::default();
        let next = base.with_override("resume_threshold", "25").unwrap();
        assert_eq!(next.resume_threshold, Some(25));
        let random = next.with_override("resume_threshold", "random").unwrap();
        assert_eq!(random.resume_threshold, None);
        assert!(matches!(
            base.with_override("confirm_wait_secs", "0"),
            Err(SettingsError::OutOfRange { .. })
        ));
        assert!(matches!(
            base.with_override("speed", "3"),
            Err(SettingsError::UnknownKey(_))
        ));
        assert!(matches!(
            base.with_override("auto_recalibrate", "maybe"),
            Err(SettingsError::InvalidValue { .. })
        ));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let settings: FarmSettings = serde_yaml::from_str("squares_per_action: 3\n").unwrap();
        assert_eq!(settings.squares_per_action, 3);
        assert_eq!(settings.confirm_wait_secs, 10);
    }
}
