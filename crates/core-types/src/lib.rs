#![allow(dead_code)]

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

pub mod clock;
pub mod timing;

pub use clock::{Clock, ManualClock, ScaledClock, SystemClock};

/// Shared error type for the autofarm crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FarmError {
    #[error("{message}")]
    Message { message: String },
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl FarmError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

/// Milliseconds since the UNIX epoch.
pub type Timestamp = u64;

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Presentation class attached to every status event.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Severity {
    #[default]
    Default,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "default",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
