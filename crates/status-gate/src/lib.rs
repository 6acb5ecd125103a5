//! Access to the authoritative charge status.
//!
//! The endpoint is slow, rate limited and occasionally restricts the
//! account. [`RemoteStatusGate::fetch_status`] therefore never fails: every
//! problem degrades to [`FetchOutcome::Unavailable`] and the caller keeps
//! trusting its local model. Call pacing and the post-restriction backoff are
//! caller-side policy, see [`throttle`].

pub mod gate;
pub mod http;
pub mod payload;
pub mod throttle;

pub use gate::{FetchOutcome, RemoteStatusGate, TimedGate, DEFAULT_GATE_TIMEOUT};
pub use http::{HttpGateConfig, HttpStatusGate};
pub use payload::{parse_status_body, ChargeSnapshot, StatusPayload, UserInfo};
pub use throttle::{BackoffBudget, GateThrottle};

use thiserror::Error;

use autofarm_core_types::FarmError;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("malformed status payload: {0}")]
    Payload(String),
}

impl From<GateError> for FarmError {
    fn from(err: GateError) -> Self {
        FarmError::new(format!("status gate: {err}"))
    }
}
