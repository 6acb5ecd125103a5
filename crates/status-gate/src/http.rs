use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::gate::{FetchOutcome, RemoteStatusGate};
use crate::payload::parse_status_body;
use crate::GateError;

pub const DEFAULT_STATUS_ENDPOINT: &str = "https://backend.wplace.live/me";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpGateConfig {
    #[serde(default = "HttpGateConfig::default_endpoint")]
    pub endpoint: String,
    /// Raw `Cookie` header carrying the session credentials.
    #[serde(default)]
    pub cookie: Option<String>,
    /// HTTP status the service uses for a temporary restriction.
    #[serde(default = "HttpGateConfig::default_ban_status")]
    pub ban_status: u16,
    /// Client-level ceiling; the controller additionally wraps reads in a
    /// much shorter `TimedGate`.
    #[serde(default = "HttpGateConfig::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl HttpGateConfig {
    fn default_endpoint() -> String {
        DEFAULT_STATUS_ENDPOINT.to_string()
    }

    fn default_ban_status() -> u16 {
        StatusCode::TOO_MANY_REQUESTS.as_u16()
    }

    fn default_request_timeout_ms() -> u64 {
        5_000
    }
}

impl Default for HttpGateConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            cookie: None,
            ban_status: Self::default_ban_status(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

pub struct HttpStatusGate {
    client: Client,
    endpoint: Url,
    cookie: Option<String>,
    ban_status: u16,
}

impl HttpStatusGate {
    pub fn new(config: HttpGateConfig) -> Result<Self, GateError> {
        let endpoint = Url::parse(&config.endpoint)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            cookie: config.cookie.filter(|c| !c.trim().is_empty()),
            ban_status: config.ban_status,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteStatusGate for HttpStatusGate {
    async fn fetch_status(&self) -> FetchOutcome {
        let mut request = self
            .client
            .get(self.endpoint.clone())
            .header(ACCEPT, "application/json");
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(?err, "status request failed");
                return FetchOutcome::Unavailable(format!("transport: {err}"));
            }
        };

        let status = response.status();
        if status.as_u16() == self.ban_status {
            warn!(status = status.as_u16(), "status endpoint reports temporary restriction");
            return FetchOutcome::TemporaryBan;
        }
        if !status.is_success() {
            debug!(status = status.as_u16(), "status endpoint returned non-success");
            return FetchOutcome::Unavailable(format!("http {}", status.as_u16()));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return FetchOutcome::Unavailable(format!("body: {err}")),
        };
        match parse_status_body(&body) {
            Ok(payload) => {
                debug!(
                    count = payload.charges.count,
                    max = payload.charges.max,
                    cooldown_ms = payload.charges.regen_interval_ms,
                    "status read"
                );
                FetchOutcome::Ok(payload)
            }
            Err(err) => {
                debug!(%err, "status payload rejected");
                FetchOutcome::Unavailable(err.to_string())
            }
        }
    }
}
