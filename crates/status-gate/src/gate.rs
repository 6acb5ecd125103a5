use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::payload::StatusPayload;

/// Upper bound on a single status read before it counts as unavailable.
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_millis(1_300);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok(StatusPayload),
    /// The service signalled a temporary restriction on this account.
    TemporaryBan,
    /// Transport, status or format failure; carries a short reason for logs.
    Unavailable(String),
}

impl FetchOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, FetchOutcome::Ok(_))
    }
}

#[async_trait]
pub trait RemoteStatusGate: Send + Sync {
    async fn fetch_status(&self) -> FetchOutcome;
}

#[async_trait]
impl<G> RemoteStatusGate for Arc<G>
where
    G: RemoteStatusGate + ?Sized,
{
    async fn fetch_status(&self) -> FetchOutcome {
        self.as_ref().fetch_status().await
    }
}

/// Bounds any gate with a timeout; a timed-out read is `Unavailable`.
pub struct TimedGate<G> {
    inner: G,
    timeout: Duration,
}

impl<G> TimedGate<G> {
    pub fn new(inner: G, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn with_default_timeout(inner: G) -> Self {
        Self::new(inner, DEFAULT_GATE_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<G> RemoteStatusGate for TimedGate<G>
where
    G: RemoteStatusGate,
{
    async fn fetch_status(&self) -> FetchOutcome {
        match tokio::time::timeout(self.timeout, self.inner.fetch_status()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(timeout_ms = self.timeout.as_millis() as u64, "status read timed out");
                FetchOutcome::Unavailable(format!(
                    "timed out after {}ms",
                    self.timeout.as_millis()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{ChargeSnapshot, UserInfo};

    struct SlowGate {
        delay: Duration,
    }

    #[async_trait]
    impl RemoteStatusGate for SlowGate {
        async fn fetch_status(&self) -> FetchOutcome {
            tokio::time::sleep(self.delay).await;
            FetchOutcome::Ok(StatusPayload {
                charges: ChargeSnapshot {
                    count: 1,
                    max: 2,
                    regen_interval_ms: 10,
                },
                user: UserInfo::default(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_reads_degrade_to_unavailable() {
        let gate = TimedGate::with_default_timeout(SlowGate {
            delay: Duration::from_secs(30),
        });
        let outcome = gate.fetch_status().await;
        assert!(matches!(outcome, FetchOutcome::Unavailable(ref reason) if reason.contains("1300")));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_reads_pass_through() {
        let gate = TimedGate::new(
            Arc::new(SlowGate {
                delay: Duration::from_millis(200),
            }),
            Duration::from_millis(1_500),
        );
        assert!(gate.fetch_status().await.is_ok());
    }
}
