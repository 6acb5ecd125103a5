use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    extract::State,
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};
use tracing::{error, info, warn};

use autofarm_event_bus::{ChallengePhase, StatusEvent, StatusKind};

/// Session counters fed from the status event stream.
pub struct FarmMetrics {
    registry: Registry,
    painted: IntCounter,
    confirmed: IntCounter,
    failed: IntCounterVec,
    recoveries: IntCounterVec,
    challenge_escalations: IntCounter,
    backoffs: IntCounter,
    charges: IntGauge,
}

impl FarmMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let painted = IntCounter::with_opts(Opts::new(
            "autofarm_painted_total",
            "Units confirmed as painted",
        ))?;
        let confirmed = IntCounter::with_opts(Opts::new(
            "autofarm_actions_confirmed_total",
            "Actions whose effect was confirmed",
        ))?;
        let failed = IntCounterVec::new(
            Opts::new(
                "autofarm_actions_failed_total",
                "Actions that failed, split by whether the dispatch committed",
            ),
            &["committed"],
        )?;
        let recoveries = IntCounterVec::new(
            Opts::new(
                "autofarm_recoveries_total",
                "Fail-ceiling recoveries grouped by result",
            ),
            &["result"],
        )?;
        let challenge_escalations = IntCounter::with_opts(Opts::new(
            "autofarm_challenge_manual_total",
            "Interstitials that needed a human",
        ))?;
        let backoffs = IntCounter::with_opts(Opts::new(
            "autofarm_status_backoffs_total",
            "Temporary restrictions reported by the status endpoint",
        ))?;
        let charges = IntGauge::with_opts(Opts::new(
            "autofarm_charges",
            "Last known charge count",
        ))?;

        registry.register(Box::new(painted.clone()))?;
        registry.register(Box::new(confirmed.clone()))?;
        registry.register(Box::new(failed.clone()))?;
        registry.register(Box::new(recoveries.clone()))?;
        registry.register(Box::new(challenge_escalations.clone()))?;
        registry.register(Box::new(backoffs.clone()))?;
        registry.register(Box::new(charges.clone()))?;

        Ok(Self {
            registry,
            painted,
            confirmed,
            failed,
            recoveries,
            challenge_escalations,
            backoffs,
            charges,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn observe(&self, event: &StatusEvent) {
        match &event.kind {
            StatusKind::ActionSucceeded { consumed, .. } => {
                self.confirmed.inc();
                self.painted.inc_by(u64::from(*consumed));
            }
            StatusKind::ActionFailed { committed, .. } => {
                let label = if *committed { "true" } else { "false" };
                self.failed.with_label_values(&[label]).inc();
            }
            StatusKind::RecoveryTriggered { .. } => {
                self.recoveries.with_label_values(&["triggered"]).inc();
            }
            StatusKind::RecoverySuppressed { .. } => {
                self.recoveries.with_label_values(&["suppressed"]).inc();
            }
            StatusKind::Challenge(ChallengePhase::ManualRequired) => {
                self.challenge_escalations.inc();
            }
            StatusKind::BackoffArmed { .. } => self.backoffs.inc(),
            StatusKind::StatsUpdated(stats) => self.charges.set(i64::from(stats.charges)),
            _ => {}
        }
    }

    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Feeds every published status event into `metrics` until the bus closes.
pub fn spawn_recorder(
    metrics: Arc<FarmMetrics>,
    mut rx: broadcast::Receiver<StatusEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => metrics.observe(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "metrics recorder lagged behind the status stream");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

pub fn spawn_metrics_server(port: u16, metrics: Arc<FarmMetrics>) -> Option<JoinHandle<()>> {
    if port == 0 {
        return None;
    }

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    info!(%addr, "metrics server listening");
    Some(tokio::spawn(async move {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app.into_make_service()).await {
                    error!(?err, "metrics server exited with error");
                }
            }
            Err(err) => {
                error!(?err, "failed to bind metrics listener");
            }
        }
    }))
}

async fn metrics_handler(State(metrics): State<Arc<FarmMetrics>>) -> Response {
    let format_type = TextEncoder::new().format_type().to_string();
    match metrics.render() {
        Ok(body) => match HeaderValue::from_str(&format_type) {
            Ok(value) => ([(axum::http::header::CONTENT_TYPE, value)], body).into_response(),
            Err(err) => {
                error!(?err, "failed to build content-type header");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "metric encode error",
                )
                    .into_response()
            }
        },
        Err(err) => {
            error!(?err, "failed to encode prometheus metrics");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "metric encode error",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use autofarm_core_types::SessionId;
    use autofarm_event_bus::StatsSnapshot;

    use super::*;

    fn event(kind: StatusKind) -> StatusEvent {
        StatusEvent::new(SessionId("metrics".into()), 0, kind)
    }

    #[test]
    fn status_events_drive_counters() {
        let metrics = FarmMetrics::new().unwrap();
        metrics.observe(&event(StatusKind::ActionSucceeded {
            consumed: 3,
            painted_total: 3,
        }));
        metrics.observe(&event(StatusKind::ActionFailed {
            committed: true,
            fail_streak: 1,
        }));
        metrics.observe(&event(StatusKind::Challenge(ChallengePhase::ManualRequired)));
        metrics.observe(&event(StatusKind::StatsUpdated(StatsSnapshot {
            charges: 17,
            ..StatsSnapshot::default()
        })));

        let text = metrics.render().unwrap();
        assert!(text.contains("autofarm_painted_total 3"));
        assert!(text.contains("autofarm_actions_confirmed_total 1"));
        assert!(text.contains("autofarm_actions_failed_total{committed=\"true\"} 1"));
        assert!(text.contains("autofarm_challenge_manual_total 1"));
        assert!(text.contains("autofarm_charges 17"));
    }

    #[tokio::test]
    async fn disabled_port_spawns_nothing() {
        let metrics = Arc::new(FarmMetrics::new().unwrap());
        assert!(spawn_metrics_server(0, metrics).is_none());
    }
}
