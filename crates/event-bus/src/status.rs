//! Status events published by the controller. The presentation layer maps
//! them to text and colours; the core never renders anything itself.

use serde::{Deserialize, Serialize};

use autofarm_core_types::timing::format_time_short;
use autofarm_core_types::{SessionId, Severity, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub session: SessionId,
    pub at: Timestamp,
    pub severity: Severity,
    pub kind: StatusKind,
}

impl StatusEvent {
    pub fn new(session: SessionId, at: Timestamp, kind: StatusKind) -> Self {
        let severity = kind.default_severity();
        Self {
            session,
            at,
            severity,
            kind,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Plain English summary, used by log output and the CLI printer.
    pub fn message(&self) -> String {
        self.kind.message()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum ChallengePhase {
    Detected,
    Attempting,
    Countdown { secs_left: u64 },
    Solved,
    ManualRequired,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub painted: u64,
    pub charges: u32,
    pub max_charges: u32,
    pub cooldown_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StatusKind {
    Started {
        auto_resumed: bool,
    },
    Paused,
    Stopped {
        reason: String,
    },
    WaitProgress {
        current: u32,
        target: u32,
        eta_ms: u64,
        eta_short: String,
    },
    ConfirmCountdown {
        secs_left: u64,
    },
    ActionSucceeded {
        consumed: u32,
        painted_total: u64,
    },
    ActionFailed {
        committed: bool,
        fail_streak: u32,
    },
    BackoffArmed {
        actions: u32,
    },
    BackoffProgress {
        remaining: u32,
    },
    BackoffWait {
        wait_ms: u64,
    },
    Challenge(ChallengePhase),
    RecoveryTriggered {
        reason: String,
    },
    RecoverySuppressed {
        reason: String,
        cooldown_left_ms: u64,
    },
    Recalibrated {
        ok: bool,
    },
    StatsUpdated(StatsSnapshot),
}

impl StatusKind {
    pub fn default_severity(&self) -> Severity {
        match self {
            StatusKind::Started { .. } | StatusKind::ActionSucceeded { .. } => Severity::Success,
            StatusKind::Challenge(ChallengePhase::Solved) => Severity::Success,
            StatusKind::Challenge(ChallengePhase::Detected)
            | StatusKind::Challenge(ChallengePhase::ManualRequired)
            | StatusKind::ActionFailed { .. }
            | StatusKind::RecoverySuppressed { .. }
            | StatusKind::BackoffWait { .. } => Severity::Warning,
            StatusKind::RecoveryTriggered { .. } => Severity::Error,
            _ => Severity::Default,
        }
    }

    pub fn message(&self) -> String {
        match self {
            StatusKind::Started { auto_resumed: true } => "Painting resumed after reload".into(),
            StatusKind::Started { .. } => "Painting started".into(),
            StatusKind::Paused => "Painting paused".into(),
            StatusKind::Stopped { reason } => format!("Stopped: {reason}"),
            StatusKind::WaitProgress {
                current,
                target,
                eta_short,
                ..
            } => format!("Recharging {current}/{target} · ETA {eta_short}"),
            StatusKind::ConfirmCountdown { secs_left } => {
                format!("Confirming paint… {}", format_time_short(secs_left * 1_000))
            }
            StatusKind::ActionSucceeded {
                consumed,
                painted_total,
            } => format!("Pixel painted (+{consumed}, total {painted_total})"),
            StatusKind::ActionFailed { fail_streak, .. } => {
                format!("Failed to paint (streak {fail_streak})")
            }
            StatusKind::BackoffArmed { actions } => {
                format!("Status endpoint restricted; pausing status checks for {actions} actions")
            }
            StatusKind::BackoffProgress { remaining } => {
                format!("Status checks resume in {remaining} actions")
            }
            StatusKind::BackoffWait { wait_ms } => {
                format!("Waiting {} before retrying...", format_time_short(*wait_ms))
            }
            StatusKind::Challenge(phase) => match phase {
                ChallengePhase::Detected => "Possible security challenge detected".into(),
                ChallengePhase::Attempting => "Trying to clear the security challenge".into(),
                ChallengePhase::Countdown { secs_left } => format!(
                    "Waiting {} before retrying...",
                    format_time_short(secs_left * 1_000)
                ),
                ChallengePhase::Solved => "Validation complete. Resuming...".into(),
                ChallengePhase::ManualRequired => {
                    "Security challenge needs a human. Solve it, then start again.".into()
                }
            },
            StatusKind::RecoveryTriggered { reason } => {
                format!("Too many failures ({reason}); reloading session")
            }
            StatusKind::RecoverySuppressed {
                reason,
                cooldown_left_ms,
            } => format!(
                "Recovery skipped ({reason}); last reload was recent, {} left",
                format_time_short(*cooldown_left_ms)
            ),
            StatusKind::Recalibrated { ok } => {
                if *ok {
                    "View recalibrated".into()
                } else {
                    "View recalibration failed".into()
                }
            }
            StatusKind::StatsUpdated(stats) => format!(
                "Painted {} · charges {}/{} · cooldown {}",
                stats.painted,
                stats.charges,
                stats.max_charges,
                format_time_short(stats.cooldown_ms)
            ),
        }
    }
}
