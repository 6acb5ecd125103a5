use chrono::{DateTime, Local};

use autofarm_core_types::{Severity, Timestamp};
use autofarm_event_bus::StatusEvent;

/// Local wall-clock rendering of a millisecond timestamp.
pub fn format_timestamp(ms: Timestamp) -> String {
    DateTime::from_timestamp_millis(ms as i64)
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

pub fn render_event(event: &StatusEvent) -> String {
    let time = DateTime::from_timestamp_millis(event.at as i64)
        .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_default();
    let marker = match event.severity {
        Severity::Default => " ",
        Severity::Success => "+",
        Severity::Warning => "!",
        Severity::Error => "x",
    };
    format!("{time} {marker} {}", event.message())
}
