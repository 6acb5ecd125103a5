use serde::{Deserialize, Serialize};

use crate::GateError;

/// Used when the payload omits the pool size.
pub const FALLBACK_MAX_CHARGES: u32 = 80;
/// Used when the payload omits the cooldown.
pub const FALLBACK_COOLDOWN_MS: u64 = 30_000;
/// Longest cooldown accepted from the service; larger values are clamped.
pub const MAX_COOLDOWN_MS: u64 = 24 * 60 * 60 * 1_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeSnapshot {
    pub count: u32,
    pub max: u32,
    pub regen_interval_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub droplets: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub charges: ChargeSnapshot,
    pub user: UserInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCharges {
    count: f64,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    cooldown_ms: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    charges: RawCharges,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    droplets: Option<f64>,
    #[serde(default)]
    level: Option<f64>,
}

fn floor_u32(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.floor().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

/// Parses the `/me`-style body. Fractional counts are floored and a count
/// above the pool size is clamped to it.
pub fn parse_status_body(body: &str) -> Result<StatusPayload, GateError> {
    let raw: RawStatus =
        serde_json::from_str(body).map_err(|err| GateError::Payload(err.to_string()))?;

    let max = raw
        .charges
        .max
        .map(floor_u32)
        .filter(|max| *max > 0)
        .unwrap_or(FALLBACK_MAX_CHARGES);
    let regen_interval_ms = raw
        .charges
        .cooldown_ms
        .filter(|ms| ms.is_finite() && *ms >= 1.0)
        .map(|ms| ms.min(MAX_COOLDOWN_MS as f64).floor() as u64)
        .unwrap_or(FALLBACK_COOLDOWN_MS);
    let count = floor_u32(raw.charges.count).min(max);

    Ok(StatusPayload {
        charges: ChargeSnapshot {
            count,
            max,
            regen_interval_ms,
        },
        user: UserInfo {
            id: raw.id,
            name: raw.name.filter(|name| !name.trim().is_empty()),
            droplets: raw.droplets.map(|d| floor_u32(d) as u64),
            level: raw.level.map(floor_u32),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_floors_fractional_counts() {
        let body = r#"{
            "id": 4411,
            "name": "painter",
            "droplets": 1520.0,
            "level": 12.7,
            "charges": { "count": 12.93, "max": 80, "cooldownMs": 30000 }
        }"#;
        let payload = parse_status_body(body).unwrap();
        assert_eq!(
            payload.charges,
            ChargeSnapshot {
                count: 12,
                max: 80,
                regen_interval_ms: 30_000
            }
        );
        assert_eq!(payload.user.name.as_deref(), Some("painter"));
        assert_eq!(payload.user.level, Some(12));
        assert_eq!(payload.user.droplets, Some(1520));
    }

    #[test]
    fn fills_missing_fields_with_service_defaults() {
        let payload = parse_status_body(r#"{"charges":{"count":3}}"#).unwrap();
        assert_eq!(payload.charges.max, FALLBACK_MAX_CHARGES);
        assert_eq!(payload.charges.regen_interval_ms, FALLBACK_COOLDOWN_MS);
        assert_eq!(payload.user, UserInfo::default());
    }

    #[test]
    fn clamps_count_to_max() {
        let payload =
            parse_status_body(r#"{"charges":{"count":120.5,"max":100,"cooldownMs":1}}"#).unwrap();
        assert_eq!(payload.charges.count, 100);
        assert_eq!(payload.charges.regen_interval_ms, 1);
    }

    #[test]
    fn huge_cooldown_is_capped() {
        let payload =
            parse_status_body(r#"{"charges":{"count":1,"max":5,"cooldownMs":1e30}}"#).unwrap();
        assert_eq!(payload.charges.regen_interval_ms, MAX_COOLDOWN_MS);
    }

    #[test]
    fn rejects_bodies_without_charges() {
        assert!(matches!(
            parse_status_body(r#"{"name":"x"}"#),
            Err(GateError::Payload(_))
        ));
        assert!(parse_status_body("<html>").is_err());
    }
}
