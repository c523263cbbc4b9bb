//! Consumer-lock status: which execution consumer (local or cloud) currently
//! holds processing rights for a project. The last polled snapshot is
//! authoritative; lock continuity between polls is never assumed.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConsumerType {
    #[serde(rename = "LOCAL")]
    Local,
    #[serde(rename = "CLOUD")]
    Cloud,
}

impl ConsumerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerType::Local => "LOCAL",
            ConsumerType::Cloud => "CLOUD",
        }
    }
}

impl fmt::Display for ConsumerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsumerType {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "LOCAL" => Ok(ConsumerType::Local),
            "CLOUD" => Ok(ConsumerType::Cloud),
            other => Err(format!("Unknown consumer type: {other}")),
        }
    }
}

/// Normalized lock snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerStatus {
    pub locked: bool,
    pub consumer_id: Option<String>,
    pub consumer_type: Option<ConsumerType>,
    pub remaining_ms: i64,
    pub lease_ms: Option<i64>,
    pub expires_at: Option<String>,
    pub owned_by_you: bool,
    pub now: String,
}

/// Accept both lock-status shapes the backend emits and normalize.
///
/// Already-normalized payloads (carrying `locked`/`consumerType`/`now`) pass
/// through; otherwise the `{ ok, active, now, lock: {...} }` shape is mapped.
pub fn map_lock_status(raw: &Value, self_consumer_id: Option<&str>) -> ConsumerStatus {
    let looks_normalized = raw.get("locked").is_some()
        && raw.get("consumerType").is_some()
        && raw.get("now").is_some();

    if looks_normalized {
        let consumer_id = raw
            .get("consumerId")
            .and_then(Value::as_str)
            .map(str::to_string);
        return ConsumerStatus {
            locked: raw.get("locked").and_then(Value::as_bool).unwrap_or(false),
            consumer_type: parse_type(raw.get("consumerType")),
            remaining_ms: raw
                .get("remainingMs")
                .and_then(Value::as_i64)
                .unwrap_or(0)
                .max(0),
            lease_ms: raw.get("leaseMs").and_then(Value::as_i64),
            expires_at: raw
                .get("expiresAt")
                .and_then(Value::as_str)
                .map(str::to_string),
            owned_by_you: owned(self_consumer_id, consumer_id.as_deref()),
            now: match raw.get("now") {
                Some(Value::String(s)) => s.clone(),
                other => to_iso(other),
            },
            consumer_id,
        };
    }

    let lock = raw.get("lock").cloned().unwrap_or(Value::Null);
    let consumer_id = lock
        .get("consumerId")
        .and_then(Value::as_str)
        .map(str::to_string);
    ConsumerStatus {
        locked: raw.get("active").and_then(Value::as_bool).unwrap_or(false),
        consumer_type: parse_type(lock.get("consumerType")),
        remaining_ms: lock
            .get("expiresInMs")
            .and_then(Value::as_i64)
            .unwrap_or(0)
            .max(0),
        lease_ms: lock.get("leaseMs").and_then(Value::as_i64),
        expires_at: lock
            .get("expiresAt")
            .and_then(Value::as_i64)
            .map(|ms| to_iso(Some(&Value::from(ms)))),
        owned_by_you: owned(self_consumer_id, consumer_id.as_deref()),
        now: to_iso(raw.get("now")),
        consumer_id,
    }
}

fn owned(self_id: Option<&str>, holder: Option<&str>) -> bool {
    matches!((self_id, holder), (Some(a), Some(b)) if !a.is_empty() && a == b)
}

fn parse_type(v: Option<&Value>) -> Option<ConsumerType> {
    v.and_then(Value::as_str).and_then(|s| s.parse().ok())
}

fn to_iso(v: Option<&Value>) -> String {
    let ms = v.and_then(Value::as_i64);
    let stamp = ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);
    stamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_the_backend_lock_shape() {
        let raw = json!({
            "ok": true,
            "active": true,
            "now": 1700000000000_i64,
            "lock": {
                "consumerId": "c-1",
                "consumerType": "CLOUD",
                "leaseMs": 30000,
                "expiresAt": 1700000030000_i64,
                "expiresInMs": 25000
            }
        });
        let status = map_lock_status(&raw, Some("c-1"));
        assert!(status.locked);
        assert_eq!(status.consumer_type, Some(ConsumerType::Cloud));
        assert_eq!(status.remaining_ms, 25_000);
        assert_eq!(status.lease_ms, Some(30_000));
        assert!(status.owned_by_you);
        assert!(status.expires_at.as_deref().unwrap().starts_with("2023-11-14T22:13:50"));
    }

    #[test]
    fn passes_through_an_already_normalized_shape() {
        let raw = json!({
            "locked": true,
            "consumerId": "c-2",
            "consumerType": "LOCAL",
            "remainingMs": 12_000,
            "leaseMs": null,
            "expiresAt": "2026-01-01T00:00:00.000Z",
            "now": "2026-01-01T00:00:00.000Z"
        });
        let status = map_lock_status(&raw, Some("someone-else"));
        assert!(status.locked);
        assert_eq!(status.consumer_type, Some(ConsumerType::Local));
        assert_eq!(status.remaining_ms, 12_000);
        assert_eq!(status.expires_at.as_deref(), Some("2026-01-01T00:00:00.000Z"));
        assert!(!status.owned_by_you);
    }

    #[test]
    fn unlocked_snapshot_has_sane_defaults() {
        let status = map_lock_status(&json!({"ok": true, "active": false, "now": 0}), None);
        assert!(!status.locked);
        assert_eq!(status.consumer_id, None);
        assert_eq!(status.consumer_type, None);
        assert_eq!(status.remaining_ms, 0);
        assert!(!status.owned_by_you);
    }

    #[test]
    fn negative_remaining_clamps_to_zero() {
        let raw = json!({"active": true, "now": 0, "lock": {"expiresInMs": -5}});
        assert_eq!(map_lock_status(&raw, None).remaining_ms, 0);
    }

    #[test]
    fn unknown_consumer_type_maps_to_none() {
        let raw = json!({"active": true, "now": 0, "lock": {"consumerType": "HYBRID"}});
        assert_eq!(map_lock_status(&raw, None).consumer_type, None);
    }
}
