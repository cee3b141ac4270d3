use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status reported by a gateway that is able to publish.
pub const STATUS_ONLINE: &str = "online";

/// Message attached to envelopes produced by the publish timer.
pub const SCHEDULED_MESSAGE: &str = "Scheduled telemetry data";

/// Message attached to envelopes produced by a manual publish request.
pub const MANUAL_MESSAGE: &str = "Manual publish";

/// Minimal telemetry payload sent on every publish cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEnvelope {
    /// Wall-clock time in seconds since the Unix epoch.
    pub timestamp: f64,
    /// Gateway identity (IoT Core thing name).
    pub gateway_id: String,
    pub status: String,
    pub message: String,
}

impl TelemetryEnvelope {
    /// Build an `online` envelope stamped with `now`.
    pub fn online(
        gateway_id: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp: epoch_seconds(now),
            gateway_id: gateway_id.into(),
            status: STATUS_ONLINE.to_string(),
            message: message.into(),
        }
    }

    /// Envelope for the periodic publish timer.
    pub fn scheduled(gateway_id: impl Into<String>) -> Self {
        Self::online(gateway_id, SCHEDULED_MESSAGE, Utc::now())
    }

    /// Envelope for a manual publish without a caller-supplied body.
    pub fn manual(gateway_id: impl Into<String>) -> Self {
        Self::online(gateway_id, MANUAL_MESSAGE, Utc::now())
    }
}

/// Seconds since the Unix epoch with microsecond resolution.
pub fn epoch_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_micros() as f64 / 1_000_000.0
}

/// Overwrite (or insert) the `timestamp` field of a caller-supplied payload.
pub fn stamp_payload(mut payload: Map<String, Value>, now: DateTime<Utc>) -> Value {
    payload.insert("timestamp".to_string(), Value::from(epoch_seconds(now)));
    Value::Object(payload)
}
