//! Manual publish endpoint.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use chrono::Utc;
use serde_json::{Map, Value, json};

use cg_mqtt_channel::QoS;
use cg_protocol::{TelemetryEnvelope, stamp_payload};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /publish: publish one telemetry message now.
///
/// An empty body, `null` or `{}` publishes the default envelope. Any other
/// JSON object is published as given, with `timestamp` set to now. A body
/// that is not a JSON object fails like any other publish error (500).
pub async fn publish(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let payload = match parse_body(&body)? {
        Some(fields) => stamp_payload(fields, Utc::now()),
        None => {
            let envelope = TelemetryEnvelope::manual(state.thing_name());
            serde_json::to_value(envelope).map_err(|e| ApiError::Internal(e.to_string()))?
        }
    };

    let topic = state.telemetry_topic();
    if !state.session.publish(&topic, &payload, QoS::AtLeastOnce).await {
        return Err(ApiError::PublishFailed("Failed to publish".into()));
    }

    tracing::info!(topic = %topic, "manual publish");

    Ok(Json(json!({
        "status": "success",
        "topic": topic,
        "payload": payload,
    })))
}

/// `None` means "use the default envelope".
fn parse_body(body: &[u8]) -> ApiResult<Option<Map<String, Value>>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidPayload(format!("invalid JSON body: {e}")))?;

    match value {
        Value::Null => Ok(None),
        Value::Object(fields) if fields.is_empty() => Ok(None),
        Value::Object(fields) => Ok(Some(fields)),
        _ => Err(ApiError::InvalidPayload("payload must be a JSON object".into())),
    }
}
