//! Configuration readback.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /config: non-secret connection settings.
pub async fn get_config(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "endpoint": state.config.mqtt.endpoint,
        "thing_name": state.thing_name(),
        "client_id": state.config.mqtt.client_id,
        "publish_interval_seconds": state.config.publish_interval_seconds,
    }))
}
