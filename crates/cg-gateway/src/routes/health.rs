//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /health: liveness plus MQTT connectivity.
///
/// Reads only the session's atomic state, so it answers even while a
/// connect attempt is still waiting for confirmation.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let connection_state = state.session.state();

    Json(json!({
        "status": "healthy",
        "mqtt_connected": connection_state.is_online(),
        "connection_state": connection_state,
        "last_online": state.session.last_online().map(|t| t.to_rfc3339()),
        "config": {
            "endpoint": state.session.endpoint(),
            "thing_name": state.thing_name(),
            "publish_interval_seconds": state.config.publish_interval_seconds,
        },
    }))
}
