//! Shared application state for the control surface.

use std::sync::Arc;

use cg_mqtt_channel::SessionManager;
use cg_protocol::topics;

use crate::config::GatewayConfig;

/// Shared application state, cloned into every Axum handler.
///
/// Holds the same `SessionManager` the publish timer uses; handlers only
/// read its connectivity state or call `publish`.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionManager>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(session: Arc<SessionManager>, config: Arc<GatewayConfig>) -> Self {
        Self { session, config }
    }

    pub fn thing_name(&self) -> &str {
        &self.config.thing_name
    }

    /// Topic the gateway publishes telemetry to.
    pub fn telemetry_topic(&self) -> String {
        topics::telemetry(&self.config.thing_name)
    }
}
