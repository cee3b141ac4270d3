//! Shared test harness for E2E integration tests.
//!
//! Wires the real gateway pieces (session manager, publisher, command
//! listener, control surface, shutdown coordinator) over a `MockChannel`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use cg_gateway::config::GatewayConfig;
use cg_gateway::routes::build_router;
use cg_gateway::shutdown::ShutdownCoordinator;
use cg_gateway::state::AppState;
use cg_gateway::{commands, publisher};
use cg_mqtt_channel::{MockChannel, SessionManager};

pub const THING: &str = "can-gateway";
pub const TELEMETRY_TOPIC: &str = "vehicle/can-gateway/telemetry";
pub const COMMANDS_TOPIC: &str = "vehicle/can-gateway/commands";

const CONFIG: &str = r#"
thing_name = "can-gateway"
publish_interval_seconds = 1

[mqtt]
endpoint = "broker.example.com"
port = 1883
client_id = "can-gateway"
use_tls = false
"#;

/// Gateway wired to a `MockChannel` instead of a broker.
pub struct TestHarness {
    pub mqtt: Arc<MockChannel>,
    pub session: Arc<SessionManager>,
    pub config: Arc<GatewayConfig>,
    pub router: Router,
    pub coordinator: Arc<ShutdownCoordinator>,
}

impl TestHarness {
    /// Harness over `mock`; the session is not connected yet.
    pub fn with_channel(mock: MockChannel) -> Self {
        let config = Arc::new(GatewayConfig::from_toml(CONFIG).unwrap());
        config.validate().unwrap();

        let mqtt = Arc::new(mock);
        let session = Arc::new(SessionManager::new(mqtt.clone(), &config.mqtt));
        let router = build_router(AppState::new(session.clone(), config.clone()));
        let coordinator = Arc::new(ShutdownCoordinator::new(
            session.clone(),
            CancellationToken::new(),
        ));

        Self {
            mqtt,
            session,
            config,
            router,
            coordinator,
        }
    }

    /// Harness whose mock reports online immediately.
    pub fn new() -> Self {
        Self::with_channel(MockChannel::new())
    }

    /// Harness with an established session.
    pub async fn connected() -> Self {
        let h = Self::new();
        assert!(h.session.connect().await, "mock session should connect");
        h
    }

    /// Start the scheduled publisher at `interval` under the coordinator.
    pub fn start_publisher(&self, interval: Duration) {
        let handle = publisher::spawn(
            self.session.clone(),
            THING,
            interval,
            self.coordinator.token(),
        );
        self.coordinator.track_publisher(handle);
    }

    /// Subscribe the command listener.
    pub async fn start_commands(&self) -> bool {
        commands::subscribe(&self.session, THING, commands::DEFAULT_QUEUE_DEPTH)
            .await
            .is_some()
    }

    /// GET `path` on the control surface. Returns (status, JSON body).
    pub async fn get(&self, path: &str) -> (StatusCode, serde_json::Value) {
        self.request(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// POST /publish with a raw body.
    pub async fn post_publish(&self, body: &str) -> (StatusCode, serde_json::Value) {
        self.request(
            Request::post("/publish")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn request(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, json)
    }

    /// Decoded payloads published to the telemetry topic.
    pub fn telemetry(&self) -> Vec<serde_json::Value> {
        self.mqtt
            .published_to(TELEMETRY_TOPIC)
            .iter()
            .map(|m| serde_json::from_slice(&m.payload).unwrap())
            .collect()
    }
}
