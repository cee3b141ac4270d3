//! MQTT session management for the CAN gateway (AWS IoT Core).
//!
//! - `Channel` trait over the broker transport (mockable in tests)
//! - `MqttChannel` with mTLS for production, driven by `event_loop::run`
//! - `SessionManager` owning the single connection: bounded connect with a
//!   probe fallback, non-fatal publishes, handler-based subscriptions
//! - `MockChannel` for testing without a broker
//! - `IncomingMessage` classification for inbound payloads

pub mod channel;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod handler;
pub mod mock;
pub mod session;
pub mod tls;

// Re-exports for convenience.
pub use channel::{Channel, MqttChannel};
pub use config::{BackoffConfig, MqttConfig};
pub use error::{MqttError, MqttResult};
pub use handler::{IncomingMessage, classify};
pub use mock::MockChannel;
pub use session::{InboundMessage, MessageHandler, SessionHandle, SessionManager};

pub use rumqttc::QoS;
