//! MQTT channel: the transport seam under the session manager.
//!
//! `MqttChannel` wraps `rumqttc::AsyncClient` and owns the matching
//! `EventLoop` until the session starts it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};

use crate::config::{BackoffConfig, MqttConfig};
use crate::error::{MqttError, MqttResult};
use crate::event_loop;
use crate::session::SessionHandle;
use crate::tls;

// ── Channel trait ─────────────────────────────────────────────

/// Abstraction over the broker transport.
///
/// Enables mocking in tests without a real MQTT broker.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Begin the broker handshake.
    ///
    /// Connectivity changes and inbound messages are reported through
    /// `session` from a context the caller does not control.
    async fn start(&self, session: Arc<SessionHandle>) -> MqttResult<()>;

    /// Publish a raw payload to a topic.
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()>;

    /// Subscribe to a topic filter.
    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()>;

    /// Close the connection.
    async fn disconnect(&self) -> MqttResult<()>;
}

// ── MqttChannel ───────────────────────────────────────────────

/// MQTT channel connected to AWS IoT Core.
///
/// The `EventLoop` is held until [`Channel::start`], which spawns the
/// driver task (see [`event_loop::run`]). Publishes use the non-blocking
/// `try_publish` so a full offline queue surfaces as an error instead of
/// stalling the caller.
pub struct MqttChannel {
    client: AsyncClient,
    eventloop: Mutex<Option<EventLoop>>,
    backoff: BackoffConfig,
}

impl MqttChannel {
    /// Create a channel from config: mTLS when `use_tls`, plaintext otherwise.
    pub fn new(config: &MqttConfig) -> MqttResult<Self> {
        let mut options = Self::options(config);

        if config.use_tls {
            let transport = tls::load_tls_transport(config)?;
            options.set_transport(transport);
        } else {
            tracing::info!("MQTT plaintext mode (no TLS)");
        }

        let (client, eventloop) = AsyncClient::new(options, config.request_capacity());

        Ok(Self {
            client,
            eventloop: Mutex::new(Some(eventloop)),
            backoff: config.backoff,
        })
    }

    fn options(config: &MqttConfig) -> MqttOptions {
        let mut options = MqttOptions::new(&config.client_id, &config.endpoint, config.port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs.into()));
        options.set_pending_throttle(config.pending_throttle());
        options
    }
}

#[async_trait]
impl Channel for MqttChannel {
    async fn start(&self, session: Arc<SessionHandle>) -> MqttResult<()> {
        let eventloop = self
            .eventloop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| MqttError::Connection("event loop already started".into()))?;

        tokio::spawn(event_loop::run(
            eventloop,
            self.client.clone(),
            session,
            self.backoff,
        ));
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        self.client
            .try_publish(topic, qos, false, payload.to_vec())
            .map_err(|e| MqttError::Publish(e.to_string()))
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()> {
        self.client
            .subscribe(filter, qos)
            .await
            .map_err(|e| MqttError::Subscribe(e.to_string()))
    }

    async fn disconnect(&self) -> MqttResult<()> {
        self.client
            .try_disconnect()
            .map_err(|e| MqttError::Disconnect(e.to_string()))
    }
}
