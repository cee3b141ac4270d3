//! Mock MQTT channel for testing without a real broker.
//!
//! Records all published messages and subscription filters for assertion in
//! tests, and plays the transport's part in the session protocol: online or
//! offline notifications, silent notification channels, handshake rejection,
//! failures and inbound messages.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::QoS;

use crate::channel::Channel;
use crate::error::{MqttError, MqttResult};
use crate::session::SessionHandle;

/// A recorded publish call.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

/// How the mock reports connectivity once started.
#[derive(Debug, Clone)]
enum OnStart {
    Online,
    OnlineAfter(Duration),
    Silent,
    Reject(String),
}

#[derive(Debug, Default)]
struct Failures {
    start: Option<String>,
    publish: bool,
    subscribe: bool,
    disconnect: bool,
}

/// Mock implementation of the `Channel` trait.
///
/// Thread-safe via `Mutex` (fine for test contexts).
pub struct MockChannel {
    on_start: OnStart,
    failures: Mutex<Failures>,
    session: Mutex<Option<Arc<SessionHandle>>>,
    published: Mutex<Vec<PublishedMessage>>,
    subscriptions: Mutex<Vec<(String, QoS)>>,
    publish_attempts: AtomicUsize,
    start_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

impl MockChannel {
    /// Reports online as soon as the session starts.
    pub fn new() -> Self {
        Self::with_on_start(OnStart::Online)
    }

    /// Reports online `delay` after the session starts.
    pub fn online_after(delay: Duration) -> Self {
        Self::with_on_start(OnStart::OnlineAfter(delay))
    }

    /// Never sends a connectivity notification.
    pub fn silent() -> Self {
        Self::with_on_start(OnStart::Silent)
    }

    /// Reports a handshake rejection with `reason` when started.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self::with_on_start(OnStart::Reject(reason.into()))
    }

    fn with_on_start(on_start: OnStart) -> Self {
        Self {
            on_start,
            failures: Mutex::new(Failures::default()),
            session: Mutex::new(None),
            published: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            publish_attempts: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        }
    }

    // ── Failure injection ─────────────────────────────────────

    pub fn set_start_failure(&self, reason: Option<String>) {
        self.failures.lock().unwrap().start = reason;
    }

    pub fn set_publish_failure(&self, fail: bool) {
        self.failures.lock().unwrap().publish = fail;
    }

    pub fn set_subscribe_failure(&self, fail: bool) {
        self.failures.lock().unwrap().subscribe = fail;
    }

    pub fn set_disconnect_failure(&self, fail: bool) {
        self.failures.lock().unwrap().disconnect = fail;
    }

    // ── Transport events ──────────────────────────────────────

    /// Fire the online notification on the started session.
    pub fn go_online(&self) {
        if let Some(session) = self.session() {
            session.on_online();
        }
    }

    /// Fire the offline notification on the started session.
    pub fn go_offline(&self) {
        if let Some(session) = self.session() {
            session.on_offline();
        }
    }

    /// Deliver an inbound message to the session's handlers.
    ///
    /// Returns the number of handlers invoked.
    pub fn deliver(&self, topic: &str, payload: &[u8]) -> usize {
        self.session()
            .map(|session| session.dispatch(topic, payload))
            .unwrap_or(0)
    }

    fn session(&self) -> Option<Arc<SessionHandle>> {
        self.session.lock().unwrap().clone()
    }

    // ── Recorded state ────────────────────────────────────────

    /// Get all successfully published messages.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Get the last published message.
    pub fn last_published(&self) -> Option<PublishedMessage> {
        self.published.lock().unwrap().last().cloned()
    }

    /// Get published messages for a specific topic.
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Number of publish calls, including failed ones.
    pub fn publish_attempts(&self) -> usize {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    /// Get all subscription filters.
    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Check whether a subscription was made to the given filter.
    pub fn is_subscribed_to(&self, filter: &str) -> bool {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .any(|(f, _)| f == filter)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Clear recorded publishes and subscriptions.
    pub fn reset(&self) {
        self.published.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
        self.publish_attempts.store(0, Ordering::SeqCst);
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn start(&self, session: Arc<SessionHandle>) -> MqttResult<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.failures.lock().unwrap().start.clone() {
            return Err(MqttError::Connection(reason));
        }

        *self.session.lock().unwrap() = Some(Arc::clone(&session));

        match &self.on_start {
            OnStart::Online => session.on_online(),
            OnStart::OnlineAfter(delay) => {
                let delay = *delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    session.on_online();
                });
            }
            OnStart::Silent => {}
            OnStart::Reject(reason) => session.on_rejected(reason.clone()),
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failures.lock().unwrap().publish {
            return Err(MqttError::Publish("mock publish failure".into()));
        }

        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
        });
        Ok(())
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> MqttResult<()> {
        if self.failures.lock().unwrap().subscribe {
            return Err(MqttError::Subscribe("mock subscribe failure".into()));
        }

        self.subscriptions
            .lock()
            .unwrap()
            .push((filter.to_string(), qos));
        Ok(())
    }

    async fn disconnect(&self) -> MqttResult<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.lock().unwrap().disconnect {
            return Err(MqttError::Disconnect("mock disconnect failure".into()));
        }
        Ok(())
    }
}
