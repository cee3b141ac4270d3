//! Session manager, the single owner of the broker connection.
//!
//! `SessionManager` wraps a [`Channel`] and tracks connectivity in a
//! [`SessionHandle`] shared with the transport's event loop driver. The
//! handle's state is written only by the online/offline notifications and by
//! the connect fallback probe; everything else reads it lock-free.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rumqttc::QoS;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::{self, Instant};

use cg_protocol::ConnectionState;
use cg_protocol::topics;

use crate::channel::Channel;
use crate::config::MqttConfig;
use crate::error::MqttResult;

/// A message delivered by the broker on a subscribed topic.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Callback invoked for inbound messages.
///
/// Runs on the transport's dispatch task: it must return quickly and must
/// not block. Hand work off (e.g. through a channel) instead of doing it inline.
pub type MessageHandler = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

struct Subscription {
    filter: String,
    qos: QoS,
    handler: MessageHandler,
}

// ── SessionHandle ─────────────────────────────────────────────

/// Connectivity state and subscription registry shared between the session
/// manager and the transport.
pub struct SessionHandle {
    state: AtomicU8,
    /// Serializes state writers; readers go through `state` only.
    transitions: Mutex<Transitions>,
    closed_notify: Notify,
    last_online: Mutex<Option<DateTime<Utc>>>,
    rejection: Mutex<Option<String>>,
    subscriptions: RwLock<Vec<Subscription>>,
}

#[derive(Default)]
struct Transitions {
    closed: bool,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            transitions: Mutex::new(Transitions::default()),
            closed_notify: Notify::new(),
            last_online: Mutex::new(None),
            rejection: Mutex::new(None),
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// When the session was last confirmed online.
    pub fn last_online(&self) -> Option<DateTime<Utc>> {
        *self.last_online.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `disconnect()` has been called on this session.
    pub fn is_closed(&self) -> bool {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    /// Resolves once the session has been closed.
    pub async fn closed(&self) {
        let notified = self.closed_notify.notified();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    // ── Transport notifications ───────────────────────────────

    /// The transport reports the broker accepted the connection.
    ///
    /// Ignored unless a connect is in progress or the session was already
    /// established; a failed or closed session stays `Disconnected`.
    pub fn on_online(&self) {
        use ConnectionState::{Connecting, Offline, Online};
        if self.transition(&[Connecting, Online, Offline], Online) {
            tracing::info!("MQTT session online");
        }
    }

    /// The transport reports the connection dropped. Only an `Online`
    /// session can go `Offline`.
    pub fn on_offline(&self) {
        use ConnectionState::{Offline, Online};
        if self.transition(&[Online], Offline) {
            tracing::warn!("MQTT session offline");
        }
    }

    /// The transport reports the broker (or TLS layer) refused the handshake.
    ///
    /// Does not touch connectivity state; `connect()` picks the reason up
    /// while it waits for confirmation.
    pub fn on_rejected(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!(reason = %reason, "MQTT handshake rejected");
        *self.rejection.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason);
    }

    /// Deliver an inbound message to every handler whose filter matches.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
        let handlers: Vec<MessageHandler> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| topics::matches(&s.filter, topic))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        if handlers.is_empty() {
            tracing::debug!(topic = %topic, "no handler for inbound message");
            return 0;
        }

        let message = InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        };
        for handler in &handlers {
            handler(&message);
        }
        handlers.len()
    }

    /// Registered subscription filters, for re-subscribing after a reconnect.
    pub fn subscription_filters(&self) -> Vec<(String, QoS)> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| (s.filter.clone(), s.qos))
            .collect()
    }

    // ── Session manager side ──────────────────────────────────

    /// `Disconnected → Connecting`. Fails if the session is closed or a
    /// connect already happened.
    pub(crate) fn begin_connect(&self) -> bool {
        let guard = self
            .transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.closed || self.state() != ConnectionState::Disconnected {
            return false;
        }
        self.rejection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.store(ConnectionState::Connecting);
        true
    }

    /// Fallback path: the probe publish went through.
    fn confirm_online(&self) -> bool {
        self.transition(&[ConnectionState::Connecting], ConnectionState::Online)
    }

    fn connect_failed(&self) {
        self.transition(&[ConnectionState::Connecting], ConnectionState::Disconnected);
    }

    fn take_rejection(&self) -> Option<String> {
        self.rejection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Mark the session closed and force `Disconnected`. Later notifications
    /// are ignored.
    pub(crate) fn close(&self) {
        let mut guard = self
            .transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard.closed = true;
        self.store(ConnectionState::Disconnected);
        self.closed_notify.notify_waiters();
    }

    pub(crate) fn register(&self, filter: &str, qos: QoS, handler: MessageHandler) {
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription {
                filter: filter.to_string(),
                qos,
                handler,
            });
    }

    /// Remove exactly the registration holding `handler`; other handlers on
    /// the same filter stay.
    fn unregister(&self, handler: &MessageHandler) {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = subscriptions
            .iter()
            .rposition(|s| Arc::ptr_eq(&s.handler, handler))
        {
            subscriptions.remove(index);
        }
    }

    /// Move to `next` if the session is open and currently in one of `from`.
    /// Returns whether the state actually changed.
    fn transition(&self, from: &[ConnectionState], next: ConnectionState) -> bool {
        let guard = self
            .transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let current = self.state();
        if guard.closed || !from.contains(&current) {
            return false;
        }
        self.store(next);
        if next == ConnectionState::Online {
            *self.last_online.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        }
        current != next
    }

    fn store(&self, next: ConnectionState) {
        self.state.store(next.as_u8(), Ordering::Release);
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ── SessionManager ────────────────────────────────────────────

/// Outcome of waiting for the online notification.
#[derive(Debug, PartialEq, Eq)]
enum Confirmation {
    Online,
    Rejected(String),
    Silent,
}

/// Owns the single broker connection used by every publisher in the process.
pub struct SessionManager {
    channel: Arc<dyn Channel>,
    handle: Arc<SessionHandle>,
    endpoint: String,
    client_id: String,
    confirm_timeout: Duration,
    confirm_poll: Duration,
}

impl SessionManager {
    pub fn new(channel: Arc<dyn Channel>, config: &MqttConfig) -> Self {
        Self {
            channel,
            handle: Arc::new(SessionHandle::new()),
            endpoint: config.endpoint.clone(),
            client_id: config.client_id.clone(),
            confirm_timeout: config.confirm_timeout(),
            confirm_poll: config.confirm_poll(),
        }
    }

    /// Override the connect confirmation window.
    pub fn with_confirmation(mut self, timeout: Duration, poll: Duration) -> Self {
        self.confirm_timeout = timeout;
        self.confirm_poll = poll;
        self
    }

    pub fn handle(&self) -> &Arc<SessionHandle> {
        &self.handle
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_online()
    }

    pub fn last_online(&self) -> Option<DateTime<Utc>> {
        self.handle.last_online()
    }

    /// Open the session and wait (bounded) for it to be confirmed online.
    ///
    /// Returns `true` when an online notification arrives inside the
    /// confirmation window, or when the window elapses silently and the
    /// diagnostic probe publish succeeds.
    pub async fn connect(&self) -> bool {
        if !self.handle.begin_connect() {
            tracing::warn!(
                state = %self.state(),
                "connect called on a session that is closed or already started"
            );
            return false;
        }

        tracing::info!(
            endpoint = %self.endpoint,
            client_id = %self.client_id,
            "connecting to broker"
        );

        if let Err(e) = self.channel.start(Arc::clone(&self.handle)).await {
            tracing::error!(error = %e, "MQTT connection failed");
            self.handle.connect_failed();
            return false;
        }

        match self.await_confirmation().await {
            Confirmation::Online => {
                tracing::info!("connection confirmed by online notification");
                true
            }
            Confirmation::Rejected(reason) => {
                tracing::error!(reason = %reason, "broker refused connection");
                self.abandon().await;
                false
            }
            Confirmation::Silent => {
                tracing::info!(
                    timeout_ms = self.confirm_timeout.as_millis() as u64,
                    "no online notification, verifying connection with probe publish"
                );
                match self.probe().await {
                    Ok(()) => {
                        self.handle.confirm_online();
                        if self.is_connected() {
                            tracing::info!("probe publish succeeded, connection is active");
                            true
                        } else {
                            tracing::warn!("session closed while probing");
                            false
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "probe publish failed, connection not established"
                        );
                        self.abandon().await;
                        false
                    }
                }
            }
        }
    }

    async fn await_confirmation(&self) -> Confirmation {
        let deadline = Instant::now() + self.confirm_timeout;
        let poll = self.confirm_poll.max(Duration::from_millis(1));

        loop {
            if self.is_connected() {
                return Confirmation::Online;
            }
            if let Some(reason) = self.handle.take_rejection() {
                return Confirmation::Rejected(reason);
            }

            let now = Instant::now();
            if now >= deadline {
                return Confirmation::Silent;
            }
            time::sleep(poll.min(deadline - now)).await;
        }
    }

    /// Tear down a session whose connect failed after the transport started,
    /// so its driver stops reconnecting and late notifications are ignored.
    async fn abandon(&self) {
        self.handle.close();
        if let Err(e) = self.channel.disconnect().await {
            tracing::debug!(error = %e, "transport already stopped");
        }
    }

    async fn probe(&self) -> MqttResult<()> {
        let topic = topics::shadow_get(&self.client_id);
        self.channel
            .publish(&topic, b"{}", QoS::AtMostOnce)
            .await
    }

    /// Serialize `payload` as JSON and publish it.
    ///
    /// Returns `false` on any serialization or transport failure; never
    /// changes connectivity state.
    pub async fn publish<T>(&self, topic: &str, payload: &T, qos: QoS) -> bool
    where
        T: Serialize + ?Sized,
    {
        match self.try_publish(topic, payload, qos).await {
            Ok(bytes) => {
                tracing::debug!(topic = %topic, bytes, "published");
                true
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "publish failed");
                false
            }
        }
    }

    async fn try_publish<T>(&self, topic: &str, payload: &T, qos: QoS) -> MqttResult<usize>
    where
        T: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec(payload)?;
        self.channel.publish(topic, &bytes, qos).await?;
        Ok(bytes.len())
    }

    /// Register `handler` for messages matching `filter` and subscribe.
    ///
    /// The handler runs on the transport's dispatch task (see
    /// [`MessageHandler`]).
    pub async fn subscribe<F>(&self, filter: &str, qos: QoS, handler: F) -> bool
    where
        F: Fn(&InboundMessage) + Send + Sync + 'static,
    {
        let handler: MessageHandler = Arc::new(handler);
        self.handle.register(filter, qos, Arc::clone(&handler));

        match self.channel.subscribe(filter, qos).await {
            Ok(()) => {
                tracing::info!(filter = %filter, "subscribed");
                true
            }
            Err(e) => {
                tracing::error!(filter = %filter, error = %e, "subscribe failed");
                self.handle.unregister(&handler);
                false
            }
        }
    }

    /// Close the session. Errors are logged, never returned.
    pub async fn disconnect(&self) {
        self.handle.close();

        match self.channel.disconnect().await {
            Ok(()) => tracing::info!("MQTT session disconnected"),
            Err(e) => tracing::error!(error = %e, "disconnect failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::mock::MockChannel;

    fn manager(mock: &Arc<MockChannel>) -> SessionManager {
        let config = MqttConfig::plaintext("localhost", 1883, "gw-test");
        SessionManager::new(mock.clone(), &config)
            .with_confirmation(Duration::from_millis(200), Duration::from_millis(20))
    }

    // ── SessionHandle ───────────────────────────────────────────

    #[test]
    fn handle_starts_disconnected() {
        let handle = SessionHandle::new();
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(handle.last_online().is_none());
        assert!(!handle.is_closed());
    }

    #[test]
    fn notifications_flip_state() {
        let handle = SessionHandle::new();
        assert!(handle.begin_connect());
        handle.on_online();
        assert_eq!(handle.state(), ConnectionState::Online);
        assert!(handle.last_online().is_some());

        handle.on_offline();
        assert_eq!(handle.state(), ConnectionState::Offline);

        handle.on_online();
        assert_eq!(handle.state(), ConnectionState::Online);
    }

    #[test]
    fn notifications_ignored_after_close() {
        let handle = SessionHandle::new();
        assert!(handle.begin_connect());
        handle.on_online();
        handle.close();
        handle.on_online();
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn online_ignored_without_connect() {
        let handle = SessionHandle::new();
        handle.on_online();
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(handle.last_online().is_none());
    }

    #[test]
    fn offline_only_follows_online() {
        let handle = SessionHandle::new();
        handle.on_offline();
        assert_eq!(handle.state(), ConnectionState::Disconnected);

        assert!(handle.begin_connect());
        handle.on_offline();
        assert_eq!(handle.state(), ConnectionState::Connecting);
    }

    #[test]
    fn unregister_removes_only_that_handler() {
        let handle = SessionHandle::new();
        let first: MessageHandler = Arc::new(|_msg: &InboundMessage| {});
        let second: MessageHandler = Arc::new(|_msg: &InboundMessage| {});
        handle.register("vehicle/gw/commands", QoS::AtLeastOnce, first.clone());
        handle.register("vehicle/gw/commands", QoS::AtLeastOnce, second.clone());

        handle.unregister(&second);
        assert_eq!(handle.subscription_filters().len(), 1);
        assert_eq!(handle.dispatch("vehicle/gw/commands", b"{}"), 1);

        handle.unregister(&second);
        assert_eq!(handle.subscription_filters().len(), 1);
    }

    #[tokio::test]
    async fn closed_resolves_after_close() {
        let handle = Arc::new(SessionHandle::new());
        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.closed().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        handle.close();
        time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        // Already closed: resolves immediately.
        handle.closed().await;
    }

    #[test]
    fn dispatch_matches_wildcards() {
        let handle = SessionHandle::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        handle.register(
            "vehicle/+/commands",
            QoS::AtLeastOnce,
            Arc::new(move |_msg: &InboundMessage| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(handle.dispatch("vehicle/gw/commands", b"{}"), 1);
        assert_eq!(handle.dispatch("vehicle/gw/telemetry", b"{}"), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejection_is_consumed_once() {
        let handle = SessionHandle::new();
        handle.on_rejected("NotAuthorized");
        assert_eq!(handle.take_rejection().as_deref(), Some("NotAuthorized"));
        assert!(handle.take_rejection().is_none());
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    // ── connect ─────────────────────────────────────────────────

    #[tokio::test]
    async fn connect_confirmed_by_notification_skips_probe() {
        let mock = Arc::new(MockChannel::new());
        let session = manager(&mock);

        assert!(session.connect().await);
        assert_eq!(session.state(), ConnectionState::Online);
        assert!(mock.published_to("$aws/things/gw-test/shadow/get").is_empty());
    }

    #[tokio::test]
    async fn late_notification_inside_window_skips_probe() {
        let mock = Arc::new(MockChannel::online_after(Duration::from_millis(60)));
        let session = manager(&mock);

        assert!(session.connect().await);
        assert!(mock.published().is_empty());
    }

    #[tokio::test]
    async fn silent_window_falls_back_to_probe() {
        let mock = Arc::new(MockChannel::silent());
        let session = manager(&mock);

        assert!(session.connect().await);
        assert_eq!(session.state(), ConnectionState::Online);

        let probes = mock.published_to("$aws/things/gw-test/shadow/get");
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].payload, b"{}");
        assert_eq!(probes[0].qos, QoS::AtMostOnce);
    }

    #[tokio::test]
    async fn failed_probe_fails_connect() {
        let mock = Arc::new(MockChannel::silent());
        mock.set_publish_failure(true);
        let session = manager(&mock);

        assert!(!session.connect().await);
        assert_eq!(session.state(), ConnectionState::Disconnected);

        // The transport is torn down and cannot revive the session.
        assert_eq!(mock.disconnect_calls(), 1);
        assert!(session.handle().is_closed());
        mock.go_online();
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn start_failure_fails_connect() {
        let mock = Arc::new(MockChannel::new());
        mock.set_start_failure(Some("dns lookup failed".into()));
        let session = manager(&mock);

        assert!(!session.connect().await);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(mock.publish_attempts(), 0);
        // Nothing was started, so there is nothing to tear down.
        assert_eq!(mock.disconnect_calls(), 0);
    }

    #[tokio::test]
    async fn handshake_rejection_fails_without_probe() {
        let mock = Arc::new(MockChannel::rejecting("NotAuthorized"));
        let session = manager(&mock);

        assert!(!session.connect().await);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(mock.publish_attempts(), 0);

        assert_eq!(mock.disconnect_calls(), 1);
        mock.go_online();
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(!session.connect().await);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_bounded_by_window() {
        let mock = Arc::new(MockChannel::silent());
        let config = MqttConfig::plaintext("localhost", 1883, "gw-test");
        let session = SessionManager::new(mock.clone(), &config);

        let started = Instant::now();
        assert!(session.connect().await);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(11), "{elapsed:?}");
    }

    #[tokio::test]
    async fn closed_session_cannot_reconnect() {
        let mock = Arc::new(MockChannel::new());
        let session = manager(&mock);

        assert!(session.connect().await);
        session.disconnect().await;
        assert!(!session.connect().await);
        assert_eq!(mock.start_calls(), 1);
    }

    // ── publish / subscribe / disconnect ─────────────────────────

    #[tokio::test]
    async fn publish_serializes_json() {
        let mock = Arc::new(MockChannel::new());
        let session = manager(&mock);
        session.connect().await;

        let ok = session
            .publish("vehicle/gw/telemetry", &serde_json::json!({"rpm": 1500}), QoS::AtLeastOnce)
            .await;
        assert!(ok);

        let last = mock.last_published().unwrap();
        assert_eq!(last.topic, "vehicle/gw/telemetry");
        assert_eq!(last.qos, QoS::AtLeastOnce);
        let body: serde_json::Value = serde_json::from_slice(&last.payload).unwrap();
        assert_eq!(body["rpm"], 1500);
    }

    #[tokio::test]
    async fn failed_publish_returns_false_and_keeps_state() {
        let mock = Arc::new(MockChannel::new());
        let session = manager(&mock);
        session.connect().await;
        mock.set_publish_failure(true);

        assert!(!session.publish("vehicle/gw/telemetry", "x", QoS::AtLeastOnce).await);
        assert_eq!(session.state(), ConnectionState::Online);
    }

    #[tokio::test]
    async fn subscribe_routes_inbound_messages() {
        let mock = Arc::new(MockChannel::new());
        let session = manager(&mock);
        session.connect().await;

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let ok = session
            .subscribe("vehicle/gw/commands", QoS::AtLeastOnce, move |msg| {
                sink.lock().unwrap().push(msg.payload.clone());
            })
            .await;
        assert!(ok);
        assert!(mock.is_subscribed_to("vehicle/gw/commands"));

        mock.deliver("vehicle/gw/commands", b"{\"cmd\":\"ping\"}");
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_subscribe_unregisters_handler() {
        let mock = Arc::new(MockChannel::new());
        mock.set_subscribe_failure(true);
        let session = manager(&mock);

        assert!(!session.subscribe("vehicle/gw/commands", QoS::AtLeastOnce, |_| {}).await);
        assert!(session.handle().subscription_filters().is_empty());
    }

    #[tokio::test]
    async fn failed_subscribe_keeps_earlier_handler_on_same_filter() {
        let mock = Arc::new(MockChannel::new());
        let session = manager(&mock);
        assert!(session.connect().await);

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let ok = session
            .subscribe("vehicle/gw/commands", QoS::AtLeastOnce, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert!(ok);

        mock.set_subscribe_failure(true);
        assert!(!session.subscribe("vehicle/gw/commands", QoS::AtLeastOnce, |_| {}).await);

        assert_eq!(session.handle().subscription_filters().len(), 1);
        assert_eq!(mock.deliver("vehicle/gw/commands", b"{}"), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unserializable_payload_returns_false() {
        use std::collections::HashMap;

        let mock = Arc::new(MockChannel::new());
        let session = manager(&mock);
        assert!(session.connect().await);

        // JSON object keys must be strings.
        let mut payload = HashMap::new();
        payload.insert((1, 2), "x");
        assert!(!session.publish("vehicle/gw/telemetry", &payload, QoS::AtLeastOnce).await);
        assert_eq!(mock.publish_attempts(), 0);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn disconnect_swallows_errors() {
        let mock = Arc::new(MockChannel::new());
        let session = manager(&mock);
        session.connect().await;
        mock.set_disconnect_failure(true);

        session.disconnect().await;
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(mock.disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn notifications_after_disconnect_are_ignored() {
        let mock = Arc::new(MockChannel::new());
        let session = manager(&mock);
        session.connect().await;
        session.disconnect().await;

        mock.go_online();
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }
}
