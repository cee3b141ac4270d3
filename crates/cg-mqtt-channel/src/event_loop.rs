//! MQTT event loop driver.
//!
//! Polls the rumqttc `EventLoop` on its own task, turning connection events
//! into session notifications and inbound publishes into handler dispatch.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Outgoing, Packet};
use tokio::time::Instant;

use crate::config::BackoffConfig;
use crate::session::SessionHandle;

/// Drive the event loop until the session is closed.
///
/// A handshake rejection before the first successful ConnAck is terminal:
/// the driver reports it and stops instead of retrying with bad credentials.
pub async fn run(
    mut eventloop: EventLoop,
    client: AsyncClient,
    session: Arc<SessionHandle>,
    backoff: BackoffConfig,
) {
    let mut backoff = Backoff::new(backoff);
    let mut connected_at: Option<Instant> = None;
    let mut ever_connected = false;

    loop {
        if session.is_closed() {
            break;
        }

        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    if ever_connected {
                        resubscribe(&client, &session);
                    }
                    ever_connected = true;
                    connected_at = Some(Instant::now());
                    session.on_online();
                } else if !ever_connected {
                    session.on_rejected(format!("{:?}", ack.code));
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                session.dispatch(&publish.topic, &publish.payload);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("disconnect sent");
            }
            Ok(_) => {}
            Err(e) => {
                if session.is_closed() {
                    break;
                }
                if !ever_connected && is_handshake_rejection(&e) {
                    session.on_rejected(e.to_string());
                    break;
                }
                session.on_offline();

                if let Some(since) = connected_at.take() {
                    backoff.connection_lost(since.elapsed());
                }
                let delay = backoff.next_delay();
                tracing::error!(
                    error = %e,
                    delay_secs = delay.as_secs(),
                    "MQTT event loop error, reconnecting"
                );
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = session.closed() => break,
                }
            }
        }
    }

    tracing::debug!("MQTT event loop driver stopped");
}

/// Re-issue registered subscriptions after a reconnect.
///
/// Uses `try_subscribe`: this runs on the task that drains the request
/// queue, so awaiting queue space here could never complete.
fn resubscribe(client: &AsyncClient, session: &SessionHandle) {
    for (filter, qos) in session.subscription_filters() {
        if let Err(e) = client.try_subscribe(filter.as_str(), qos) {
            tracing::warn!(filter = %filter, error = %e, "failed to re-subscribe");
        }
    }
}

fn is_handshake_rejection(error: &ConnectionError) -> bool {
    matches!(
        error,
        ConnectionError::ConnectionRefused(_) | ConnectionError::Tls(_)
    )
}

// ── Backoff ───────────────────────────────────────────────────

/// Exponential reconnect delay: `base * 2^n`, capped at `max`.
///
/// The exponent resets once a connection survives the stable threshold.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    pub fn next_delay(&mut self) -> Duration {
        let base = self.config.base_quiet_secs.max(1);
        let factor = 1u64 << self.attempt.min(16);
        let secs = base
            .saturating_mul(factor)
            .min(self.config.max_quiet_secs.max(base));
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_secs(secs)
    }

    /// Record how long the dropped connection had been up.
    pub fn connection_lost(&mut self, uptime: Duration) {
        if uptime >= Duration::from_secs(self.config.stable_connection_secs) {
            self.attempt = 0;
        }
    }
}
