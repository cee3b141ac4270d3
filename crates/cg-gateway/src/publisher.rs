//! Scheduled telemetry publisher.
//!
//! Publishes a `TelemetryEnvelope` at a configurable interval until the
//! shutdown token is cancelled. The wait between cycles is interruptible so
//! shutdown never has to sit out a full interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use cg_mqtt_channel::{QoS, SessionManager};
use cg_protocol::TelemetryEnvelope;
use cg_protocol::topics;

/// Result of a single publish cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Published,
    /// Session not connected; no publish was attempted.
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("failed to publish to {0}")]
    Publish(String),
}

/// Run one cycle: build a fresh envelope and publish it at QoS 1.
pub async fn publish_once(session: &SessionManager, gateway_id: &str) -> Result<Cycle, CycleError> {
    if !session.is_connected() {
        return Ok(Cycle::Skipped);
    }

    let topic = topics::telemetry(gateway_id);
    let envelope = TelemetryEnvelope::scheduled(gateway_id);

    if session.publish(&topic, &envelope, QoS::AtLeastOnce).await {
        tracing::info!(topic = %topic, timestamp = envelope.timestamp, "telemetry published");
        Ok(Cycle::Published)
    } else {
        Err(CycleError::Publish(topic))
    }
}

/// Run the publish loop until `shutdown` is cancelled.
///
/// A failed or skipped cycle is logged and the loop waits the normal
/// interval before trying again.
pub async fn run(
    session: Arc<SessionManager>,
    gateway_id: String,
    interval: Duration,
    shutdown: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs_f64(), "publisher started");

    while !shutdown.is_cancelled() {
        match publish_once(&session, &gateway_id).await {
            Ok(Cycle::Published) => {}
            Ok(Cycle::Skipped) => {
                tracing::warn!(state = %session.state(), "MQTT not connected, skipping publish");
            }
            Err(e) => tracing::error!(error = %e, "publish cycle failed"),
        }

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = time::sleep(interval) => {}
        }
    }

    tracing::info!("publisher stopped");
}

/// Spawn [`run`] on the runtime.
pub fn spawn(
    session: Arc<SessionManager>,
    gateway_id: impl Into<String>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run(session, gateway_id.into(), interval, shutdown))
}
