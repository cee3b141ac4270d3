//! Inbound command listener.
//!
//! The subscription handler runs on the MQTT dispatch task, so it only
//! classifies the payload and hands it off through a bounded channel. A
//! separate task does the logging.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use cg_mqtt_channel::{InboundMessage, IncomingMessage, QoS, SessionManager, classify};
use cg_protocol::topics;

/// Default depth of the handoff queue between dispatch and the logger.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Build a subscription handler that forwards classified messages to `tx`.
///
/// Never blocks: when the queue is full the message is dropped with a warning.
pub fn handler(
    tx: mpsc::Sender<IncomingMessage>,
) -> impl Fn(&InboundMessage) + Send + Sync + 'static {
    move |message| {
        let incoming = classify(message);
        if let Err(e) = tx.try_send(incoming) {
            tracing::warn!(topic = %message.topic, error = %e, "dropping inbound command");
        }
    }
}

/// Log every message received on `rx` until all senders are gone.
pub async fn run(mut rx: mpsc::Receiver<IncomingMessage>) {
    while let Some(message) = rx.recv().await {
        log_message(&message);
    }
    tracing::debug!("command listener stopped");
}

fn log_message(message: &IncomingMessage) {
    match message {
        IncomingMessage::Command { gateway_id, body } => {
            tracing::info!(gateway_id = %gateway_id, command = %body, "received command");
        }
        IncomingMessage::Json { topic, body } => {
            tracing::info!(topic = %topic, body = %body, "received message");
        }
        IncomingMessage::Raw { topic, text } => {
            tracing::info!(topic = %topic, raw = %text, "received non-JSON message");
        }
    }
}

/// Subscribe to the gateway's command topic and start the logging task.
///
/// Returns `None` if the subscription failed.
pub async fn subscribe(
    session: &SessionManager,
    gateway_id: &str,
    queue_depth: usize,
) -> Option<JoinHandle<()>> {
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    let topic = topics::commands(gateway_id);

    if !session.subscribe(&topic, QoS::AtLeastOnce, handler(tx)).await {
        tracing::warn!(topic = %topic, "command subscription failed, continuing without it");
        return None;
    }

    Some(tokio::spawn(run(rx)))
}
