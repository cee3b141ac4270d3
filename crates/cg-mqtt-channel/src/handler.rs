//! Incoming message classification.
//!
//! Parses raw inbound publishes into typed `IncomingMessage` variants so
//! consumers can log or act on them without topic string matching.

use cg_protocol::topics;

use crate::session::InboundMessage;

/// A classified incoming MQTT message.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// JSON command for a gateway (`vehicle/{gateway_id}/commands`).
    Command {
        gateway_id: String,
        body: serde_json::Value,
    },
    /// JSON payload on any other topic.
    Json {
        topic: String,
        body: serde_json::Value,
    },
    /// Payload that is not valid JSON, kept as (lossy) UTF-8 text.
    Raw { topic: String, text: String },
}

/// Classify an inbound message.
///
/// JSON decoding is attempted first; anything that fails to decode is
/// reported as raw text.
pub fn classify(message: &InboundMessage) -> IncomingMessage {
    let Ok(body) = serde_json::from_slice::<serde_json::Value>(&message.payload) else {
        return IncomingMessage::Raw {
            topic: message.topic.clone(),
            text: String::from_utf8_lossy(&message.payload).into_owned(),
        };
    };

    match topics::parse_topic(&message.topic) {
        Some(parsed) if parsed.category == "commands" => IncomingMessage::Command {
            gateway_id: parsed.gateway_id,
            body,
        },
        _ => IncomingMessage::Json {
            topic: message.topic.clone(),
            body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_message(topic: &str, payload: &[u8]) -> InboundMessage {
        InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn classify_command() {
        let payload = serde_json::to_vec(&json!({"action": "reboot"})).unwrap();
        let msg = classify(&make_message("vehicle/can-gateway/commands", &payload));
        assert!(matches!(
            msg,
            IncomingMessage::Command { ref gateway_id, ref body }
                if gateway_id == "can-gateway" && body["action"] == "reboot"
        ));
    }

    #[test]
    fn classify_json_on_other_topic() {
        let msg = classify(&make_message("some/random/topic", b"{\"a\":1}"));
        assert!(matches!(msg, IncomingMessage::Json { ref body, .. } if body["a"] == 1));
    }

    #[test]
    fn classify_bad_payload_as_raw() {
        let msg = classify(&make_message("vehicle/can-gateway/commands", b"not-json"));
        assert_eq!(
            msg,
            IncomingMessage::Raw {
                topic: "vehicle/can-gateway/commands".into(),
                text: "not-json".into(),
            }
        );
    }

    #[test]
    fn classify_invalid_utf8_is_lossy() {
        let msg = classify(&make_message("vehicle/gw/commands", &[0xff, b'o', b'k']));
        assert!(matches!(msg, IncomingMessage::Raw { ref text, .. } if text.ends_with("ok")));
    }
}
