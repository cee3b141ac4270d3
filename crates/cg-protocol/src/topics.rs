//! MQTT topic builders, filter matching and parsing for the gateway.
//!
//! Topic structure:
//! ```text
//! vehicle/{gateway_id}/telemetry
//! vehicle/{gateway_id}/commands
//! $aws/things/{client_id}/shadow/get
//! ```

const PREFIX: &str = "vehicle";

// ─── Gateway topics ───

pub fn telemetry(gateway_id: &str) -> String {
    format!("{PREFIX}/{gateway_id}/telemetry")
}

pub fn commands(gateway_id: &str) -> String {
    format!("{PREFIX}/{gateway_id}/commands")
}

// ─── Broker-reserved topics ───

/// Shadow "get" request topic. Publishing `{}` here is harmless, which makes
/// it usable as a connectivity probe.
pub fn shadow_get(client_id: &str) -> String {
    format!("$aws/things/{client_id}/shadow/get")
}

// ─── Filter matching ───

/// Check whether a concrete topic matches an MQTT subscription filter.
///
/// Supports the single-level `+` and multi-level `#` wildcards. Topics
/// starting with `$` only match filters that also start with `$`.
pub fn matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && !filter.starts_with('$') {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

// ─── Topic parsing ───

/// Parsed gateway topic components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub gateway_id: String,
    pub category: String,
}

/// Parse a `vehicle/{gateway_id}/{category}` topic.
/// Returns `None` if the topic doesn't match the expected format.
pub fn parse_topic(topic: &str) -> Option<ParsedTopic> {
    let parts: Vec<&str> = topic.split('/').collect();

    match parts.as_slice() {
        [PREFIX, gateway_id, category] if !gateway_id.is_empty() && !category.is_empty() => {
            Some(ParsedTopic {
                gateway_id: gateway_id.to_string(),
                category: category.to_string(),
            })
        }
        _ => None,
    }
}
