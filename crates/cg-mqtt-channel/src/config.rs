use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// MQTT connection configuration, loadable from TOML or JSON.
///
/// Immutable once loaded; the session manager only ever reads it.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker hostname (e.g., AWS IoT ATS endpoint).
    pub endpoint: String,
    /// Broker port (default 8883 for TLS).
    #[serde(default = "default_port")]
    pub port: u16,
    /// MQTT client ID. Must match the IoT policy attached to the certificate.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Enable TLS (mTLS). When false, connects plaintext (local dev).
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
    /// Path to device X.509 certificate (PEM).
    #[serde(default)]
    pub cert_path: PathBuf,
    /// Path to device private key (PEM).
    #[serde(default)]
    pub key_path: PathBuf,
    /// Path to root CA certificate (e.g., AmazonRootCA1.pem).
    #[serde(default)]
    pub ca_path: PathBuf,
    /// Keep-alive interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    /// Reconnect backoff applied by the event loop driver.
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Maximum number of requests buffered while offline. Unbounded when absent.
    #[serde(default)]
    pub offline_queue_depth: Option<usize>,
    /// Rate (messages per second) at which queued requests are drained after
    /// a reconnect.
    #[serde(default = "default_draining_frequency")]
    pub draining_frequency_hz: f64,
    /// How long `connect()` waits for an online notification.
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    /// Poll period inside the confirmation window.
    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,
}

/// Exponential reconnect backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BackoffConfig {
    /// First delay after a connection drop.
    #[serde(default = "default_base_quiet")]
    pub base_quiet_secs: u64,
    /// Upper bound for the delay.
    #[serde(default = "default_max_quiet")]
    pub max_quiet_secs: u64,
    /// A connection that stays up this long resets the backoff.
    #[serde(default = "default_stable_connection")]
    pub stable_connection_secs: u64,
}

/// Request channel capacity used when the offline queue is unbounded.
pub const UNBOUNDED_QUEUE_CAPACITY: usize = 65_536;

/// Slowest drain rate honoured: one queued request per minute.
pub const MAX_PENDING_THROTTLE: Duration = Duration::from_secs(60);

impl MqttConfig {
    /// Minimal plaintext config, used for local brokers and tests.
    pub fn plaintext(endpoint: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            port,
            client_id: client_id.into(),
            use_tls: false,
            cert_path: PathBuf::new(),
            key_path: PathBuf::new(),
            ca_path: PathBuf::new(),
            keepalive_secs: default_keepalive(),
            backoff: BackoffConfig::default(),
            offline_queue_depth: None,
            draining_frequency_hz: default_draining_frequency(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            confirm_poll_ms: default_confirm_poll_ms(),
        }
    }

    /// Resolve relative credential paths against `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        for path in [&mut self.cert_path, &mut self.key_path, &mut self.ca_path] {
            if !path.as_os_str().is_empty() && path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn confirm_poll(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_ms)
    }

    /// Capacity of the rumqttc request channel.
    pub fn request_capacity(&self) -> usize {
        match self.offline_queue_depth {
            Some(depth) => depth.max(1),
            None => UNBOUNDED_QUEUE_CAPACITY,
        }
    }

    /// Delay between queued requests drained after a reconnect, capped at
    /// [`MAX_PENDING_THROTTLE`].
    pub fn pending_throttle(&self) -> Duration {
        if self.draining_frequency_hz > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.draining_frequency_hz)
                .map_or(MAX_PENDING_THROTTLE, |d| d.min(MAX_PENDING_THROTTLE))
        } else {
            Duration::ZERO
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_quiet_secs: default_base_quiet(),
            max_quiet_secs: default_max_quiet(),
            stable_connection_secs: default_stable_connection(),
        }
    }
}

fn default_use_tls() -> bool {
    true
}

fn default_port() -> u16 {
    8883
}

fn default_client_id() -> String {
    "can-gateway".to_string()
}

fn default_keepalive() -> u16 {
    30
}

fn default_draining_frequency() -> f64 {
    2.0
}

fn default_confirm_timeout_ms() -> u64 {
    10_000
}

fn default_confirm_poll_ms() -> u64 {
    500
}

fn default_base_quiet() -> u64 {
    1
}

fn default_max_quiet() -> u64 {
    32
}

fn default_stable_connection() -> u64 {
    20
}
