//! Gateway configuration, loadable from TOML or JSON.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, ensure};
use serde::Deserialize;

use cg_mqtt_channel::MqttConfig;

/// Top-level configuration for the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Gateway identity (IoT Core thing name). Used in topic names.
    pub thing_name: String,
    /// Seconds between scheduled telemetry publishes.
    #[serde(default = "default_publish_interval")]
    pub publish_interval_seconds: u64,
    /// MQTT connection settings.
    pub mqtt: MqttConfig,
    /// Control surface listener.
    #[serde(default)]
    pub http: HttpConfig,
}

/// HTTP control surface listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_publish_interval() -> u64 {
    300
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    5000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
        }
    }
}

impl GatewayConfig {
    /// Load config from a file path.
    ///
    /// `.json` files are parsed as JSON, anything else as TOML. Relative
    /// credential paths are resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;

        let mut config = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&contents)?
        } else {
            Self::from_toml(&contents)?
        };

        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.mqtt.resolve_paths(base_dir);

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("invalid TOML config")
    }

    pub fn from_json(contents: &str) -> anyhow::Result<Self> {
        serde_json::from_str(contents).context("invalid JSON config")
    }

    /// Reject configs the gateway cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.thing_name.trim().is_empty(), "thing_name must not be empty");
        ensure!(!self.mqtt.endpoint.trim().is_empty(), "mqtt.endpoint must not be empty");
        ensure!(!self.mqtt.client_id.trim().is_empty(), "mqtt.client_id must not be empty");
        ensure!(
            self.publish_interval_seconds > 0,
            "publish_interval_seconds must be positive"
        );
        let hz = self.mqtt.draining_frequency_hz;
        ensure!(
            hz.is_finite() && hz >= 0.0,
            "mqtt.draining_frequency_hz must be a finite, non-negative number"
        );
        if self.mqtt.use_tls {
            for (name, path) in [
                ("mqtt.cert_path", &self.mqtt.cert_path),
                ("mqtt.key_path", &self.mqtt.key_path),
                ("mqtt.ca_path", &self.mqtt.ca_path),
            ] {
                ensure!(!path.as_os_str().is_empty(), "{name} is required when use_tls is set");
            }
        }
        Ok(())
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.publish_interval_seconds)
    }

    /// Address the control surface listens on.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}
