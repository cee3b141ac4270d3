//! TLS configuration for mTLS connections to AWS IoT Core.
//!
//! Loads X.509 device certificate, private key, and root CA certificate
//! from PEM files and configures rumqttc's TLS transport.

use std::path::Path;

use rumqttc::Transport;

use crate::config::MqttConfig;
use crate::error::{MqttError, MqttResult};

/// Build a TLS transport from certificate file paths in the config.
///
/// Uses `TlsConfiguration::Simple` which reads PEM-encoded files:
/// - root CA certificate (e.g., AmazonRootCA1.pem)
/// - device certificate (X.509, issued by AWS IoT)
/// - device private key
pub fn load_tls_transport(config: &MqttConfig) -> MqttResult<Transport> {
    let ca = read_pem(&config.ca_path, "CA cert")?;
    let client_cert = read_pem(&config.cert_path, "client cert")?;
    let client_key = read_pem(&config.key_path, "client key")?;

    Ok(Transport::tls_with_config(
        rumqttc::TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth: Some((client_cert, client_key)),
        },
    ))
}

fn read_pem(path: &Path, what: &str) -> MqttResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| MqttError::Tls(format!("failed to read {what} '{}': {e}", path.display())))
}
