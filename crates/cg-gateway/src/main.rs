//! CAN gateway: keeps an MQTT session to AWS IoT Core, publishes telemetry
//! on a timer, and serves a small HTTP control surface.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cg_gateway::config::GatewayConfig;
use cg_gateway::routes::build_router;
use cg_gateway::shutdown::ShutdownCoordinator;
use cg_gateway::state::AppState;
use cg_gateway::{commands, publisher};
use cg_mqtt_channel::{MqttChannel, SessionManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cg-gateway starting");

    // ── Load config ─────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Arc::new(GatewayConfig::from_file(&config_path)?);
    tracing::info!(
        thing_name = %config.thing_name,
        endpoint = %config.mqtt.endpoint,
        publish_interval_secs = config.publish_interval_seconds,
        "config loaded"
    );

    // ── MQTT session ────────────────────────────────────────────
    let channel = Arc::new(MqttChannel::new(&config.mqtt)?);
    let session = Arc::new(SessionManager::new(channel, &config.mqtt));

    if !session.connect().await {
        anyhow::bail!("failed to connect to MQTT broker at {}", config.mqtt.endpoint);
    }

    let command_task =
        commands::subscribe(&session, &config.thing_name, commands::DEFAULT_QUEUE_DEPTH).await;

    // ── Background publisher ────────────────────────────────────
    let coordinator = Arc::new(ShutdownCoordinator::new(
        session.clone(),
        CancellationToken::new(),
    ));
    coordinator.track_publisher(publisher::spawn(
        session.clone(),
        config.thing_name.clone(),
        config.publish_interval(),
        coordinator.token(),
    ));

    // ── Control surface ─────────────────────────────────────────
    let addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "control surface listening");

    let app = build_router(AppState::new(session.clone(), config.clone()));
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    coordinator.shutdown().await;
    if let Some(task) = command_task {
        task.abort();
    }

    served.context("control surface failed")?;
    tracing::info!("cg-gateway stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
