//! Control surface route definitions and router builder.

pub mod config;
pub mod health;
pub mod publish;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/publish", post(publish::publish))
        .route("/config", get(config::get_config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
