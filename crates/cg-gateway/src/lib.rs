//! Library crate for the vehicle telemetry gateway.
//!
//! Re-exports all modules so the binary (`main.rs`) and external crates
//! (e.g. `cg-e2e-tests`) can access `GatewayConfig`, `AppState`,
//! `build_router`, the publish timer and the shutdown coordinator.

pub mod commands;
pub mod config;
pub mod error;
pub mod publisher;
pub mod routes;
pub mod shutdown;
pub mod state;
