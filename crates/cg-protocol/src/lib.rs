pub mod connection;
pub mod telemetry;
pub mod topics;

pub use connection::*;
pub use telemetry::*;
