//! Ownership Engine daemon library: configuration, logging and wiring,
//! shared with the operator CLI.

pub mod config;
pub mod engine;
pub mod logging;
mod telemetry;

pub use config::Settings;
pub use engine::{tracing_hooks, Engine};
