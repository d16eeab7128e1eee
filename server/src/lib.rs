//! # Herald Server
//!
//! Process wiring for herald: configuration, the HTTP surface, and the
//! background tasks (job worker and liveness poller) that the binary runs.

/// Environment-driven configuration
pub mod config;

/// HTTP routes and handlers
pub mod http;

pub use config::{Config, ConfigError};
pub use http::{router, AppError, AppState, Probe, Service};
