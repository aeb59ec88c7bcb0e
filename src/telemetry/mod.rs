//! Tracing subscriber setup for hosts and the demo binary.

/// Telemetry configuration.
#[cfg(feature = "telemetry")]
pub mod config;

/// Global subscriber initialisation.
#[cfg(feature = "telemetry")]
pub mod subscriber;

#[cfg(feature = "telemetry")]
pub use config::TelemetryConfig;

#[cfg(feature = "telemetry")]
pub use subscriber::{TelemetryGuard, init_telemetry, is_initialized};
