use super::config::TelemetryConfig;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Returned by [`init_telemetry`]; keep it alive for the life of the process.
pub struct TelemetryGuard {
    _private: (),
}

static TELEMETRY_INIT: OnceLock<()> = OnceLock::new();

/// Initialize the global tracing subscriber (singleton, called once).
///
/// Uses `RUST_LOG` if set, otherwise falls back to `config.log_filter`.
/// Later calls are no-ops, and a subscriber installed by someone else is
/// left in place.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    TELEMETRY_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

        let fmt_layer = fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_ansi(config.enable_console_colors);

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init();
    });

    TelemetryGuard { _private: () }
}

/// Returns `true` once [`init_telemetry`] has run.
#[must_use]
pub fn is_initialized() -> bool {
    TELEMETRY_INIT.get().is_some()
}
