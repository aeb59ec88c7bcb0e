/// Configuration for the telemetry subsystem.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Minimum log level filter (e.g. "info", "feed_indexer=debug,warn").
    /// `RUST_LOG` takes precedence when set.
    pub log_filter: String,
    /// Whether to enable ANSI-colored console output.
    pub enable_console_colors: bool,
    /// Whether to include target module in output.
    pub show_target: bool,
    /// Whether to include thread IDs.
    pub show_thread_ids: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "feed_indexer=info,warn".into(),
            enable_console_colors: true,
            show_target: true,
            show_thread_ids: false,
        }
    }
}

impl TelemetryConfig {
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Plain output for logs captured to files or CI.
    #[must_use]
    pub fn without_colors(mut self) -> Self {
        self.enable_console_colors = false;
        self
    }
}
