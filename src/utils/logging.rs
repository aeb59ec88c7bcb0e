//! Logging utilities (thin wrappers over `tracing`).

fn silenced() -> bool {
    std::env::var("FEED_INDEXER_SILENT").is_ok()
}

/// Replaces the value of any `apikey=` / `api-key=` query parameter.
#[must_use]
pub fn redact_url(url: &str) -> String {
    let mut out = url.to_string();
    for marker in ["apikey=", "api-key=", "api_key="] {
        if let Some(pos) = out.find(marker) {
            let start = pos + marker.len();
            let end = out[start..].find('&').map_or(out.len(), |i| start + i);
            out.replace_range(start..end, "[REDACTED]");
        }
    }
    out
}

/// Logs engine startup information
pub fn log_startup(source: &str, endpoint: &str, contract: &str) {
    if silenced() {
        return;
    }

    tracing::info!(
        source = source,
        endpoint = redact_url(endpoint),
        contract = contract,
        "Feed Indexer Startup"
    );
}

/// Logs a completed fetch cycle
pub fn log_fetch(key: &str, events: usize, entities: usize, duration_ms: u64) {
    if silenced() {
        return;
    }
    tracing::info!(
        key = key,
        events = events,
        entities = entities,
        duration_ms = duration_ms,
        "Fetch cycle complete"
    );
}

/// Logs an error with context
pub fn log_error(context: &str, error: &str) {
    tracing::error!(context = context, error = error, "Feed Indexer Error");
}
