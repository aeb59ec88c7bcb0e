//! Error types for `FeedIndexer` operations.
//!
//! This module defines a single error enumeration using `thiserror` so every
//! stage of the pipeline (sources, scheduler, enricher, query) reports failures
//! the same way and callers can classify them without string matching.

use thiserror::Error;

/// Custom error type for `FeedIndexer` operations.
///
/// The variants follow the ingestion taxonomy: configuration problems fail
/// fast, transport problems are recoverable, and cancellation is reported as
/// its own variant so hosts can swallow it instead of surfacing it.
#[derive(Debug, Error)]
pub enum FeedIndexerError {
    /// Errors related to configuration.
    ///
    /// Missing API keys, endpoints or chain ids, and malformed addresses.
    /// These are returned synchronously and never retried.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Network-level failures talking to a source, gateway or RPC node.
    ///
    /// Automatically wraps `reqwest::Error` (connect failures, timeouts,
    /// body read errors).
    #[error("Transport error: {0}")]
    TransportError(#[from] reqwest::Error),

    /// A remote endpoint answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Status code returned by the server.
        status: u16,
        /// Request URL with credentials stripped.
        url: String,
    },

    /// The log-scan API reported a genuine fault (`status = "0"` with an
    /// error message such as an invalid key or a rate limit).
    #[error("Log API error: {0}")]
    ApiError(String),

    /// The graph indexer returned a non-empty `errors` array.
    #[error("Indexer query error: {0}")]
    GraphQlError(String),

    /// Errors while decoding a log entry, a JSON body or an ABI word.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// An `eth_call` (ownership or token URI) did not resolve.
    #[error("Chain call failed: {0}")]
    ChainCallError(String),

    /// The operation was superseded or cancelled by the host.
    ///
    /// This is not a failure: hosts should treat it as "nothing to report".
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic errors for operations that don't fit other categories.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// All retry attempts were exhausted on a transient error.
    #[error("Retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Total number of attempts (initial call + retries).
        attempts: u32,
        /// String representation of the last error.
        last_error: String,
    },
}

impl FeedIndexerError {
    /// Returns `true` when the error only signals cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FeedIndexerError::Cancelled)
    }

    /// Returns `true` for configuration errors, which invalidate any
    /// previously materialized state.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, FeedIndexerError::ConfigError(_))
    }
}

impl From<serde_json::Error> for FeedIndexerError {
    fn from(err: serde_json::Error) -> Self {
        FeedIndexerError::DecodingError(err.to_string())
    }
}

/// Type alias for Results using `FeedIndexerError`.
pub type Result<T> = std::result::Result<T, FeedIndexerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_helpers() {
        assert!(FeedIndexerError::Cancelled.is_cancelled());
        assert!(!FeedIndexerError::Cancelled.is_config());
        assert!(FeedIndexerError::ConfigError("missing key".into()).is_config());
        assert!(!FeedIndexerError::ApiError("NOTOK".into()).is_cancelled());
    }

    #[test]
    fn test_json_error_maps_to_decoding() {
        let err = serde_json::from_str::<u64>("not-json").unwrap_err();
        let mapped: FeedIndexerError = err.into();
        assert!(matches!(mapped, FeedIndexerError::DecodingError(_)));
    }

    #[test]
    fn test_http_status_display() {
        let err = FeedIndexerError::HttpStatus {
            status: 503,
            url: "https://api.example.org/api".into(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from https://api.example.org/api");
    }
}
