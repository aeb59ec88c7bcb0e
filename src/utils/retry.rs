//! Configurable retry logic for transient source failures.
//!
//! This module provides:
//! - [`compute_backoff`]: exponential-backoff delay calculator with optional jitter.
//! - [`is_transient`]: classifies a [`FeedIndexerError`] as retryable or not.
//! - [`RetryingEventSource`]: decorator that wraps any [`EventSource`] with configurable retries.

use crate::config::RetryConfig;
use crate::sources::{EventSource, SourceRequest};
use crate::types::{EventFilter, RawEvent};
use crate::utils::error::{FeedIndexerError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Computes the delay before the next retry.
///
/// `attempt` is 1-indexed: `attempt = 1` is the delay before the first retry.
///
/// Formula: `delay = initial_backoff_ms * backoff_multiplier^(attempt - 1)`,
/// capped at `max_backoff_ms`, then ±25 % jitter if enabled.
#[must_use]
pub fn compute_backoff(cfg: &RetryConfig, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let base = cfg.initial_backoff_ms as f64 * cfg.backoff_multiplier.powi(exponent);
    let capped = base.min(cfg.max_backoff_ms as f64);

    let ms = if cfg.jitter {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        // factor in [0.75, 1.25]
        let factor = 0.75 + f64::from(nanos % 1_000_000) / 1_000_000.0 * 0.5;
        capped * factor
    } else {
        capped
    };

    Duration::from_millis(ms as u64)
}

// ─────────────────────────────────────────────────────────────────────────────
// Error classification
// ─────────────────────────────────────────────────────────────────────────────

/// Returns `true` if `err` represents a transient failure that is safe to retry.
///
/// | Error variant      | Retried | Reason                                  |
/// |--------------------|---------|-----------------------------------------|
/// | `TransportError`   | ✅      | Connect failure, timeout, reset         |
/// | `HttpStatus` 5xx   | ✅      | Upstream overload                       |
/// | `HttpStatus` 429   | ✅      | Rate limited                            |
/// | `ApiError` (rate)  | ✅      | Explorer "Max rate limit reached"       |
/// | `ConfigError`      | ❌      | Programmer error                        |
/// | `DecodingError`    | ❌      | Bad data will not self-heal             |
/// | `GraphQlError`     | ❌      | Query rejected by the indexer           |
/// | `Cancelled`        | ❌      | Superseded on purpose                   |
#[must_use]
pub fn is_transient(err: &FeedIndexerError) -> bool {
    match err {
        FeedIndexerError::TransportError(_) => true,
        FeedIndexerError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
        FeedIndexerError::ApiError(message) => message.to_ascii_lowercase().contains("rate limit"),
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RetryingEventSource
// ─────────────────────────────────────────────────────────────────────────────

/// A decorator that wraps any [`EventSource`] with configurable retry logic.
///
/// Only [`EventSource::execute`] is retried; planning errors are
/// configuration errors and are returned untouched. Backoff sleeps are
/// abandoned as soon as the flight's token fires.
///
/// # Example
///
/// ```no_run
/// use feed_indexer::RetryConfig;
/// use feed_indexer::sources::graph::GraphIndexerSource;
/// use feed_indexer::utils::retry::RetryingEventSource;
/// use std::sync::Arc;
///
/// let client = reqwest::Client::new();
/// let raw = GraphIndexerSource::new(client, "https://indexer.example/graphql");
/// let retrying = RetryingEventSource::new(raw, RetryConfig::default());
/// let source: Arc<dyn feed_indexer::EventSource> = Arc::new(retrying);
/// ```
pub struct RetryingEventSource<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: EventSource> RetryingEventSource<S> {
    /// Wraps `inner` with the given retry `config`.
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Returns the wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn with_retry<F, Fut, T>(&self, cancel: &CancellationToken, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;

        loop {
            let err = match op().await {
                Ok(val) => return Ok(val),
                Err(err) if !is_transient(&err) => return Err(err),
                Err(err) => err,
            };

            attempt += 1;
            if attempt > self.config.max_retries {
                return Err(FeedIndexerError::RetryExhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            let delay = compute_backoff(&self.config, attempt);
            tracing::warn!(
                source = self.inner.source_name(),
                attempt,
                max = self.config.max_retries,
                delay_ms = delay.as_millis(),
                error = %err,
                "Transient source error, retrying"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(FeedIndexerError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[async_trait]
impl<S: EventSource> EventSource for RetryingEventSource<S> {
    fn plan(&self, filter: &EventFilter) -> Result<Vec<SourceRequest>> {
        self.inner.plan(filter)
    }

    async fn execute(
        &self,
        request: &SourceRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawEvent>> {
        self.with_retry(cancel, || self.inner.execute(request, cancel))
            .await
    }

    fn provides_ownership(&self) -> bool {
        self.inner.provides_ownership()
    }

    fn source_name(&self) -> &str {
        self.inner.source_name()
    }

    fn normalize(&self, events: Vec<RawEvent>) -> Vec<RawEvent> {
        self.inner.normalize(events)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
