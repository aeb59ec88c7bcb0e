//! Event sources for acquiring creation events.
//!
//! Two interchangeable implementations share the [`EventSource`] trait: the
//! block-explorer [`log_scan::LogScanSource`] and the pre-indexed
//! [`graph::GraphIndexerSource`]. A source only describes *what* to call
//! ([`EventSource::plan`]) and *how* to make one call
//! ([`EventSource::execute`]); [`fetch_events`] runs the plan in order through
//! a [`Pacer`] so rate limiting never leaks into source code.

use crate::core::pacer::Pacer;
use crate::types::{EventFilter, EventSignature, RawEvent};
use crate::utils::error::Result;
use alloy_primitives::U256;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

pub mod graph;
pub mod log_scan;

/// One network call a source needs to satisfy a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub filter: EventFilter,
    /// Event signature queried by this call (log-scan only).
    pub signature: Option<EventSignature>,
}

impl SourceRequest {
    /// Label for logging.
    #[must_use]
    pub fn label(&self) -> &str {
        self.signature.as_ref().map_or("query", |s| s.name.as_str())
    }
}

/// Unified interface for event sources.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Splits `filter` into the dependent calls this source must make.
    ///
    /// # Errors
    ///
    /// Returns `FeedIndexerError::ConfigError` synchronously when the source
    /// is missing credentials or an endpoint. Nothing is retried.
    fn plan(&self, filter: &EventFilter) -> Result<Vec<SourceRequest>>;

    /// Performs one call. Must abort promptly when `cancel` fires.
    async fn execute(
        &self,
        request: &SourceRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawEvent>>;

    /// Whether events carry resolved ownership and burn state.
    fn provides_ownership(&self) -> bool;

    /// Get a human-readable name for this source (for logging)
    fn source_name(&self) -> &str;

    /// Orders and de-duplicates the concatenated results of a plan.
    fn normalize(&self, events: Vec<RawEvent>) -> Vec<RawEvent> {
        normalize_events(events)
    }
}

/// Sorts by descending block number and keeps the first (newest)
/// observation of each subject id.
#[must_use]
pub fn normalize_events(mut events: Vec<RawEvent>) -> Vec<RawEvent> {
    events.sort_by(|a, b| b.block_number.cmp(&a.block_number));
    let mut seen: HashSet<U256> = HashSet::with_capacity(events.len());
    events.retain(|event| seen.insert(event.subject_id));
    events
}

/// Executes a prepared plan strictly in order, pacing between calls.
pub async fn run_plan(
    source: &dyn EventSource,
    requests: &[SourceRequest],
    pacer: &mut Pacer,
    cancel: &CancellationToken,
) -> Result<Vec<RawEvent>> {
    let mut all = Vec::new();
    for request in requests {
        pacer.ready(cancel).await?;
        let events = source.execute(request, cancel).await?;
        tracing::debug!(
            source = source.source_name(),
            request = request.label(),
            events = events.len(),
            "source call complete"
        );
        all.extend(events);
    }
    Ok(source.normalize(all))
}

/// Implements the `fetch(filter)` contract: plan, execute in order, normalize.
pub async fn fetch_events(
    source: &dyn EventSource,
    filter: &EventFilter,
    pacer: &mut Pacer,
    cancel: &CancellationToken,
) -> Result<Vec<RawEvent>> {
    let requests = source.plan(filter)?;
    run_plan(source, &requests, pacer, cancel).await
}
