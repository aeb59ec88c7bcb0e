//! Turns raw events into enriched entities.
//!
//! For each event the enricher re-derives current ownership (dropping
//! subjects that no longer resolve), resolves the content URI when the event
//! did not carry one, and fetches the metadata document. Output order always
//! equals input order.

use crate::core::chain::ChainReader;
use crate::core::content::MetadataFetcher;
use crate::core::pacer::Pacer;
use crate::types::{Entity, RawEvent};
use crate::utils::error::{FeedIndexerError, Result};
use alloy_primitives::Address;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default number of items enriched concurrently in batched mode.
pub const DEFAULT_BATCH_WIDTH: usize = 5;

/// How items are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichMode {
    /// One item at a time with `item_delay` between items. Used with sources
    /// whose chain calls share a tight request budget.
    Serial { item_delay: Duration },
    /// Fixed-size concurrent batches.
    Batched { width: usize },
}

impl Default for EnrichMode {
    fn default() -> Self {
        EnrichMode::Batched {
            width: DEFAULT_BATCH_WIDTH,
        }
    }
}

/// Progress reported after each enriched item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichProgress {
    pub completed: usize,
    pub total: usize,
}

/// Progress callback. It may borrow from the caller for `'a`.
pub type ProgressFn<'a> = dyn Fn(EnrichProgress) + Send + Sync + 'a;

pub struct Enricher {
    contract: Address,
    chain: Option<Arc<dyn ChainReader>>,
    metadata: Arc<dyn MetadataFetcher>,
    mode: EnrichMode,
}

impl Enricher {
    /// `chain` may be `None` only for sources that provide ownership. Events
    /// that carry no ownership are dropped when there is nothing to check.
    pub fn new(
        contract: Address,
        chain: Option<Arc<dyn ChainReader>>,
        metadata: Arc<dyn MetadataFetcher>,
        mode: EnrichMode,
    ) -> Self {
        Self {
            contract,
            chain,
            metadata,
            mode,
        }
    }

    #[must_use]
    pub fn mode(&self) -> EnrichMode {
        self.mode
    }

    /// Enriches `events` in order.
    ///
    /// Subjects whose existence check fails are left out of the result.
    ///
    /// # Errors
    ///
    /// Only [`FeedIndexerError::Cancelled`]: per-item failures degrade the
    /// item instead of failing the batch.
    pub async fn enrich(
        &self,
        events: &[RawEvent],
        cancel: &CancellationToken,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<Vec<Entity>> {
        let total = events.len();
        let mut entities = Vec::with_capacity(total);
        let mut completed = 0usize;
        let report = |completed: usize| {
            if let Some(callback) = on_progress {
                callback(EnrichProgress { completed, total });
            }
        };

        match self.mode {
            EnrichMode::Serial { item_delay } => {
                let mut pacer = Pacer::new(item_delay);
                for event in events {
                    if cancel.is_cancelled() {
                        return Err(FeedIndexerError::Cancelled);
                    }
                    pacer.ready(cancel).await?;
                    if let Some(entity) = self.enrich_one(event, cancel).await? {
                        entities.push(entity);
                    }
                    completed += 1;
                    report(completed);
                }
            }
            EnrichMode::Batched { width } => {
                for chunk in events.chunks(width.max(1)) {
                    if cancel.is_cancelled() {
                        return Err(FeedIndexerError::Cancelled);
                    }
                    let results = join_all(chunk.iter().map(|event| self.enrich_one(event, cancel))).await;
                    for result in results {
                        if let Some(entity) = result? {
                            entities.push(entity);
                        }
                        completed += 1;
                        report(completed);
                    }
                }
            }
        }

        tracing::debug!(total, kept = entities.len(), "Enrichment complete");
        Ok(entities)
    }

    /// Resolves the current owner. `Ok(None)` drops the item.
    async fn resolve_owner(
        &self,
        event: &RawEvent,
        cancel: &CancellationToken,
    ) -> Result<Option<Address>> {
        if event.has_provided_ownership() {
            if event.burned == Some(true) {
                tracing::debug!(subject_id = %event.subject_id, "Dropping burned subject");
                return Ok(None);
            }
            return Ok(Some(event.provided_owner.unwrap_or(event.actor)));
        }

        let Some(chain) = &self.chain else {
            tracing::debug!(subject_id = %event.subject_id, "No ownership source; dropping subject");
            return Ok(None);
        };
        match chain.owner_of(self.contract, event.subject_id, cancel).await {
            Ok(owner) => Ok(Some(owner)),
            Err(FeedIndexerError::Cancelled) => Err(FeedIndexerError::Cancelled),
            Err(e) => {
                tracing::debug!(subject_id = %event.subject_id, error = %e, "Existence check failed; dropping subject");
                Ok(None)
            }
        }
    }

    async fn resolve_uri(&self, event: &RawEvent, cancel: &CancellationToken) -> Result<String> {
        if let Some(uri) = &event.content_uri {
            return Ok(uri.clone());
        }
        let Some(chain) = &self.chain else {
            return Ok(String::new());
        };
        match chain.token_uri(self.contract, event.subject_id, cancel).await {
            Ok(uri) => Ok(uri),
            Err(FeedIndexerError::Cancelled) => Err(FeedIndexerError::Cancelled),
            Err(e) => {
                tracing::warn!(subject_id = %event.subject_id, error = %e, "Could not resolve content uri");
                Ok(String::new())
            }
        }
    }

    async fn enrich_one(&self, event: &RawEvent, cancel: &CancellationToken) -> Result<Option<Entity>> {
        let Some(owner) = self.resolve_owner(event, cancel).await? else {
            return Ok(None);
        };
        let content_uri = self.resolve_uri(event, cancel).await?;

        let metadata = if content_uri.trim().is_empty() {
            None
        } else {
            match self.metadata.fetch(&content_uri, cancel).await {
                Ok(metadata) => Some(metadata),
                Err(FeedIndexerError::Cancelled) => return Err(FeedIndexerError::Cancelled),
                Err(e) => {
                    tracing::warn!(subject_id = %event.subject_id, uri = %content_uri, error = %e, "Metadata fetch failed");
                    None
                }
            }
        };

        Ok(Some(Entity {
            subject_id: event.subject_id,
            owner,
            content_uri,
            metadata,
            kind: event.kind.clone(),
            block_number: event.block_number,
            timestamp: event.timestamp,
            tx_hash: Some(event.tx_hash),
            optimistic: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;
    use alloy_primitives::{B256, U256, address};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OWNER: Address = address!("00000000000000000000000000000000000000cc");

    struct StubChain;

    #[async_trait]
    impl ChainReader for StubChain {
        async fn owner_of(&self, _: Address, id: U256, _: &CancellationToken) -> Result<Address> {
            if id == U256::from(2u64) {
                Err(FeedIndexerError::ChainCallError("execution reverted".into()))
            } else {
                Ok(OWNER)
            }
        }

        async fn token_uri(&self, _: Address, id: U256, _: &CancellationToken) -> Result<String> {
            Ok(format!("https://meta.example/{id}.json"))
        }
    }

    /// Cancels `token` from inside the `cancel_at`-th ownership check.
    struct CancellingChain {
        calls: AtomicUsize,
        cancel_at: usize,
        token: CancellationToken,
    }

    #[async_trait]
    impl ChainReader for CancellingChain {
        async fn owner_of(&self, _: Address, _: U256, _: &CancellationToken) -> Result<Address> {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_at {
                self.token.cancel();
            }
            Ok(OWNER)
        }

        async fn token_uri(&self, _: Address, _: U256, _: &CancellationToken) -> Result<String> {
            Ok(String::new())
        }
    }

    struct StubMetadata {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MetadataFetcher for StubMetadata {
        async fn fetch(&self, uri: &str, _: &CancellationToken) -> Result<Metadata> {
            self.seen.lock().unwrap().push(uri.to_string());
            Ok(Metadata {
                name: uri.to_string(),
                ..Metadata::default()
            })
        }
    }

    fn event(id: u64, uri: Option<&str>) -> RawEvent {
        RawEvent {
            actor: Address::repeat_byte(0xbb),
            subject_id: U256::from(id),
            block_number: 100 - id,
            tx_hash: B256::ZERO,
            timestamp: 0,
            content_uri: uri.map(str::to_string),
            kind: "Minted".into(),
            provided_owner: None,
            burned: None,
        }
    }

    fn enricher(chain: Option<Arc<dyn ChainReader>>, mode: EnrichMode) -> Enricher {
        Enricher::new(
            Address::ZERO,
            chain,
            Arc::new(StubMetadata {
                seen: Mutex::new(Vec::new()),
            }),
            mode,
        )
    }

    #[tokio::test]
    async fn test_owner_lookup_failure_drops_item() {
        let enricher = enricher(Some(Arc::new(StubChain)), EnrichMode::default());
        let events = vec![event(1, Some("u1")), event(2, Some("u2")), event(3, Some("u3"))];
        let entities = enricher
            .enrich(&events, &CancellationToken::new(), None)
            .await
            .unwrap();
        let ids: Vec<U256> = entities.iter().map(|e| e.subject_id).collect();
        assert_eq!(ids, vec![U256::from(1u64), U256::from(3u64)]);
        assert!(entities.iter().all(|e| e.owner == OWNER));
    }

    #[tokio::test]
    async fn test_missing_uri_resolved_through_chain() {
        let enricher = enricher(Some(Arc::new(StubChain)), EnrichMode::default());
        let entities = enricher
            .enrich(&[event(5, None)], &CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(entities[0].content_uri, "https://meta.example/5.json");
        assert_eq!(
            entities[0].metadata.as_ref().unwrap().name,
            "https://meta.example/5.json"
        );
    }

    #[tokio::test]
    async fn test_provided_ownership_skips_chain() {
        let enricher = enricher(Some(Arc::new(StubChain)), EnrichMode::default());
        let mut owned = event(2, Some("u2"));
        owned.provided_owner = Some(Address::repeat_byte(0xdd));
        owned.burned = Some(false);
        let mut burned = event(4, Some("u4"));
        burned.provided_owner = Some(Address::repeat_byte(0xdd));
        burned.burned = Some(true);

        let entities = enricher
            .enrich(&[owned, burned], &CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].subject_id, U256::from(2u64));
        assert_eq!(entities[0].owner, Address::repeat_byte(0xdd));
    }

    #[tokio::test]
    async fn test_without_chain_unverified_subject_is_dropped() {
        let enricher = enricher(None, EnrichMode::default());
        let mut verified = event(2, None);
        verified.provided_owner = Some(OWNER);
        verified.burned = Some(false);

        let entities = enricher
            .enrich(&[event(1, Some("u1")), verified], &CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].subject_id, U256::from(2u64));
        assert_eq!(entities[0].owner, OWNER);
        assert!(entities[0].metadata.is_none());
    }

    #[tokio::test]
    async fn test_progress_reported_per_item() {
        let enricher = enricher(Some(Arc::new(StubChain)), EnrichMode::Batched { width: 2 });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: &ProgressFn<'_> = &move |p: EnrichProgress| sink.lock().unwrap().push(p.completed);
        let events: Vec<RawEvent> = (1..=5).map(|i| event(i, Some("u"))).collect();
        enricher
            .enrich(&events, &CancellationToken::new(), Some(callback))
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let enricher = enricher(
            Some(Arc::new(StubChain)),
            EnrichMode::Serial {
                item_delay: Duration::from_millis(250),
            },
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = enricher
            .enrich(&[event(1, None)], &cancel, None)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    async fn cancel_midway(mode: EnrichMode) -> (Result<Vec<Entity>>, usize, usize) {
        let token = CancellationToken::new();
        let chain = Arc::new(CancellingChain {
            calls: AtomicUsize::new(0),
            cancel_at: 2,
            token: token.clone(),
        });
        let metadata = Arc::new(StubMetadata {
            seen: Mutex::new(Vec::new()),
        });
        let enricher = Enricher::new(Address::ZERO, Some(chain.clone()), metadata.clone(), mode);
        let events: Vec<RawEvent> = (1..=6).map(|i| event(i, Some("u"))).collect();

        let result = enricher.enrich(&events, &token, None).await;
        let owner_calls = chain.calls.load(Ordering::SeqCst);
        let fetches = metadata.seen.lock().unwrap().len();
        (result, owner_calls, fetches)
    }

    #[tokio::test(start_paused = true)]
    async fn test_serial_cancel_stops_remaining_items() {
        let (result, owner_calls, fetches) = cancel_midway(EnrichMode::Serial {
            item_delay: Duration::from_millis(10),
        })
        .await;
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(owner_calls, 2);
        assert_eq!(fetches, 2);
    }

    #[tokio::test]
    async fn test_batched_cancel_stops_remaining_batches() {
        let (result, owner_calls, fetches) = cancel_midway(EnrichMode::Batched { width: 2 }).await;
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(owner_calls, 2, "only the first batch was checked");
        assert_eq!(fetches, 2);
    }
}
