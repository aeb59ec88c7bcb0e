//! Main feed indexer orchestrator.
//!
//! This module wires the configured source, cache, scheduler, chain reader,
//! metadata fetcher, enricher and optimistic ledger into a single [`Query`].

use crate::config::{FeedIndexerConfig, SourceConfig};
use crate::core::cache::ResponseCache;
use crate::core::chain::{ChainReader, RpcChainReader};
use crate::core::content::{HttpMetadataFetcher, MetadataFetcher};
use crate::core::enricher::{EnrichMode, Enricher};
use crate::core::ledger::OptimisticLedger;
use crate::core::materializer::Pager;
use crate::core::query::Query;
use crate::core::scheduler::FetchScheduler;
use crate::sources::EventSource;
use crate::sources::graph::GraphIndexerSource;
use crate::sources::log_scan::LogScanSource;
use crate::types::EventFilter;
use crate::utils::error::Result;
use crate::utils::http::build_client;
use crate::utils::logging;
use crate::utils::retry::RetryingEventSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Feed indexer for one contract.
///
/// # Example
///
/// ```no_run
/// # use feed_indexer::{FeedIndexer, FeedIndexerConfigBuilder, ViewOptions};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = FeedIndexerConfigBuilder::new()
///     .with_graph_indexer("https://indexer.example/graphql")
///     .contract("0x00000000000000000000000000000000000000aa")
///     .build()?;
///
/// let indexer = FeedIndexer::new(config)?;
/// indexer.query().run(&indexer.filter()).await?;
/// let page = indexer.pager().slice(&indexer.query().view(&ViewOptions::default())).to_vec();
/// # Ok(())
/// # }
/// ```
pub struct FeedIndexer {
    config: FeedIndexerConfig,
    query: Arc<Query>,
    cancellation_token: CancellationToken,
}

impl FeedIndexer {
    /// Creates an indexer talking to the endpoints in `config`.
    ///
    /// # Errors
    ///
    /// Returns `FeedIndexerError::ConfigError` if the HTTP client cannot be
    /// built.
    pub fn new(config: FeedIndexerConfig) -> Result<Self> {
        let client = build_client(config.request_timeout)?;

        let source: Arc<dyn EventSource> = match &config.source {
            SourceConfig::LogScan {
                api_url,
                api_key,
                chain_id,
                signatures,
            } => Arc::new(RetryingEventSource::new(
                LogScanSource::new(
                    client.clone(),
                    api_url.clone(),
                    api_key.clone(),
                    *chain_id,
                    signatures.clone(),
                ),
                config.retry.clone(),
            )),
            SourceConfig::GraphIndexer { endpoint } => Arc::new(RetryingEventSource::new(
                GraphIndexerSource::new(client.clone(), endpoint.clone()),
                config.retry.clone(),
            )),
        };

        let chain: Option<Arc<dyn ChainReader>> = config
            .rpc_url
            .as_ref()
            .map(|url| Arc::new(RpcChainReader::new(client.clone(), url.clone())) as Arc<dyn ChainReader>);
        let metadata: Arc<dyn MetadataFetcher> =
            Arc::new(HttpMetadataFetcher::new(client, config.gateway.clone()));

        logging::log_startup(
            config.source.name(),
            config.source.endpoint(),
            &format!("{:#x}", config.contract),
        );

        Ok(Self::with_components(config, source, chain, metadata))
    }

    /// Creates an indexer from explicit components.
    ///
    /// Sources that provide ownership are enriched in concurrent batches;
    /// the others are enriched one item at a time, paced like source calls.
    pub fn with_components(
        config: FeedIndexerConfig,
        source: Arc<dyn EventSource>,
        chain: Option<Arc<dyn ChainReader>>,
        metadata: Arc<dyn MetadataFetcher>,
    ) -> Self {
        let mode = if source.provides_ownership() {
            EnrichMode::Batched {
                width: config.batch_width,
            }
        } else {
            EnrichMode::Serial {
                item_delay: config.pacing,
            }
        };

        let cache = Arc::new(ResponseCache::new(config.cache_ttl));
        let scheduler = Arc::new(FetchScheduler::new(source, cache, config.pacing));
        let enricher = Arc::new(Enricher::new(config.contract, chain, metadata, mode));
        let ledger = Arc::new(OptimisticLedger::new());
        let query = Arc::new(Query::new(scheduler, enricher, ledger));

        Self {
            config,
            query,
            cancellation_token: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &FeedIndexerConfig {
        &self.config
    }

    #[must_use]
    pub fn query(&self) -> &Arc<Query> {
        &self.query
    }

    /// Filter over the whole history of the configured contract.
    #[must_use]
    pub fn filter(&self) -> EventFilter {
        EventFilter::new(self.config.contract)
    }

    /// A fresh pager using the configured page size.
    #[must_use]
    pub fn pager(&self) -> Pager {
        Pager::new(self.config.page_size)
    }

    /// Spawns a loop that runs `filter` now and refreshes it every `every`
    /// until [`FeedIndexer::shutdown`] is called.
    ///
    /// A configuration error ends the loop.
    pub fn spawn_refresh(&self, filter: EventFilter, every: Duration) -> JoinHandle<()> {
        let query = Arc::clone(&self.query);
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut first = true;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let result = if first {
                    query.run(&filter).await
                } else {
                    query.refresh(&filter).await
                };
                first = false;
                if let Err(e) = result {
                    logging::log_error("Refresh error", &e.to_string());
                    if e.is_config() {
                        break;
                    }
                }
            }
        })
    }

    /// Triggers a graceful shutdown: stops refresh loops and cancels flights.
    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
        self.query.shutdown();
    }

    /// Returns a clone of the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
