//! `FeedIndexer` - an event-feed indexer for on-chain creation events.
//!
//! `FeedIndexer` ingests append-only mint events from a contract and turns
//! them into a de-duplicated, paginated list of entities enriched with their
//! off-chain metadata. It works against either of two interchangeable
//! sources (a block-explorer log API or a pre-indexed graph service) and
//! merges in optimistic entries for actions the user just submitted.
//!
//! # Pipeline
//!
//! 1. An [`EventSource`] fetches raw events for an [`EventFilter`].
//! 2. The [`FetchScheduler`] keeps one flight per filter, paces dependent
//!    calls and caches results in a [`ResponseCache`].
//! 3. The [`Enricher`] re-derives ownership, drops destroyed subjects and
//!    fetches metadata.
//! 4. The [`Query`] publishes the confirmed list and reconciles the
//!    [`OptimisticLedger`]; [`materialize`] and [`Pager`] build what is shown.
//!
//! # Quick Start
//!
//! ```no_run
//! use feed_indexer::{FeedIndexer, FeedIndexerConfigBuilder, SortOrder, ViewOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     dotenvy::dotenv().ok();
//!
//!     let config = FeedIndexerConfigBuilder::new()
//!         .with_log_scan(
//!             "https://api.etherscan.io/v2/api",
//!             std::env::var("LOG_API_KEY")?,
//!             8453,
//!         )
//!         .with_rpc(std::env::var("RPC_URL")?)
//!         .contract("0x00000000000000000000000000000000000000aa")
//!         .build()?;
//!
//!     let indexer = FeedIndexer::new(config)?;
//!     indexer.query().run(&indexer.filter()).await?;
//!
//!     let view = indexer
//!         .query()
//!         .view(&ViewOptions::default().sort(SortOrder::ById));
//!     for entity in indexer.pager().slice(&view) {
//!         println!("{} owned by {:#x}", entity.display_name(), entity.owner);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Public API exports
pub use config::{FeedIndexerConfig, FeedIndexerConfigBuilder, RetryConfig, SourceConfig};
pub use core::cache::{CacheEntry, ResponseCache};
pub use core::chain::{ChainReader, RpcChainReader};
pub use core::content::{HttpMetadataFetcher, MetadataFetcher};
pub use core::enricher::{EnrichMode, EnrichProgress, Enricher};
pub use core::indexer::FeedIndexer;
pub use core::ledger::OptimisticLedger;
pub use core::materializer::{Pager, SortOrder, ViewOptions, materialize};
pub use core::pacer::Pacer;
pub use core::query::{FeedFailure, FeedSnapshot, FeedStatus, Query};
pub use core::scheduler::{FetchScheduler, Flight};
pub use sources::graph::GraphIndexerSource;
pub use sources::log_scan::LogScanSource;
pub use sources::{EventSource, SourceRequest, fetch_events};
pub use types::{
    ArgLocation, Attribute, CacheKey, Entity, EventFilter, EventSignature, Metadata, RawEvent,
};
pub use utils::error::{FeedIndexerError, Result};
pub use utils::retry::RetryingEventSource;

#[cfg(feature = "telemetry")]
pub use telemetry::{TelemetryConfig, init_telemetry};

// Module declarations
pub mod config;
pub mod core;
pub mod sources;
pub mod telemetry;
pub mod types;
pub mod utils;
