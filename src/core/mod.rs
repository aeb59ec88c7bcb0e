pub mod cache;
pub mod chain;
pub mod content;
pub mod enricher;
pub mod indexer;
pub mod ledger;
pub mod materializer;
pub mod pacer;
pub mod query;
pub mod scheduler;

pub use cache::{CacheEntry, ResponseCache};
pub use chain::{ChainReader, RpcChainReader};
pub use content::{HttpMetadataFetcher, MetadataFetcher};
pub use enricher::{EnrichMode, EnrichProgress, Enricher};
pub use indexer::FeedIndexer;
pub use ledger::OptimisticLedger;
pub use materializer::{Pager, SortOrder, ViewOptions, materialize};
pub use pacer::Pacer;
pub use query::{FeedFailure, FeedSnapshot, FeedStatus, Query};
pub use scheduler::{FetchScheduler, Flight};
