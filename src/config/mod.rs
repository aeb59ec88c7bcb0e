//! Configuration management for `FeedIndexer`.
//!
//! This module provides a builder-based configuration system so hosts can
//! assemble a validated [`FeedIndexerConfig`] with sensible defaults for
//! every tuning knob (cache TTL, pacing, batch width, page size, retries).

use crate::types::EventSignature;
use crate::utils::error::{FeedIndexerError, Result};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Etherscan-compatible multichain log API.
pub const DEFAULT_LOG_API_URL: &str = "https://api.etherscan.io/v2/api";
/// Public IPFS gateway used for content-addressed URIs.
pub const DEFAULT_GATEWAY: &str = "https://ipfs.io/ipfs/";

const DEFAULT_CACHE_TTL_SECS: u64 = 30;
const DEFAULT_PACING_MS: u64 = 250;
const DEFAULT_BATCH_WIDTH: usize = 5;
pub const DEFAULT_PAGE_SIZE: usize = 12;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Retry policy for transient source failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt (0 disables retrying).
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
    /// Apply ±25 % jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 5_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Configuration for the event source.
#[derive(Debug, Clone)]
pub enum SourceConfig {
    /// Block-explorer log API, queried once per event signature.
    LogScan {
        api_url: String,
        api_key: String,
        chain_id: u64,
        signatures: Vec<EventSignature>,
    },
    /// Pre-indexed graph query service.
    GraphIndexer { endpoint: String },
}

impl SourceConfig {
    /// Human-readable source name (for logging).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SourceConfig::LogScan { .. } => "log-scan",
            SourceConfig::GraphIndexer { .. } => "graph-indexer",
        }
    }

    /// Endpoint the source talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            SourceConfig::LogScan { api_url, .. } => api_url,
            SourceConfig::GraphIndexer { endpoint } => endpoint,
        }
    }
}

/// Configuration for a `FeedIndexer` instance.
///
/// Use [`FeedIndexerConfigBuilder`] to construct instances of this struct.
#[derive(Debug, Clone)]
pub struct FeedIndexerConfig {
    /// Contract whose events are ingested.
    pub contract: Address,

    /// Source configuration
    pub source: SourceConfig,

    /// JSON-RPC endpoint for ownership and token URI lookups.
    /// Required by the log-scan source.
    pub rpc_url: Option<String>,

    /// Gateway base for `ipfs://` URIs (default: `https://ipfs.io/ipfs/`).
    pub gateway: String,

    /// Age after which cached source results are treated as a miss (default: 30s).
    pub cache_ttl: Duration,

    /// Minimum spacing between dependent source calls and between serially
    /// enriched items (default: 250ms).
    pub pacing: Duration,

    /// Concurrent enrichment width for the graph indexer source (default: 5).
    pub batch_width: usize,

    /// Number of entities revealed per page (default: 12).
    pub page_size: usize,

    /// Per-request HTTP timeout (default: 15s).
    pub request_timeout: Duration,

    pub retry: RetryConfig,
}

/// Builder for `FeedIndexerConfig`.
///
/// # Example
///
/// ```no_run
/// use feed_indexer::FeedIndexerConfigBuilder;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = FeedIndexerConfigBuilder::new()
///     .with_log_scan("https://api.etherscan.io/v2/api", "API_KEY", 1)
///     .with_rpc("https://eth.llamarpc.com")
///     .contract("0x00000000000000000000000000000000000000aa")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct FeedIndexerConfigBuilder {
    contract: Option<String>,
    source: Option<SourceConfig>,
    signatures: Option<Vec<EventSignature>>,
    rpc_url: Option<String>,
    gateway: Option<String>,
    cache_ttl: Option<Duration>,
    pacing: Option<Duration>,
    batch_width: Option<usize>,
    page_size: Option<usize>,
    request_timeout: Option<Duration>,
    retry: Option<RetryConfig>,
}

impl FeedIndexerConfigBuilder {
    /// Creates a new configuration builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the block-explorer log API as the event source.
    ///
    /// An empty `api_key` is accepted here and reported as a configuration
    /// error on the first fetch.
    #[must_use]
    pub fn with_log_scan(
        mut self,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        chain_id: u64,
    ) -> Self {
        self.source = Some(SourceConfig::LogScan {
            api_url: api_url.into(),
            api_key: api_key.into(),
            chain_id,
            signatures: Vec::new(),
        });
        self
    }

    /// Uses the graph indexer as the event source.
    #[must_use]
    pub fn with_graph_indexer(mut self, endpoint: impl Into<String>) -> Self {
        self.source = Some(SourceConfig::GraphIndexer {
            endpoint: endpoint.into(),
        });
        self
    }

    /// Sets the contract address to index.
    #[must_use]
    pub fn contract(mut self, address: impl Into<String>) -> Self {
        self.contract = Some(address.into());
        self
    }

    /// Overrides the creation events queried by the log-scan source
    /// (default: `Minted` and `PaidMint`).
    #[must_use]
    pub fn with_signatures(mut self, signatures: Vec<EventSignature>) -> Self {
        self.signatures = Some(signatures);
        self
    }

    /// Sets the JSON-RPC endpoint used for chain lookups.
    #[must_use]
    pub fn with_rpc(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = Some(pacing);
        self
    }

    #[must_use]
    pub fn with_batch_width(mut self, width: usize) -> Self {
        self.batch_width = Some(width);
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `FeedIndexerError::ConfigError` if:
    /// - no source or contract was set
    /// - the contract address cannot be parsed
    /// - the log-scan source is selected without an RPC endpoint
    /// - `batch_width` or `page_size` is zero
    pub fn build(self) -> Result<FeedIndexerConfig> {
        let mut source = self.source.ok_or_else(|| {
            FeedIndexerError::ConfigError(
                "Source configuration is required. Use .with_log_scan() or .with_graph_indexer()"
                    .to_string(),
            )
        })?;

        let contract_str = self
            .contract
            .ok_or_else(|| FeedIndexerError::ConfigError("Contract address is required".to_string()))?;
        let contract = Address::from_str(contract_str.trim()).map_err(|e| {
            FeedIndexerError::ConfigError(format!("Invalid contract address '{contract_str}': {e}"))
        })?;

        if let SourceConfig::LogScan { signatures, .. } = &mut source {
            *signatures = self
                .signatures
                .unwrap_or_else(|| vec![EventSignature::minted(), EventSignature::paid_mint()]);
            if signatures.is_empty() {
                return Err(FeedIndexerError::ConfigError(
                    "At least one event signature is required".to_string(),
                ));
            }
            if self.rpc_url.as_deref().is_none_or(str::is_empty) {
                return Err(FeedIndexerError::ConfigError(
                    "The log-scan source needs an RPC endpoint for ownership lookups. Use .with_rpc()"
                        .to_string(),
                ));
            }
        }

        let batch_width = self.batch_width.unwrap_or(DEFAULT_BATCH_WIDTH);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if batch_width == 0 || page_size == 0 {
            return Err(FeedIndexerError::ConfigError(
                "batch_width and page_size must be greater than zero".to_string(),
            ));
        }

        Ok(FeedIndexerConfig {
            contract,
            source,
            rpc_url: self.rpc_url,
            gateway: self.gateway.unwrap_or_else(|| DEFAULT_GATEWAY.to_string()),
            cache_ttl: self
                .cache_ttl
                .unwrap_or(Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
            pacing: self.pacing.unwrap_or(Duration::from_millis(DEFAULT_PACING_MS)),
            batch_width,
            page_size,
            request_timeout: self
                .request_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            retry: self.retry.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "0x00000000000000000000000000000000000000aa";

    #[test]
    fn test_builder_missing_required_fields() {
        let result = FeedIndexerConfigBuilder::new().build();
        assert!(matches!(result, Err(FeedIndexerError::ConfigError(_))));
    }

    #[test]
    fn test_builder_invalid_contract() {
        let result = FeedIndexerConfigBuilder::new()
            .with_graph_indexer("http://127.0.0.1:8000/graphql")
            .contract("not-an-address")
            .build();

        match result {
            Err(FeedIndexerError::ConfigError(msg)) => {
                assert!(msg.contains("Invalid contract address"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_log_scan_requires_rpc() {
        let result = FeedIndexerConfigBuilder::new()
            .with_log_scan(DEFAULT_LOG_API_URL, "key", 1)
            .contract(CONTRACT)
            .build();
        assert!(matches!(result, Err(FeedIndexerError::ConfigError(_))));
    }

    #[test]
    fn test_builder_defaults() -> Result<()> {
        let config = FeedIndexerConfigBuilder::new()
            .with_log_scan(DEFAULT_LOG_API_URL, "key", 8453)
            .with_rpc("http://127.0.0.1:8545")
            .contract(CONTRACT)
            .build()?;

        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.pacing, Duration::from_millis(250));
        assert_eq!(config.batch_width, 5);
        assert_eq!(config.page_size, 12);
        assert_eq!(config.gateway, DEFAULT_GATEWAY);

        match config.source {
            SourceConfig::LogScan {
                chain_id,
                signatures,
                ..
            } => {
                assert_eq!(chain_id, 8453);
                assert_eq!(signatures.len(), 2);
            }
            SourceConfig::GraphIndexer { .. } => panic!("Expected log-scan source"),
        }
        Ok(())
    }

    #[test]
    fn test_builder_graph_indexer_without_rpc() -> Result<()> {
        let config = FeedIndexerConfigBuilder::new()
            .with_graph_indexer("http://127.0.0.1:8000/graphql")
            .contract(CONTRACT)
            .with_page_size(24)
            .build()?;
        assert_eq!(config.source.name(), "graph-indexer");
        assert_eq!(config.page_size, 24);
        assert!(config.rpc_url.is_none());
        Ok(())
    }

    #[test]
    fn test_builder_rejects_zero_width() {
        let result = FeedIndexerConfigBuilder::new()
            .with_graph_indexer("http://127.0.0.1:8000/graphql")
            .contract(CONTRACT)
            .with_batch_width(0)
            .build();
        assert!(result.is_err());
    }
}
