//! Fetch filters and the cache keys derived from them.

use alloy_primitives::Address;
use std::fmt;

/// Parameters of one adapter query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventFilter {
    pub contract: Address,
    /// "Only mine" restriction on the event actor / current owner.
    pub actor: Option<Address>,
    pub from_block: u64,
    /// `None` means the latest block.
    pub to_block: Option<u64>,
}

impl EventFilter {
    /// Filter over the whole history of `contract`.
    #[must_use]
    pub fn new(contract: Address) -> Self {
        Self {
            contract,
            actor: None,
            from_block: 0,
            to_block: None,
        }
    }

    /// Restricts results to `actor`.
    #[must_use]
    pub fn only(mut self, actor: Address) -> Self {
        self.actor = Some(actor);
        self
    }

    #[must_use]
    pub fn blocks(mut self, from_block: u64, to_block: Option<u64>) -> Self {
        self.from_block = from_block;
        self.to_block = to_block;
        self
    }

    /// Cache key identifying this filter.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from(self)
    }
}

/// Key under which adapter results are cached and flights are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&EventFilter> for CacheKey {
    fn from(filter: &EventFilter) -> Self {
        let actor = filter
            .actor
            .map_or_else(|| "*".to_string(), |a| format!("{a:#x}"));
        let to = filter
            .to_block
            .map_or_else(|| "latest".to_string(), |b| b.to_string());
        CacheKey(format!(
            "{:#x}:{actor}:{}:{to}",
            filter.contract, filter.from_block
        ))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
