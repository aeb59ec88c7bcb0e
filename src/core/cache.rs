//! TTL response cache keyed by filter.
//!
//! Entries are never mutated: a refresh replaces the whole entry. Expired
//! entries are treated as misses and overwritten by the next `put`.

use crate::types::{CacheKey, RawEvent};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A cached adapter result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub events: Arc<Vec<RawEvent>>,
    pub fetched_at: Instant,
}

impl CacheEntry {
    #[must_use]
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Adapter results cached per [`CacheKey`] for a fixed TTL.
///
/// Shard locks are only held inside each method, never across an await.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: DashMap<CacheKey, CacheEntry>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry for `key` if it is younger than the TTL.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| entry.age() < self.ttl)
            .map(|entry| entry.value().clone())
    }

    /// Stores `events` under `key`, replacing any previous entry.
    pub fn put(&self, key: CacheKey, events: Arc<Vec<RawEvent>>) -> CacheEntry {
        let entry = CacheEntry {
            events,
            fetched_at: Instant::now(),
        };
        self.entries.insert(key, entry.clone());
        entry
    }

    /// Drops the entry for `key`. Returns `true` if one existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
