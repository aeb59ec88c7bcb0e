//! Single-flight, latest-wins fetch scheduling.
//!
//! Every fetch runs inside a [`Flight`] registered under its [`CacheKey`].
//! Beginning a new flight for a key cancels the previous one, and only the
//! flight that is still current when its result arrives may write the cache.

use crate::core::cache::ResponseCache;
use crate::core::pacer::Pacer;
use crate::sources::{EventSource, run_plan};
use crate::types::{CacheKey, EventFilter, RawEvent};
use crate::utils::error::{FeedIndexerError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct FlightSlot {
    generation: u64,
    token: CancellationToken,
}

type FlightRegistry = Arc<DashMap<CacheKey, FlightSlot>>;

/// Handle of one in-flight fetch.
///
/// Dropping the handle unregisters it if it is still the current flight for
/// its key.
#[derive(Debug)]
pub struct Flight {
    key: CacheKey,
    generation: u64,
    token: CancellationToken,
    registry: FlightRegistry,
}

impl Flight {
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Token cancelled when this flight is superseded or cancelled.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns `true` while no newer flight has started for the same key.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.registry
            .get(&self.key)
            .is_some_and(|slot| slot.generation == self.generation)
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        self.registry
            .remove_if(&self.key, |_, slot| slot.generation == self.generation);
    }
}

/// Runs adapter fetches with single-flight semantics, pacing and caching.
pub struct FetchScheduler {
    source: Arc<dyn EventSource>,
    cache: Arc<ResponseCache>,
    pacing: Duration,
    flights: FlightRegistry,
    next_generation: AtomicU64,
    root: CancellationToken,
}

impl FetchScheduler {
    pub fn new(source: Arc<dyn EventSource>, cache: Arc<ResponseCache>, pacing: Duration) -> Self {
        Self {
            source,
            cache,
            pacing,
            flights: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(1),
            root: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn source(&self) -> &Arc<dyn EventSource> {
        &self.source
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Starts a flight for `key`, cancelling any flight already running for it.
    pub fn begin(&self, key: &CacheKey) -> Flight {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.root.child_token();
        let previous = self.flights.insert(
            key.clone(),
            FlightSlot {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(key = %key, superseded = previous.generation, "Cancelling superseded flight");
            previous.token.cancel();
        }
        Flight {
            key: key.clone(),
            generation,
            token,
            registry: Arc::clone(&self.flights),
        }
    }

    /// Fetches the events for `filter` within `flight`.
    ///
    /// Serves from the cache unless `force` is set or the entry expired.
    /// Configuration errors surface before the cache is consulted.
    ///
    /// # Errors
    ///
    /// [`FeedIndexerError::Cancelled`] when the flight was superseded or
    /// cancelled; source errors otherwise. Neither case touches the cache.
    pub async fn fetch(
        &self,
        flight: &Flight,
        filter: &EventFilter,
        force: bool,
    ) -> Result<Arc<Vec<RawEvent>>> {
        let requests = self.source.plan(filter)?;

        if !force {
            if let Some(entry) = self.cache.get(flight.key()) {
                tracing::debug!(key = %flight.key(), age_ms = entry.age().as_millis(), "Cache hit");
                return Ok(entry.events);
            }
        }

        let mut pacer = Pacer::new(self.pacing);
        let events = run_plan(self.source.as_ref(), &requests, &mut pacer, flight.token()).await?;
        self.commit(flight, Arc::new(events))
    }

    /// Writes `events` to the cache if `flight` is still current.
    fn commit(&self, flight: &Flight, events: Arc<Vec<RawEvent>>) -> Result<Arc<Vec<RawEvent>>> {
        // The shard read guard is held through the put so `begin` cannot
        // supersede this flight in between.
        let slot = self.flights.get(flight.key());
        let current = slot
            .as_ref()
            .is_some_and(|slot| slot.generation == flight.generation);
        if !current || flight.is_cancelled() {
            tracing::debug!(key = %flight.key(), "Discarding result of superseded flight");
            return Err(FeedIndexerError::Cancelled);
        }
        self.cache.put(flight.key().clone(), Arc::clone(&events));
        Ok(events)
    }

    /// Cancels the current flight for `key`. Returns `true` if one was running.
    pub fn cancel(&self, key: &CacheKey) -> bool {
        match self.flights.remove(key) {
            Some((_, slot)) => {
                slot.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every running flight.
    pub fn cancel_all(&self) {
        self.flights.retain(|_, slot| {
            slot.token.cancel();
            false
        });
    }

    #[must_use]
    pub fn in_flight(&self, key: &CacheKey) -> bool {
        self.flights.contains_key(key)
    }

    /// Cancels all flights for good; later flights start already cancelled.
    pub fn shutdown(&self) {
        self.root.cancel();
        self.cancel_all();
    }
}
