//! Host-facing query object.
//!
//! A [`Query`] ties the scheduler, the enricher and the optimistic ledger
//! together. Hosts call [`Query::run`] / [`Query::refresh`] when their
//! filter changes, observe results through [`Query::subscribe`], and build the
//! display list with [`Query::view`].

use crate::core::enricher::{EnrichProgress, Enricher, ProgressFn};
use crate::core::ledger::OptimisticLedger;
use crate::core::materializer::{ViewOptions, materialize};
use crate::core::scheduler::{FetchScheduler, Flight};
use crate::types::{CacheKey, Entity, EventFilter};
use crate::utils::error::Result;
use crate::utils::logging::log_fetch;
use alloy_primitives::U256;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;

/// Why the last cycle failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFailure {
    pub message: String,
    /// Configuration failures clear the view; transport failures keep it.
    pub config: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeedStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(FeedFailure),
}

/// State published to subscribers after every change.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    /// Key of the filter the confirmed list belongs to.
    pub key: Option<CacheKey>,
    /// Confirmed entities in source order.
    pub confirmed: Arc<Vec<Entity>>,
    pub status: FeedStatus,
    /// Enrichment progress of the running cycle.
    pub progress: Option<EnrichProgress>,
}

impl FeedSnapshot {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == FeedStatus::Loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&FeedFailure> {
        match &self.status {
            FeedStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

pub struct Query {
    scheduler: Arc<FetchScheduler>,
    enricher: Arc<Enricher>,
    ledger: Arc<OptimisticLedger>,
    state: watch::Sender<FeedSnapshot>,
    current: Mutex<Option<CacheKey>>,
    /// Sequence of the most recent run; only that run publishes.
    latest_run: AtomicU64,
}

impl Query {
    pub fn new(
        scheduler: Arc<FetchScheduler>,
        enricher: Arc<Enricher>,
        ledger: Arc<OptimisticLedger>,
    ) -> Self {
        let (state, _) = watch::channel(FeedSnapshot::default());
        Self {
            scheduler,
            enricher,
            ledger,
            state,
            current: Mutex::new(None),
            latest_run: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<FetchScheduler> {
        &self.scheduler
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<OptimisticLedger> {
        &self.ledger
    }

    /// Fetches and enriches `filter`, serving the cache when it is fresh.
    ///
    /// Returns `Ok(None)` when the run was superseded or cancelled.
    ///
    /// # Errors
    ///
    /// Configuration and transport errors are returned after being
    /// published to subscribers.
    pub async fn run(&self, filter: &EventFilter) -> Result<Option<Arc<Vec<Entity>>>> {
        self.execute(filter, false).await
    }

    /// Like [`Query::run`] but always bypasses the cache.
    pub async fn refresh(&self, filter: &EventFilter) -> Result<Option<Arc<Vec<Entity>>>> {
        self.execute(filter, true).await
    }

    /// Cancels the flight of the current filter, if any.
    pub fn cancel(&self) -> bool {
        let key = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        key.is_some_and(|key| self.scheduler.cancel(&key))
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.borrow().clone()
    }

    /// Materialized view of the confirmed list plus pending optimistic entries.
    #[must_use]
    pub fn view(&self, options: &ViewOptions) -> Vec<Entity> {
        let confirmed = Arc::clone(&self.state.borrow().confirmed);
        materialize(&confirmed, &self.ledger.current(), options)
    }

    /// Records a just-submitted entity so it shows up before confirmation.
    pub fn submit_optimistic(&self, entity: Entity) -> bool {
        let added = self.ledger.add(entity);
        if added {
            self.state.send_modify(|_| {});
        }
        added
    }

    /// Withdraws the optimistic entry of a failed submission.
    pub fn rollback_optimistic(&self, subject_id: U256) -> bool {
        let removed = self.ledger.rollback(subject_id);
        if removed {
            self.state.send_modify(|_| {});
        }
        removed
    }

    /// Cancels everything and drops cached results, optimistic entries and
    /// the published state.
    pub fn reset(&self) {
        self.latest_run.fetch_add(1, Ordering::SeqCst);
        self.scheduler.cancel_all();
        self.scheduler.cache().clear();
        self.ledger.clear();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.state.send_replace(FeedSnapshot::default());
    }

    /// Stops all current and future flights.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    fn is_latest(&self, run: u64) -> bool {
        self.latest_run.load(Ordering::SeqCst) == run
    }

    async fn execute(&self, filter: &EventFilter, force: bool) -> Result<Option<Arc<Vec<Entity>>>> {
        let key = filter.cache_key();
        let run = self.latest_run.fetch_add(1, Ordering::SeqCst) + 1;
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(key.clone());

        let flight = self.scheduler.begin(&key);
        let started = Instant::now();
        self.state.send_modify(|s| {
            s.status = FeedStatus::Loading;
            s.progress = None;
        });

        let outcome = self.cycle(&flight, filter, force, run).await;
        if !self.is_latest(run) {
            tracing::debug!(key = %key, "Run superseded; result not published");
            return Ok(None);
        }

        match outcome {
            Ok((event_count, entities)) => {
                let confirmed: HashSet<U256> = entities.iter().map(|e| e.subject_id).collect();
                self.ledger.reconcile(&confirmed);
                let entities = Arc::new(entities);
                self.state.send_modify(|s| {
                    s.key = Some(key.clone());
                    s.confirmed = Arc::clone(&entities);
                    s.status = FeedStatus::Ready;
                    s.progress = None;
                });
                log_fetch(
                    key.as_str(),
                    event_count,
                    entities.len(),
                    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                );
                Ok(Some(entities))
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!(key = %key, "Run cancelled");
                self.state.send_modify(|s| {
                    s.status = if s.key.is_some() {
                        FeedStatus::Ready
                    } else {
                        FeedStatus::Idle
                    };
                    s.progress = None;
                });
                Ok(None)
            }
            Err(e) => {
                let config = e.is_config();
                tracing::warn!(key = %key, error = %e, config, "Fetch cycle failed");
                self.state.send_modify(|s| {
                    if config {
                        s.key = None;
                        s.confirmed = Arc::new(Vec::new());
                    }
                    s.status = FeedStatus::Failed(FeedFailure {
                        message: e.to_string(),
                        config,
                    });
                    s.progress = None;
                });
                Err(e)
            }
        }
    }

    async fn cycle(
        &self,
        flight: &Flight,
        filter: &EventFilter,
        force: bool,
        run: u64,
    ) -> Result<(usize, Vec<Entity>)> {
        let events = self.scheduler.fetch(flight, filter, force).await?;
        let on_progress: &ProgressFn<'_> = &|progress| {
            if self.is_latest(run) {
                self.state.send_modify(|s| s.progress = Some(progress));
            }
        };
        let entities = self
            .enricher
            .enrich(&events, flight.token(), Some(on_progress))
            .await?;
        Ok((events.len(), entities))
    }
}
