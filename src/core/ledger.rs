//! Optimistic ledger of locally submitted, not yet confirmed entities.

use crate::types::Entity;
use alloy_primitives::U256;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// Holds optimistic entries until a confirmed entity with the same
/// `subject_id` shows up (or the submission is rolled back).
///
/// Newest additions come first.
#[derive(Debug, Default)]
pub struct OptimisticLedger {
    entries: RwLock<Vec<Entity>>,
}

impl OptimisticLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `entity` unless an entry with its `subject_id` already exists.
    ///
    /// Returns `true` when the entry was inserted.
    pub fn add(&self, mut entity: Entity) -> bool {
        entity.optimistic = true;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|e| e.subject_id == entity.subject_id) {
            return false;
        }
        tracing::debug!(subject_id = %entity.subject_id, "Optimistic entry added");
        entries.insert(0, entity);
        true
    }

    /// Removes every entry whose id appears in `confirmed`. Returns how many
    /// entries were removed.
    pub fn reconcile(&self, confirmed: &HashSet<U256>) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| !confirmed.contains(&e.subject_id));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = entries.len(), "Optimistic entries reconciled");
        }
        removed
    }

    /// Removes the entry for a submission that failed.
    pub fn rollback(&self, subject_id: U256) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| e.subject_id != subject_id);
        before != entries.len()
    }

    /// Snapshot of the current entries, newest first.
    #[must_use]
    pub fn current(&self) -> Vec<Entity> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
