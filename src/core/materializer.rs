//! Builds the display list from confirmed and optimistic entities, and pages
//! through it.

use crate::types::Entity;
use alloy_primitives::{Address, U256};
use std::collections::HashSet;

/// Ordering of the materialized view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Source order (newest block first).
    #[default]
    Newest,
    /// Reverse of source order.
    Oldest,
    /// Ascending numeric subject id.
    ById,
}

/// Host-supplied view parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub search: String,
    pub sort: SortOrder,
    /// "Only mine": hides optimistic entries owned by someone else.
    pub owner_filter: Option<Address>,
}

impl ViewOptions {
    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = term.into();
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn owned_by(mut self, owner: Address) -> Self {
        self.owner_filter = Some(owner);
        self
    }
}

/// Case-insensitive match against the display name, the decimal id and `#id`.
fn matches_search(entity: &Entity, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let id = entity.subject_id.to_string();
    if id.contains(needle) || format!("#{id}").contains(needle) {
        return true;
    }
    entity
        .metadata
        .as_ref()
        .is_some_and(|m| m.name.to_lowercase().contains(needle))
}

/// Merges `optimistic` entries in front of `confirmed` and applies `options`.
///
/// Each `subject_id` appears at most once; a confirmed entity always wins
/// over an optimistic one with the same id.
#[must_use]
pub fn materialize(confirmed: &[Entity], optimistic: &[Entity], options: &ViewOptions) -> Vec<Entity> {
    let confirmed_ids: HashSet<U256> = confirmed.iter().map(|e| e.subject_id).collect();

    let pending = optimistic.iter().filter(|e| {
        !confirmed_ids.contains(&e.subject_id)
            && options.owner_filter.is_none_or(|owner| e.owner == owner)
    });

    let needle = options.search.trim().to_lowercase();
    let mut seen: HashSet<U256> = HashSet::with_capacity(confirmed.len() + optimistic.len());
    let mut view: Vec<Entity> = pending
        .chain(confirmed.iter())
        .filter(|e| seen.insert(e.subject_id))
        .filter(|e| matches_search(e, &needle))
        .cloned()
        .collect();

    match options.sort {
        SortOrder::Newest => {}
        SortOrder::Oldest => view.reverse(),
        SortOrder::ById => view.sort_by(|a, b| a.subject_id.cmp(&b.subject_id)),
    }
    view
}

/// Incremental pagination over a materialized list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    page_size: usize,
    visible: usize,
}

impl Pager {
    /// Starts with one page visible. A zero page size is treated as one.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            page_size,
            visible: page_size,
        }
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of visible items for a list of `total` items.
    #[must_use]
    pub fn visible(&self, total: usize) -> usize {
        self.visible.min(total)
    }

    #[must_use]
    pub fn has_more(&self, total: usize) -> bool {
        self.visible < total
    }

    /// Reveals one more page. Returns `true` if anything new became visible.
    pub fn load_more(&mut self, total: usize) -> bool {
        if !self.has_more(total) {
            return false;
        }
        self.visible = (self.visible + self.page_size).min(total);
        true
    }

    /// Sentinel-intersection trigger; same as [`Pager::load_more`].
    pub fn on_intersect(&mut self, total: usize) -> bool {
        self.load_more(total)
    }

    /// Back to the first page (after a filter or sort change).
    pub fn reset(&mut self) {
        self.visible = self.page_size;
    }

    /// The visible prefix of `list`.
    #[must_use]
    pub fn slice<'a, T>(&self, list: &'a [T]) -> &'a [T] {
        &list[..self.visible(list.len())]
    }
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_PAGE_SIZE)
    }
}
