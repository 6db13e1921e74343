//! Page replacement policies for the buffer pool.
//!
//! A policy tracks resident page IDs in some order and picks the victim
//! when the pool needs a free frame.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::storage::page::PageId;

/// Cache replacement strategy over page identifiers.
pub trait ReplacementPolicy: Send {
    /// Records an access to `page_id`.
    ///
    /// Returns true if the page was already tracked.
    fn touch(&mut self, page_id: PageId) -> bool;

    /// Removes and returns the next victim, or `None` if nothing is tracked.
    fn evict(&mut self) -> Option<PageId> {
        self.evict_where(&|_| true)
    }

    /// Removes and returns the next victim among pages accepted by
    /// `evictable`, or `None` if no tracked page qualifies.
    fn evict_where(&mut self, evictable: &dyn Fn(PageId) -> bool) -> Option<PageId>;

    /// Returns the number of tracked pages.
    fn len(&self) -> usize;

    /// Returns whether no pages are tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of tracked pages.
    fn capacity(&self) -> usize;
}

/// Least-recently-used replacement policy.
///
/// Keeps a recency list (most recent first) indexed by page ID, so touch
/// and evict are O(1). Touching an untracked page while at capacity drops
/// the least recent page first.
#[derive(Debug)]
pub struct LruPolicy {
    list: LruCache<PageId, ()>,
}

impl LruPolicy {
    /// Creates a policy tracking at most `capacity` pages.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            list: LruCache::new(capacity),
        }
    }

    /// Returns tracked pages from least to most recently used.
    pub fn iter_lru(&self) -> impl Iterator<Item = PageId> + '_ {
        self.list.iter().rev().map(|(page_id, _)| *page_id)
    }
}

impl ReplacementPolicy for LruPolicy {
    fn touch(&mut self, page_id: PageId) -> bool {
        if self.list.get(&page_id).is_some() {
            return true;
        }
        if self.list.len() == self.list.cap().get() {
            self.list.pop_lru();
        }
        self.list.put(page_id, ());
        false
    }

    fn evict_where(&mut self, evictable: &dyn Fn(PageId) -> bool) -> Option<PageId> {
        let victim = self.iter_lru().find(|&page_id| evictable(page_id))?;
        self.list.pop(&victim);
        Some(victim)
    }

    fn len(&self) -> usize {
        self.list.len()
    }

    fn capacity(&self) -> usize {
        self.list.cap().get()
    }
}
