//! Buffer pool management for page caching.
//!
//! This module implements a buffer pool that keeps a bounded number of pages
//! in memory on top of a [`DiskManager`]. It provides:
//! - Page fixing with pin counts
//! - A pluggable replacement policy ([`LruPolicy`] by default)
//! - RAII guards (`PageHandle`) for safe page access
//!
//! # Example
//!
//! ```ignore
//! let pool = BufferPool::new(capacity, disk_manager)?;
//! let mut handle = pool.fix(page_id)?;
//! handle.data_mut()[0] = 1;
//! drop(handle);
//! pool.flush(page_id)?;
//! ```
//!
//! A page with a live handle is never chosen for eviction, so a handle's
//! view of the page stays valid for as long as the handle exists.

mod buffer_frame;
mod eviction;

pub use buffer_frame::BufferFrame;
pub use eviction::{LruPolicy, ReplacementPolicy};

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, Mutex, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};
use tracing::{debug, error};

use crate::error::{PageGraphError, Result};
use crate::storage::page::{DiskManager, PageId};

/// Buffer pool for managing in-memory page cache.
pub struct BufferPool {
    /// Buffer frames holding cached pages.
    frames: Vec<RwLock<BufferFrame>>,
    /// Maps page IDs to frame indices.
    page_table: RwLock<HashMap<PageId, usize>>,
    /// Replacement policy choosing eviction victims.
    policy: Mutex<Box<dyn ReplacementPolicy>>,
    /// Maximum number of pages in the pool.
    capacity: usize,
    /// Disk manager for page I/O.
    disk_manager: Mutex<DiskManager>,
    /// Counter for cache hits (page found in buffer pool).
    cache_hits: AtomicU64,
    /// Counter for cache misses (page had to be loaded from disk).
    cache_misses: AtomicU64,
    /// Counter for number of pages evicted.
    evictions: AtomicU64,
    /// Counter for page writes to disk.
    flushes: AtomicU64,
}

impl BufferPool {
    /// Creates a new buffer pool with an LRU policy.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of pages to cache in memory
    /// * `disk_manager` - Disk manager for reading/writing pages
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is zero.
    pub fn new(capacity: usize, disk_manager: DiskManager) -> Result<Self> {
        let nonzero = NonZeroUsize::new(capacity).ok_or_else(|| {
            PageGraphError::BufferPoolError("Buffer pool capacity must be greater than 0".into())
        })?;
        Self::with_policy(capacity, disk_manager, Box::new(LruPolicy::new(nonzero)))
    }

    /// Creates a new buffer pool with a custom replacement policy.
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is zero or the policy cannot track
    /// `capacity` pages.
    pub fn with_policy(
        capacity: usize,
        disk_manager: DiskManager,
        policy: Box<dyn ReplacementPolicy>,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(PageGraphError::BufferPoolError(
                "Buffer pool capacity must be greater than 0".into(),
            ));
        }
        if policy.capacity() < capacity {
            return Err(PageGraphError::BufferPoolError(format!(
                "Replacement policy tracks {} pages, pool needs {capacity}",
                policy.capacity()
            )));
        }

        let frames = (0..capacity)
            .map(|_| RwLock::new(BufferFrame::new()))
            .collect();

        Ok(Self {
            frames,
            page_table: RwLock::new(HashMap::with_capacity(capacity)),
            policy: Mutex::new(policy),
            capacity,
            disk_manager: Mutex::new(disk_manager),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        })
    }

    /// Returns the capacity of the buffer pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of pages currently in the buffer pool.
    #[must_use]
    pub fn size(&self) -> usize {
        self.page_table.read().len()
    }

    /// Returns whether `page_id` is currently cached.
    #[must_use]
    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.page_table.read().contains_key(&page_id)
    }

    /// Returns the cached page IDs in ascending order.
    #[must_use]
    pub fn resident_pages(&self) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self.page_table.read().keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    /// Returns the total number of pages in the database file.
    #[must_use]
    pub fn file_page_count(&self) -> u32 {
        self.disk_manager.lock().num_pages()
    }

    /// Grows the database file so that `target` is a valid page.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be extended.
    pub fn extend_to(&self, target: PageId) -> Result<()> {
        self.disk_manager.lock().extend_to(target)
    }

    /// Fixes a page in the buffer pool, loading it from disk if necessary.
    ///
    /// Returns a `PageHandle` that pins the page until it is dropped. On a
    /// miss with a full pool, the least recently used unpinned page is
    /// written back and evicted first.
    ///
    /// # Errors
    ///
    /// Returns an error if every cached page is pinned or the page cannot be
    /// read or the victim cannot be written.
    pub fn fix(&self, page_id: PageId) -> Result<PageHandle<'_>> {
        let cached = {
            let page_table = self.page_table.read();
            let frame_idx = page_table.get(&page_id).copied();
            if let Some(idx) = frame_idx {
                self.frames[idx].write().pin();
            }
            frame_idx
        };
        if let Some(frame_idx) = cached {
            self.policy.lock().touch(page_id);
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(PageHandle {
                pool: self,
                frame_idx,
                page_id,
            });
        }

        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        let frame_idx = self.find_or_evict_frame()?;

        let page = self.disk_manager.lock().read_page(page_id)?;
        {
            let mut frame = self.frames[frame_idx].write();
            frame.load(&page);
            frame.pin();
        }
        self.page_table.write().insert(page_id, frame_idx);
        self.policy.lock().touch(page_id);

        Ok(PageHandle {
            pool: self,
            frame_idx,
            page_id,
        })
    }

    /// Writes a cached page to disk.
    ///
    /// Does nothing if the page is not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be written to disk.
    pub fn flush(&self, page_id: PageId) -> Result<()> {
        let Some(frame_idx) = self.page_table.read().get(&page_id).copied() else {
            return Ok(());
        };

        let Some(page) = self.frames[frame_idx].read().to_page() else {
            return Ok(());
        };
        self.disk_manager.lock().write_page(&page)?;
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes every cached page to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be written to disk.
    pub fn flush_all(&self) -> Result<()> {
        for page_id in self.resident_pages() {
            self.flush(page_id)?;
        }
        Ok(())
    }

    /// Internal: Unpins a page (called when `PageHandle` is dropped).
    fn unpin(&self, frame_idx: usize) {
        self.frames[frame_idx].write().unpin();
    }

    /// Internal: Finds an empty frame or evicts one.
    fn find_or_evict_frame(&self) -> Result<usize> {
        let empty = self
            .frames
            .iter()
            .position(|frame_lock| frame_lock.read().is_empty());
        match empty {
            Some(idx) => Ok(idx),
            None => self.evict_frame(),
        }
    }

    /// Internal: Evicts the policy's victim among unpinned pages.
    fn evict_frame(&self) -> Result<usize> {
        let victim = {
            let page_table = self.page_table.read();
            let evictable = |page_id: PageId| {
                page_table
                    .get(&page_id)
                    .is_some_and(|&idx| self.frames[idx].read().is_evictable())
            };
            self.policy.lock().evict_where(&evictable)
        };

        let Some(victim) = victim else {
            return Err(PageGraphError::BufferPoolExhausted {
                capacity: self.capacity,
            });
        };

        let frame_idx = self.page_table.write().remove(&victim).ok_or_else(|| {
            PageGraphError::BufferPoolError(format!("Evicted {victim} has no frame"))
        })?;

        let mut frame = self.frames[frame_idx].write();
        if let Some(page) = frame.to_page() {
            if let Err(e) = self.disk_manager.lock().write_page(&page) {
                // Keep the page cached so its contents are not lost.
                drop(frame);
                self.page_table.write().insert(victim, frame_idx);
                self.policy.lock().touch(victim);
                return Err(e);
            }
            self.flushes.fetch_add(1, Ordering::Relaxed);
        }
        frame.reset();
        self.evictions.fetch_add(1, Ordering::Relaxed);
        debug!(%victim, frame_idx, "buffer_pool.evict");

        Ok(frame_idx)
    }

    /// Returns buffer pool statistics.
    #[must_use]
    pub fn stats(&self) -> BufferPoolStats {
        let pages_used = self.page_table.read().len();
        let pinned_pages = self
            .frames
            .iter()
            .filter(|frame_lock| {
                let frame = frame_lock.read();
                frame.page_id.is_some() && frame.pin_count > 0
            })
            .count();

        BufferPoolStats {
            capacity: self.capacity,
            pages_used,
            pinned_pages,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }

    /// Resets the cache statistics counters.
    pub fn reset_stats(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.flushes.store(0, Ordering::Relaxed);
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        for page_id in self.resident_pages() {
            if let Err(e) = self.flush(page_id) {
                error!(%page_id, error = %e, "buffer_pool.drop.flush_failed");
            }
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

/// RAII guard for a fixed page.
///
/// Automatically unpins the page when dropped. Views returned by
/// [`data`](Self::data) and [`data_mut`](Self::data_mut) hold the frame
/// lock; drop a view before taking another one from the same handle.
pub struct PageHandle<'a> {
    pool: &'a BufferPool,
    frame_idx: usize,
    page_id: PageId,
}

impl PageHandle<'_> {
    /// Returns the page ID.
    #[must_use]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns a read-only view of the page data.
    #[must_use]
    pub fn data(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.pool.frames[self.frame_idx].read(), |frame| {
            &frame.page_data[..]
        })
    }

    /// Returns a mutable view of the page data.
    pub fn data_mut(&mut self) -> MappedRwLockWriteGuard<'_, [u8]> {
        RwLockWriteGuard::map(self.pool.frames[self.frame_idx].write(), |frame| {
            &mut frame.page_data[..]
        })
    }
}

impl Drop for PageHandle<'_> {
    fn drop(&mut self) {
        self.pool.unpin(self.frame_idx);
    }
}

/// Statistics about the buffer pool state.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Maximum number of pages the pool can hold.
    pub capacity: usize,
    /// Current number of pages in the pool.
    pub pages_used: usize,
    /// Number of pinned pages.
    pub pinned_pages: usize,
    /// Number of cache hits (page found in buffer pool).
    pub cache_hits: u64,
    /// Number of cache misses (page had to be loaded from disk).
    pub cache_misses: u64,
    /// Number of pages evicted.
    pub evictions: u64,
    /// Number of page writes to disk.
    pub flushes: u64,
}

impl BufferPoolStats {
    /// Calculates the cache hit rate as a fraction (0.0 to 1.0).
    ///
    /// Returns `None` if there have been no cache accesses.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            None
        } else {
            Some(self.cache_hits as f64 / total as f64)
        }
    }

    /// Returns the total number of cache accesses (hits + misses).
    #[must_use]
    pub fn total_accesses(&self) -> u64 {
        self.cache_hits + self.cache_misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PAGE_SIZE;
    use tempfile::TempDir;

    fn create_test_pool(capacity: usize, pages: u32) -> (BufferPool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let dm = DiskManager::new(&db_path).unwrap();
        dm.extend_to(PageId::new(pages)).unwrap();
        let pool = BufferPool::new(capacity, dm).unwrap();
        (pool, temp_dir)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dm = DiskManager::new(&temp_dir.path().join("test.db")).unwrap();
        assert!(BufferPool::new(0, dm).is_err());
    }

    #[test]
    fn test_policy_smaller_than_pool_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dm = DiskManager::new(&temp_dir.path().join("test.db")).unwrap();
        let policy = LruPolicy::new(NonZeroUsize::new(2).unwrap());
        assert!(BufferPool::with_policy(4, dm, Box::new(policy)).is_err());
    }

    #[test]
    fn test_fix_and_modify() {
        let (pool, _temp) = create_test_pool(4, 8);

        {
            let mut handle = pool.fix(PageId::new(3)).unwrap();
            handle.data_mut()[0] = 42;
        }

        let handle = pool.fix(PageId::new(3)).unwrap();
        assert_eq!(handle.data()[0], 42);
        assert_eq!(handle.data().len(), PAGE_SIZE);
    }

    #[test]
    fn test_repeated_reads_are_identical() {
        let (pool, _temp) = create_test_pool(4, 8);
        {
            let mut handle = pool.fix(PageId::new(2)).unwrap();
            handle.data_mut()[..5].copy_from_slice(b"hello");
        }

        let first = pool.fix(PageId::new(2)).unwrap().data().to_vec();
        let second = pool.fix(PageId::new(2)).unwrap().data().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_hit_miss_tracking() {
        let (pool, _temp) = create_test_pool(4, 8);

        let stats = pool.stats();
        assert_eq!(stats.total_accesses(), 0);
        assert!(stats.hit_rate().is_none());

        drop(pool.fix(PageId::new(1)).unwrap());
        drop(pool.fix(PageId::new(1)).unwrap());

        let stats = pool.stats();
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.hit_rate(), Some(0.5));

        pool.reset_stats();
        assert_eq!(pool.stats().total_accesses(), 0);
    }

    #[test]
    fn test_lru_eviction_order() {
        let (pool, _temp) = create_test_pool(3, 10);

        for i in 1..=3 {
            drop(pool.fix(PageId::new(i)).unwrap());
        }
        // Page 1 becomes most recent; page 2 is now least recent.
        drop(pool.fix(PageId::new(1)).unwrap());
        assert_eq!(pool.stats().evictions, 0);

        drop(pool.fix(PageId::new(4)).unwrap());

        assert_eq!(pool.stats().evictions, 1);
        assert!(!pool.is_resident(PageId::new(2)));
        assert_eq!(
            pool.resident_pages(),
            vec![PageId::new(1), PageId::new(3), PageId::new(4)]
        );
    }

    #[test]
    fn test_evicted_page_is_written_back() {
        let (pool, temp) = create_test_pool(2, 10);

        {
            let mut handle = pool.fix(PageId::new(5)).unwrap();
            handle.data_mut()[7] = 99;
        }
        drop(pool.fix(PageId::new(6)).unwrap());
        drop(pool.fix(PageId::new(7)).unwrap());
        assert!(!pool.is_resident(PageId::new(5)));

        let mut dm = DiskManager::new(&temp.path().join("test.db")).unwrap();
        assert_eq!(dm.read_page(PageId::new(5)).unwrap().data[7], 99);

        // Reloading returns the written-back contents.
        assert_eq!(pool.fix(PageId::new(5)).unwrap().data()[7], 99);
    }

    #[test]
    fn test_pinned_page_is_not_evicted() {
        let (pool, _temp) = create_test_pool(2, 10);

        let pinned = pool.fix(PageId::new(1)).unwrap();
        drop(pool.fix(PageId::new(2)).unwrap());
        drop(pool.fix(PageId::new(3)).unwrap());

        // Page 1 was least recent but pinned, so page 2 went instead.
        assert!(pool.is_resident(PageId::new(1)));
        assert!(!pool.is_resident(PageId::new(2)));
        assert_eq!(pinned.page_id(), PageId::new(1));
        assert_eq!(pool.stats().pinned_pages, 1);
    }

    #[test]
    fn test_all_pinned_exhausts_pool() {
        let (pool, _temp) = create_test_pool(2, 10);

        let _a = pool.fix(PageId::new(1)).unwrap();
        let _b = pool.fix(PageId::new(2)).unwrap();

        assert!(matches!(
            pool.fix(PageId::new(3)),
            Err(PageGraphError::BufferPoolExhausted { capacity: 2 })
        ));
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn test_flush_writes_resident_page() {
        let (pool, temp) = create_test_pool(4, 4);

        {
            let mut handle = pool.fix(PageId::new(2)).unwrap();
            handle.data_mut()[0..4].copy_from_slice(&[1, 2, 3, 4]);
        }
        pool.flush(PageId::new(2)).unwrap();
        // Not cached: nothing to do.
        pool.flush(PageId::new(3)).unwrap();
        assert_eq!(pool.stats().flushes, 1);

        let mut dm = DiskManager::new(&temp.path().join("test.db")).unwrap();
        assert_eq!(&dm.read_page(PageId::new(2)).unwrap().data[0..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_drop_flushes_resident_pages() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let dm = DiskManager::new(&db_path).unwrap();
            dm.extend_to(PageId::new(3)).unwrap();
            let pool = BufferPool::new(4, dm).unwrap();
            let mut handle = pool.fix(PageId::new(3)).unwrap();
            handle.data_mut()[100] = 0xAB;
        }

        let mut dm = DiskManager::new(&db_path).unwrap();
        assert_eq!(dm.read_page(PageId::new(3)).unwrap().data[100], 0xAB);
    }

    #[test]
    fn test_hit_rate_calculation() {
        let stats = BufferPoolStats {
            capacity: 10,
            pages_used: 5,
            pinned_pages: 2,
            cache_hits: 80,
            cache_misses: 20,
            evictions: 5,
            flushes: 7,
        };

        assert_eq!(stats.hit_rate(), Some(0.8));
        assert_eq!(stats.total_accesses(), 100);
    }
}
