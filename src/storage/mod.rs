//! Storage module for page-based persistence.
//!
//! This module provides the storage layer for pagegraph, including:
//! - Page-level I/O and the slot-directory layout ([`page`])
//! - Buffer pool management ([`buffer_pool`])

pub mod buffer_pool;
pub mod page;

// Re-export commonly used types
pub use buffer_pool::{BufferPool, BufferPoolStats, LruPolicy, PageHandle, ReplacementPolicy};
pub use page::{DiskManager, Page, PageId, SlottedPage, PAGE_SIZE};
