//! Page-level storage primitives.
//!
//! This module defines the core page abstractions:
//! - `PageId`: Unique identifier for a page
//! - `Page`: Fixed-size data block (4KB)
//! - `SlottedPage`: Slot-directory view over a page buffer
//! - `DiskManager`: File I/O abstraction

mod disk_manager;
mod page_id;
mod slotted;

pub use disk_manager::DiskManager;
pub use page_id::PageId;
pub use slotted::{Slot, SlottedPage, INVALID_SLOT_VALUE, MAX_SLOTS, SLOT_DIRECTORY_SIZE, SLOT_SIZE};

/// Page size in bytes (4KB).
pub const PAGE_SIZE: usize = 4096;

/// A fixed-size page of data.
#[derive(Clone)]
pub struct Page {
    /// Unique identifier for this page.
    pub id: PageId,
    /// Raw page data.
    pub data: [u8; PAGE_SIZE],
}

impl Page {
    /// Creates a new zeroed page with the given ID.
    #[must_use]
    pub fn new(id: PageId) -> Self {
        Self {
            id,
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Creates a page from existing data.
    #[must_use]
    pub fn from_data(id: PageId, data: [u8; PAGE_SIZE]) -> Self {
        Self { id, data }
    }

    /// Returns a read-only view of the page data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns a mutable view of the page data.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl AsRef<[u8]> for Page {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl AsMut<[u8]> for Page {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("data_len", &self.data.len())
            .finish()
    }
}
