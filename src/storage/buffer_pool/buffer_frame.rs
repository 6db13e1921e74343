//! Buffer frame for holding a single cached page.

use crate::storage::page::{Page, PageId, PAGE_SIZE};

/// A frame in the buffer pool that holds a single page.
///
/// Each frame tracks:
/// - The page currently loaded (if any)
/// - How many handles are currently using the page (pin count)
#[derive(Debug)]
pub struct BufferFrame {
    /// The page currently loaded in this frame, if any.
    pub page_id: Option<PageId>,
    /// Raw page data.
    pub page_data: [u8; PAGE_SIZE],
    /// Number of live handles to this page.
    pub pin_count: u32,
}

impl BufferFrame {
    /// Creates a new empty buffer frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            page_id: None,
            page_data: [0u8; PAGE_SIZE],
            pin_count: 0,
        }
    }

    /// Loads `page` into this frame.
    pub fn load(&mut self, page: &Page) {
        self.page_id = Some(page.id);
        self.page_data = page.data;
        self.pin_count = 0;
    }

    /// Copies the frame contents out as a page, if one is loaded.
    #[must_use]
    pub fn to_page(&self) -> Option<Page> {
        self.page_id
            .map(|page_id| Page::from_data(page_id, self.page_data))
    }

    /// Increments the pin count.
    pub fn pin(&mut self) {
        self.pin_count = self.pin_count.saturating_add(1);
    }

    /// Decrements the pin count.
    pub fn unpin(&mut self) {
        self.pin_count = self.pin_count.saturating_sub(1);
    }

    /// Returns whether this frame can be evicted.
    ///
    /// A frame can be evicted if it has a page loaded and no live handles.
    #[must_use]
    pub fn is_evictable(&self) -> bool {
        self.page_id.is_some() && self.pin_count == 0
    }

    /// Returns whether this frame is empty (no page loaded).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.page_id.is_none()
    }

    /// Resets the frame to empty state.
    pub fn reset(&mut self) {
        self.page_id = None;
        self.page_data = [0u8; PAGE_SIZE];
        self.pin_count = 0;
    }
}

impl Default for BufferFrame {
    fn default() -> Self {
        Self::new()
    }
}
