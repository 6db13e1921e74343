//! Page identifier type.

use serde::{Deserialize, Serialize};

/// Unique identifier for a page in the database file.
///
/// Page `n` occupies bytes `[n * PAGE_SIZE, (n + 1) * PAGE_SIZE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub u32);

impl PageId {
    /// Creates a new page ID.
    #[must_use]
    pub const fn new(page_idx: u32) -> Self {
        Self(page_idx)
    }

    /// Returns the page index within the file.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.0
    }

    /// Returns the byte offset of this page within the file.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.0 as u64) * (super::PAGE_SIZE as u64)
    }

    /// Returns the next page ID.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u32> for PageId {
    fn from(page_idx: u32) -> Self {
        Self(page_idx)
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Page({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PAGE_SIZE;

    #[test]
    fn test_page_id_offset() {
        assert_eq!(PageId::new(0).offset(), 0);
        assert_eq!(PageId::new(1).offset(), PAGE_SIZE as u64);
        assert_eq!(PageId::new(10).offset(), 10 * PAGE_SIZE as u64);
    }

    #[test]
    fn test_page_id_next() {
        assert_eq!(PageId::new(5).next(), PageId::new(6));
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(PageId::from(181).to_string(), "Page(181)");
    }

    #[test]
    fn test_page_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(PageId::new(1));
        set.insert(PageId::new(2));
        set.insert(PageId::new(1)); // Duplicate

        assert_eq!(set.len(), 2);
    }
}
