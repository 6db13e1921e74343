//! Slot-directory page layout.
//!
//! Layout:
//! ```text
//! [0..3072)     slot directory: 512 descriptors of 6 bytes
//!               [occupied: u8][reserved: u8][offset: u16 LE][length: u16 LE]
//! [3072..4096)  data region
//! ```
//!
//! Offsets and lengths use `u16::MAX` for "unassigned". Slot regions are
//! handed out in slot order, each starting where the previous one ends. A
//! deleted slot keeps its offset and reserved length so later inserts reuse
//! the space in place; nothing is ever compacted.

use crate::error::{PageGraphError, Result};
use crate::storage::page::PAGE_SIZE;
use crate::types::Tuple;

/// Number of slot descriptors per page.
pub const MAX_SLOTS: usize = 512;

/// Encoded size of one slot descriptor.
pub const SLOT_SIZE: usize = 6;

/// Size of the slot directory; the data region starts here.
pub const SLOT_DIRECTORY_SIZE: usize = MAX_SLOTS * SLOT_SIZE;

/// Sentinel marking an unassigned offset or length.
pub const INVALID_SLOT_VALUE: u16 = u16::MAX;

/// One slot directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Whether the slot currently holds a record.
    pub occupied: bool,
    /// Start of the slot's region within the page.
    pub offset: u16,
    /// Reserved length of the slot's region.
    pub length: u16,
}

impl Slot {
    /// A slot that was never assigned a region.
    pub const UNASSIGNED: Slot = Slot {
        occupied: false,
        offset: INVALID_SLOT_VALUE,
        length: INVALID_SLOT_VALUE,
    };

    /// Returns true once the slot owns a region of the page.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.offset != INVALID_SLOT_VALUE
    }

    fn decode(bytes: &[u8]) -> Self {
        let offset = u16::from_le_bytes([bytes[2], bytes[3]]);
        let length = u16::from_le_bytes([bytes[4], bytes[5]]);
        // A zeroed descriptor comes from a never-formatted page; offset 0
        // lies inside the directory, so it cannot be a real assignment.
        if offset == 0 && bytes[0] == 0 {
            return Slot::UNASSIGNED;
        }
        Slot {
            occupied: bytes[0] != 0,
            offset,
            length,
        }
    }

    fn encode(&self, out: &mut [u8]) {
        out[0] = u8::from(self.occupied);
        out[1] = 0;
        out[2..4].copy_from_slice(&self.offset.to_le_bytes());
        out[4..6].copy_from_slice(&self.length.to_le_bytes());
    }
}

/// Slot-directory view over a page buffer.
///
/// Works over anything that exposes the page bytes: a [`Page`](super::Page),
/// or the slice behind a buffer pool handle.
pub struct SlottedPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> SlottedPage<B> {
    /// Wraps a page buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is not exactly one page long.
    pub fn new(data: B) -> Self {
        assert_eq!(data.as_ref().len(), PAGE_SIZE, "slotted page must be one page");
        Self { data }
    }

    /// Reads the descriptor at `idx`.
    #[must_use]
    pub fn slot(&self, idx: usize) -> Option<Slot> {
        if idx >= MAX_SLOTS {
            return None;
        }
        let start = idx * SLOT_SIZE;
        Some(Slot::decode(&self.data.as_ref()[start..start + SLOT_SIZE]))
    }

    /// Returns the number of occupied slots.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        (0..MAX_SLOTS)
            .filter_map(|idx| self.slot(idx))
            .filter(|slot| slot.occupied)
            .count()
    }

    /// Reads the record in slot `idx`, if the slot is occupied.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot index is out of range or the stored
    /// bytes do not parse as a tuple.
    pub fn get(&self, idx: usize) -> Result<Option<Tuple>> {
        let slot = self.slot(idx).ok_or(PageGraphError::InvalidSlotIndex {
            index: idx,
            max: MAX_SLOTS - 1,
        })?;
        if !slot.occupied {
            return Ok(None);
        }
        self.read_record(slot).map(Some)
    }

    /// Returns every occupied slot's record, in slot order.
    ///
    /// # Errors
    ///
    /// Returns an error if any occupied slot holds malformed bytes.
    pub fn scan(&self) -> Result<Vec<(usize, Tuple)>> {
        let mut records = Vec::new();
        for idx in 0..MAX_SLOTS {
            let Some(slot) = self.slot(idx) else { break };
            if slot.occupied {
                records.push((idx, self.read_record(slot)?));
            }
        }
        Ok(records)
    }

    fn read_record(&self, slot: Slot) -> Result<Tuple> {
        let start = usize::from(slot.offset);
        let end = start + usize::from(slot.length);
        let bytes = self.data.as_ref().get(start..end).ok_or_else(|| {
            PageGraphError::SerializationError(format!(
                "slot region {start}..{end} exceeds page size"
            ))
        })?;
        // A reused region may hold the tail of an older, longer record
        // after the current one; only the valid prefix matters.
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).map_err(|e| {
                PageGraphError::SerializationError(format!("slot holds invalid UTF-8: {e}"))
            })?,
        };
        Tuple::deserialize(text)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> SlottedPage<B> {
    /// Resets every descriptor to the unassigned state.
    pub fn format(&mut self) {
        for idx in 0..MAX_SLOTS {
            self.write_slot(idx, Slot::UNASSIGNED);
        }
    }

    fn write_slot(&mut self, idx: usize, slot: Slot) {
        let start = idx * SLOT_SIZE;
        slot.encode(&mut self.data.as_mut()[start..start + SLOT_SIZE]);
    }

    /// Inserts a tuple into the first slot that can hold it.
    ///
    /// Returns the slot index. The page is left untouched on failure.
    ///
    /// # Errors
    ///
    /// Returns `PageFull` if no slot has room for the record or its region
    /// would reach the end of the page.
    pub fn insert(&mut self, tuple: &Tuple) -> Result<usize> {
        let record = tuple.serialize();
        let size = record.len();
        let full = || PageGraphError::PageFull { record_size: size };
        if size >= PAGE_SIZE - SLOT_DIRECTORY_SIZE {
            return Err(full());
        }

        let (idx, slot) = (0..MAX_SLOTS)
            .filter_map(|idx| self.slot(idx).map(|slot| (idx, slot)))
            .find(|(_, slot)| {
                !slot.occupied && (!slot.is_assigned() || usize::from(slot.length) >= size)
            })
            .ok_or_else(full)?;

        let (offset, length) = if slot.is_assigned() {
            (usize::from(slot.offset), slot.length)
        } else if idx == 0 {
            (SLOT_DIRECTORY_SIZE, size as u16)
        } else {
            let prev = self
                .slot(idx - 1)
                .filter(Slot::is_assigned)
                .ok_or_else(full)?;
            (usize::from(prev.offset) + usize::from(prev.length), size as u16)
        };

        if offset + size >= PAGE_SIZE {
            return Err(full());
        }

        self.data.as_mut()[offset..offset + size].copy_from_slice(record.as_bytes());
        self.write_slot(
            idx,
            Slot {
                occupied: true,
                offset: offset as u16,
                length,
            },
        );
        Ok(idx)
    }

    /// Marks slot `idx` empty, keeping its region reserved for reuse.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlotIndex` if the slot is out of range or not occupied.
    pub fn delete(&mut self, idx: usize) -> Result<()> {
        match self.slot(idx) {
            Some(slot) if slot.occupied => {
                self.write_slot(
                    idx,
                    Slot {
                        occupied: false,
                        ..slot
                    },
                );
                Ok(())
            }
            _ => Err(PageGraphError::InvalidSlotIndex {
                index: idx,
                max: MAX_SLOTS - 1,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::{Page, PageId};
    use crate::types::Field;

    fn user_tuple(id: i32, name: &str) -> Tuple {
        [Field::Integer(id), Field::from(name), Field::Float(1.5)]
            .into_iter()
            .collect()
    }

    fn formatted_page() -> SlottedPage<Page> {
        let mut page = SlottedPage::new(Page::new(PageId::new(0)));
        page.format();
        page
    }

    #[test]
    fn test_zeroed_page_reads_as_unassigned() {
        let page = SlottedPage::new(Page::new(PageId::new(0)));
        assert_eq!(page.slot(0), Some(Slot::UNASSIGNED));
        assert_eq!(page.occupied_count(), 0);
        assert!(page.scan().unwrap().is_empty());
    }

    #[test]
    fn test_insert_assigns_consecutive_regions() {
        let mut page = formatted_page();
        let first = user_tuple(1, "ada");
        let second = user_tuple(2, "grace");

        assert_eq!(page.insert(&first).unwrap(), 0);
        assert_eq!(page.insert(&second).unwrap(), 1);

        let s0 = page.slot(0).unwrap();
        let s1 = page.slot(1).unwrap();
        assert_eq!(usize::from(s0.offset), SLOT_DIRECTORY_SIZE);
        assert_eq!(usize::from(s0.length), first.serialize().len());
        assert_eq!(s1.offset, s0.offset + s0.length);
    }

    #[test]
    fn test_insert_into_zeroed_page() {
        let mut page = SlottedPage::new(Page::new(PageId::new(0)));
        assert_eq!(page.insert(&user_tuple(1, "x")).unwrap(), 0);
        assert_eq!(page.get(0).unwrap(), Some(user_tuple(1, "x")));
    }

    #[test]
    fn test_scan_returns_records_in_slot_order() {
        let mut page = formatted_page();
        for i in 0..5 {
            page.insert(&user_tuple(i, "n")).unwrap();
        }

        let records = page.scan().unwrap();
        let ids: Vec<i32> = records
            .iter()
            .map(|(_, t)| t.get(0).and_then(Field::as_int).unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_delete_keeps_region_reserved() {
        let mut page = formatted_page();
        page.insert(&user_tuple(1, "long-name")).unwrap();
        page.insert(&user_tuple(2, "b")).unwrap();
        let before = page.slot(0).unwrap();

        page.delete(0).unwrap();
        let after = page.slot(0).unwrap();
        assert!(!after.occupied);
        assert_eq!(after.offset, before.offset);
        assert_eq!(after.length, before.length);

        // A shorter record reuses slot 0 in place.
        assert_eq!(page.insert(&user_tuple(3, "s")).unwrap(), 0);
        assert_eq!(page.slot(0).unwrap().offset, before.offset);
        assert_eq!(page.get(0).unwrap(), Some(user_tuple(3, "s")));
    }

    #[test]
    fn test_larger_record_skips_small_free_slot() {
        let mut page = formatted_page();
        page.insert(&user_tuple(1, "a")).unwrap();
        page.insert(&user_tuple(2, "b")).unwrap();
        page.delete(0).unwrap();

        let idx = page.insert(&user_tuple(3, "a-much-longer-name")).unwrap();
        assert_eq!(idx, 2);
        assert!(!page.slot(0).unwrap().occupied);
    }

    #[test]
    fn test_delete_invalid_slot() {
        let mut page = formatted_page();
        assert!(matches!(
            page.delete(0),
            Err(PageGraphError::InvalidSlotIndex { index: 0, .. })
        ));
        assert!(page.delete(MAX_SLOTS).is_err());
    }

    #[test]
    fn test_insert_fails_when_page_full() {
        let mut page = formatted_page();
        let tuple = user_tuple(7, "filler-record");
        let size = tuple.serialize().len();
        let fits = (PAGE_SIZE - SLOT_DIRECTORY_SIZE - 1) / size;

        for _ in 0..fits {
            page.insert(&tuple).unwrap();
        }
        let before = page.occupied_count();
        assert!(matches!(
            page.insert(&tuple),
            Err(PageGraphError::PageFull { .. })
        ));
        assert_eq!(page.occupied_count(), before);
        assert_eq!(page.slot(fits), Some(Slot::UNASSIGNED));
    }

    #[test]
    fn test_record_ending_at_page_boundary_is_rejected() {
        let mut page = formatted_page();
        // Framing around the value: "1 " count, "2 " tag, a 4-digit
        // length and two separating spaces.
        let region = PAGE_SIZE - SLOT_DIRECTORY_SIZE;
        let exact = Tuple::from_iter([Field::String("x".repeat(region - 10))]);
        assert_eq!(exact.serialize().len(), region);
        assert!(page.insert(&exact).is_err());

        let under = Tuple::from_iter([Field::String("x".repeat(region - 11))]);
        assert_eq!(under.serialize().len(), region - 1);
        assert_eq!(page.insert(&under).unwrap(), 0);
    }
}
