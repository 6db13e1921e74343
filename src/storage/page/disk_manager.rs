//! Disk manager for page-level I/O.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{PageGraphError, Result};
use crate::storage::page::{Page, PageId, PAGE_SIZE};

/// Largest number of zeroed pages written per call while extending.
const EXTEND_CHUNK_PAGES: u32 = 256;

/// Manages disk I/O for database pages.
///
/// The disk manager handles:
/// - Reading and writing pages to/from disk
/// - Growing the file to a target page count
/// - Managing the database file
pub struct DiskManager {
    /// Path to the database file.
    path: PathBuf,
    /// File handle for the database file.
    file: File,
    /// Number of whole pages in the file.
    num_pages: AtomicU32,
    /// Serializes file extension.
    extend_lock: Mutex<()>,
}

impl DiskManager {
    /// Opens or creates a database file, keeping existing contents.
    ///
    /// An empty file is extended to hold one page.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn new(path: &Path) -> Result<Self> {
        Self::open(path, false)
    }

    /// Creates a database file, discarding any existing contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        Self::open(path, true)
    }

    /// Opens a database file, optionally truncating it first.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its size read.
    pub fn open(path: &Path, truncate: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(path)
            .map_err(|e| PageGraphError::StorageError(format!("Failed to open database file: {e}")))?;

        let file_len = file
            .metadata()
            .map_err(|e| PageGraphError::StorageError(format!("Failed to get file metadata: {e}")))?
            .len();

        let num_pages = u32::try_from(file_len / PAGE_SIZE as u64).map_err(|_| {
            PageGraphError::StorageError(format!("Database file too large: {file_len} bytes"))
        })?;

        let dm = Self {
            path: path.to_path_buf(),
            file,
            num_pages: AtomicU32::new(num_pages),
            extend_lock: Mutex::new(()),
        };

        if num_pages == 0 {
            dm.extend()?;
        }

        debug!(path = %dm.path.display(), pages = dm.num_pages(), "disk.open");
        Ok(dm)
    }

    /// Returns the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of pages in the database file.
    #[must_use]
    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Acquire)
    }

    /// Reads a page from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if seeking or reading fails for a reason other than
    /// the page lying past the end of the file.
    ///
    /// # Panics
    ///
    /// Panics if the file ends before the page does. The file has no
    /// redundancy to rebuild a missing page from, so this is fatal.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        self.file
            .seek(SeekFrom::Start(page_id.offset()))
            .map_err(|e| PageGraphError::StorageError(format!("Failed to seek to page: {e}")))?;

        let mut data = [0u8; PAGE_SIZE];

        match self.file.read_exact(&mut data) {
            Ok(()) => Ok(Page::from_data(page_id, data)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                error!(%page_id, pages = self.num_pages(), "disk.read_page.short_read");
                panic!(
                    "short read of {page_id} from {}: file holds {} pages",
                    self.path.display(),
                    self.num_pages()
                );
            }
            Err(e) => Err(PageGraphError::StorageError(format!(
                "Failed to read page {page_id}: {e}"
            ))),
        }
    }

    /// Writes a page to disk and syncs it to the backing medium.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or sync fails.
    pub fn write_page(&mut self, page: &Page) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(page.id.offset()))
            .map_err(|e| PageGraphError::StorageError(format!("Failed to seek to page: {e}")))?;

        self.file
            .write_all(&page.data)
            .map_err(|e| PageGraphError::StorageError(format!("Failed to write page: {e}")))?;

        self.file
            .sync_data()
            .map_err(|e| PageGraphError::StorageError(format!("Failed to sync page: {e}")))
    }

    /// Appends one zeroed page and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be extended.
    pub fn extend(&self) -> Result<PageId> {
        let _guard = self.extend_lock.lock();
        let page_idx = self.num_pages();
        self.append_zeroed(1)?;
        Ok(PageId::new(page_idx))
    }

    /// Grows the file so that `target` is a valid page.
    ///
    /// All missing pages are written in one batch. Does nothing if the file
    /// already covers `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be extended.
    pub fn extend_to(&self, target: PageId) -> Result<()> {
        let _guard = self.extend_lock.lock();
        let current = self.num_pages();
        let wanted = target.index().checked_add(1).ok_or_else(|| {
            PageGraphError::StorageError(format!("Page {target} exceeds the maximum file size"))
        })?;
        let missing = wanted.saturating_sub(current);
        if missing == 0 {
            return Ok(());
        }

        debug!(from = current, to = wanted, "disk.extend_to");
        self.append_zeroed(missing)
    }

    /// Writes `count` zeroed pages at the end of the file.
    ///
    /// Callers hold `extend_lock`.
    fn append_zeroed(&self, count: u32) -> Result<()> {
        let buffer = vec![0u8; count.min(EXTEND_CHUNK_PAGES) as usize * PAGE_SIZE];
        let mut file = &self.file;
        let start = u64::from(self.num_pages()) * PAGE_SIZE as u64;

        file.seek(SeekFrom::Start(start))
            .map_err(|e| PageGraphError::StorageError(format!("Failed to seek to end: {e}")))?;
        let mut remaining = count;
        while remaining > 0 {
            let pages = remaining.min(EXTEND_CHUNK_PAGES);
            file.write_all(&buffer[..pages as usize * PAGE_SIZE])
                .map_err(|e| PageGraphError::StorageError(format!("Failed to extend file: {e}")))?;
            remaining -= pages;
        }
        file.sync_data()
            .map_err(|e| PageGraphError::StorageError(format!("Failed to sync file: {e}")))?;

        self.num_pages.fetch_add(count, Ordering::AcqRel);
        Ok(())
    }

    /// Flushes all buffered writes to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| PageGraphError::StorageError(format!("Failed to sync file: {e}")))
    }

    /// Returns the size of the database file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    pub fn file_size(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| PageGraphError::StorageError(format!("Failed to get file size: {e}")))
    }
}

impl std::fmt::Debug for DiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskManager")
            .field("path", &self.path)
            .field("num_pages", &self.num_pages())
            .finish_non_exhaustive()
    }
}
