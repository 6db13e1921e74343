//! Error types for pagegraph operations.

use thiserror::Error;

/// Result type alias using [`PageGraphError`].
pub type Result<T> = std::result::Result<T, PageGraphError>;

/// Error types for pagegraph operations.
#[derive(Debug, Error)]
pub enum PageGraphError {
    // ==================== Storage Errors ====================
    /// General storage/I/O error.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// No slot on the page can hold the record.
    #[error("Page is full: no slot can hold a record of {record_size} bytes")]
    PageFull { record_size: usize },

    /// Slot index past the directory or pointing at an empty slot.
    #[error("Invalid slot index {index} (max: {max})")]
    InvalidSlotIndex { index: usize, max: usize },

    /// Field or tuple text could not be parsed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A page holds bytes that do not decode to a valid record.
    #[error("Corrupted page {page_id}: {reason}")]
    CorruptedPage { page_id: u32, reason: String },

    /// Buffer pool errors.
    #[error("Buffer pool error: {0}")]
    BufferPoolError(String),

    /// Every resident page is pinned, so nothing can be evicted.
    #[error("Buffer pool exhausted: all {capacity} frames are pinned")]
    BufferPoolExhausted { capacity: usize },

    // ==================== Graph Errors ====================
    /// A fixed bound (node count, edge count, property count) would be exceeded.
    #[error("Capacity overflow: {0}")]
    CapacityOverflow(String),

    /// An encoded record does not fit in one page.
    #[error("Record too large: {size} bytes exceeds page capacity of {max} bytes")]
    RecordTooLarge { size: usize, max: usize },

    /// Identifier outside the valid range.
    #[error("{kind} id {id} out of range (valid: {min}..={max})")]
    OutOfRange {
        kind: &'static str,
        id: u64,
        min: u64,
        max: u64,
    },

    /// Invalid argument to a graph query.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Edge endpoint refers to a node that was never created.
    #[error("Referential integrity error: {0}")]
    ReferentialIntegrity(String),

    /// No node record on the page for this id.
    #[error("Node {0} not found")]
    NodeNotFound(u32),

    /// No edge record on the page for this id.
    #[error("Edge {0} not found")]
    EdgeNotFound(u32),

    // ==================== Front-end Errors ====================
    /// Invalid database configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// CSV import error.
    #[error("Import error: {0}")]
    ImportError(String),
}
