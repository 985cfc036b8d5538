//! Error types for QuillDB.

use crate::page::PAGE_SIZE;
use thiserror::Error;

/// Result type alias using QuillError.
pub type Result<T> = std::result::Result<T, QuillError>;

/// Errors that can occur in QuillDB operations.
#[derive(Debug, Error)]
pub enum QuillError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Corruption errors
    #[error("Database file corrupted: length {len} is not a multiple of page size {}", PAGE_SIZE)]
    Corrupt { len: u64 },

    #[error("Node corrupted on page {page_num}: {reason}")]
    CorruptNode { page_num: u32, reason: String },

    // Capacity errors
    #[error("Table full: page limit of {max_pages} reached")]
    TableFull { max_pages: u32 },

    // B+ tree errors
    #[error("Duplicate key: {key}")]
    DuplicateKey { key: u32 },

    #[error("Page {page_num} out of bounds (max pages {max_pages})")]
    PageOutOfBounds { page_num: u32, max_pages: u32 },

    #[error("Cell {index} out of bounds (count {count})")]
    CellOutOfBounds { index: u32, count: u32 },

    // Row validation errors
    #[error("Column {column} too long: {len} bytes (max {max})")]
    FieldTooLong {
        column: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Column {column} invalid: {reason}")]
    InvalidField {
        column: &'static str,
        reason: String,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl QuillError {
    /// Returns true if the caller can report this error and keep using the table.
    ///
    /// I/O failures, corruption and out-of-bounds faults are fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            QuillError::DuplicateKey { .. }
                | QuillError::TableFull { .. }
                | QuillError::FieldTooLong { .. }
                | QuillError::InvalidField { .. }
        )
    }
}
