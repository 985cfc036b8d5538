//! Configuration for opening a table file.

use crate::btree::constants::{DEFAULT_MAX_PAGES, INTERNAL_MAX_KEYS, INTERNAL_MIN_KEYS_CAP};
use quill_common::{QuillError, Result};
use serde::{Deserialize, Serialize};

/// Table configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Maximum number of pages the table file may hold.
    pub max_pages: u32,
    /// Maximum keys per internal node before it splits.
    ///
    /// Lowering this does not change the on-disk layout, only how full
    /// internal nodes are allowed to get.
    pub internal_max_keys: u32,
    /// Call fsync after the final flush on close.
    pub fsync_on_close: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            internal_max_keys: INTERNAL_MAX_KEYS,
            fsync_on_close: true,
        }
    }
}

impl TableConfig {
    /// Checks that all values are within their supported ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(QuillError::ConfigError(
                "max_pages must be at least 1".to_string(),
            ));
        }
        if !(INTERNAL_MIN_KEYS_CAP..=INTERNAL_MAX_KEYS).contains(&self.internal_max_keys) {
            return Err(QuillError::ConfigError(format!(
                "internal_max_keys must be between {} and {}, got {}",
                INTERNAL_MIN_KEYS_CAP, INTERNAL_MAX_KEYS, self.internal_max_keys
            )));
        }
        Ok(())
    }

    /// Returns the file size in bytes when every page is in use.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_pages as u64 * quill_common::PAGE_SIZE as u64
    }
}
