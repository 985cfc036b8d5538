//! Storage engine for QuillDB.
//!
//! This crate provides:
//! - Fixed-width row representation and serialization
//! - Pager for page-level file I/O with a resident page cache
//! - Paged B+Tree keyed by `u32` with leaf and internal node splits
//! - Cursors for ordered iteration
//! - Table handle combining the pager and the tree

pub mod btree;
mod config;
mod pager;
mod row;
mod table;

pub use btree::{Cursor, LayoutInfo, TreeStats, INTERNAL_MAX_KEYS, LEAF_MAX_CELLS};
pub use config::TableConfig;
pub use pager::Pager;
pub use row::{Row, EMAIL_SIZE, ROW_SIZE, USERNAME_SIZE};
pub use table::Table;
