//! QuillDB common types and errors.
//!
//! This crate provides the error type and on-disk page definitions shared by
//! the QuillDB crates.

pub mod error;
pub mod page;

pub use error::{QuillError, Result};
pub use page::{NodeHeader, NodeType, PageNum, PAGE_SIZE};
