//! Paged B+Tree keyed by `u32`.
//!
//! Each node occupies one page. Leaves hold fixed-size `(key, row)` cells in
//! key order; internal nodes hold `(child, key)` cells plus a right child,
//! where each key is the largest key under its child.
//!
//! ```text
//!                 [ page 0: internal ]
//!                 | 7 |     right     |
//!                /                     \
//!   [ page 2: leaf 1..=7 ]     [ page 1: leaf 8..=14 ]
//! ```
//!
//! The root never moves from page 0. Leaves carry no sibling links; the
//! cursor reaches the next leaf by climbing parent pointers.
//!
//! Nodes are never merged or freed, so the file only grows.

// Submodules
pub mod constants;
pub mod cursor;
pub mod inspect;
pub mod node;
pub mod tree;

// Re-exports for public API
pub use constants::{LayoutInfo, INTERNAL_MAX_KEYS, LEAF_MAX_CELLS};
pub use cursor::Cursor;
pub use inspect::TreeStats;
pub use node::{InternalNode, LeafNode, Node, NodePage, NodePageMut};
pub use tree::{BTree, ROOT_PAGE_NUM};
