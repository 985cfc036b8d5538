//! B+Tree node layout constants.
//!
//! Every node starts with the common [`NodeHeader`]. Leaf and internal nodes
//! extend it with their own counters and a body of fixed-size cells.

use crate::row::ROW_SIZE;
use quill_common::page::{NodeHeader, PAGE_SIZE};

/// Size of a key or page pointer stored in a node.
const U32_SIZE: usize = std::mem::size_of::<u32>();

// Leaf node layout

/// Offset of the leaf cell count.
pub const LEAF_NUM_CELLS_OFFSET: usize = NodeHeader::SIZE;

/// Leaf header size (10 bytes).
pub const LEAF_HEADER_SIZE: usize = NodeHeader::SIZE + U32_SIZE;

/// Leaf cell key size.
pub const LEAF_KEY_SIZE: usize = U32_SIZE;

/// Leaf cell value (row) offset within the cell.
pub const LEAF_VALUE_OFFSET: usize = LEAF_KEY_SIZE;

/// Leaf cell size: key + row = 295 bytes.
pub const LEAF_CELL_SIZE: usize = LEAF_KEY_SIZE + ROW_SIZE;

/// Bytes available for leaf cells.
pub const LEAF_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_HEADER_SIZE;

/// Maximum cells per leaf: (4096 - 10) / 295 = 13
pub const LEAF_MAX_CELLS: u32 = (LEAF_SPACE_FOR_CELLS / LEAF_CELL_SIZE) as u32;

/// Cells moved to the new right leaf on split (rounded up).
pub const LEAF_RIGHT_SPLIT_COUNT: u32 = (LEAF_MAX_CELLS + 2) / 2;

/// Cells kept in the original left leaf on split.
pub const LEAF_LEFT_SPLIT_COUNT: u32 = (LEAF_MAX_CELLS + 1) - LEAF_RIGHT_SPLIT_COUNT;

// Internal node layout

/// Offset of the internal key count.
pub const INTERNAL_NUM_KEYS_OFFSET: usize = NodeHeader::SIZE;

/// Offset of the rightmost child pointer.
pub const INTERNAL_RIGHT_CHILD_OFFSET: usize = INTERNAL_NUM_KEYS_OFFSET + U32_SIZE;

/// Internal header size (14 bytes).
pub const INTERNAL_HEADER_SIZE: usize = INTERNAL_RIGHT_CHILD_OFFSET + U32_SIZE;

/// Internal cell child pointer size.
pub const INTERNAL_CHILD_SIZE: usize = U32_SIZE;

/// Internal cell key size.
pub const INTERNAL_KEY_SIZE: usize = U32_SIZE;

/// Internal cell size: child + key = 8 bytes.
pub const INTERNAL_CELL_SIZE: usize = INTERNAL_CHILD_SIZE + INTERNAL_KEY_SIZE;

/// Maximum keys per internal node: (4096 - 14) / 8 = 510
pub const INTERNAL_MAX_KEYS: u32 = ((PAGE_SIZE - INTERNAL_HEADER_SIZE) / INTERNAL_CELL_SIZE) as u32;

/// Smallest internal fan-out cap that still splits into two non-empty halves.
pub const INTERNAL_MIN_KEYS_CAP: u32 = 2;

// Table limits

/// Default page ceiling for a table file.
pub const DEFAULT_MAX_PAGES: u32 = 100;

/// Maximum tree height walked during descent before the tree is deemed corrupt.
pub const MAX_HEIGHT: usize = 32;

/// Snapshot of the derived layout, printable for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutInfo {
    pub row_size: usize,
    pub page_size: usize,
    pub common_header_size: usize,
    pub leaf_header_size: usize,
    pub leaf_cell_size: usize,
    pub leaf_space_for_cells: usize,
    pub leaf_max_cells: u32,
    pub internal_header_size: usize,
    pub internal_cell_size: usize,
    pub internal_max_keys: u32,
    pub max_pages: u32,
}

impl LayoutInfo {
    /// Returns the layout for a table with the given page ceiling.
    pub fn new(max_pages: u32) -> Self {
        Self {
            row_size: ROW_SIZE,
            page_size: PAGE_SIZE,
            common_header_size: NodeHeader::SIZE,
            leaf_header_size: LEAF_HEADER_SIZE,
            leaf_cell_size: LEAF_CELL_SIZE,
            leaf_space_for_cells: LEAF_SPACE_FOR_CELLS,
            leaf_max_cells: LEAF_MAX_CELLS,
            internal_header_size: INTERNAL_HEADER_SIZE,
            internal_cell_size: INTERNAL_CELL_SIZE,
            internal_max_keys: INTERNAL_MAX_KEYS,
            max_pages,
        }
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAGES)
    }
}

impl std::fmt::Display for LayoutInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ROW_SIZE: {}", self.row_size)?;
        writeln!(f, "PAGE_SIZE: {}", self.page_size)?;
        writeln!(f, "COMMON_NODE_HEADER_SIZE: {}", self.common_header_size)?;
        writeln!(f, "LEAF_NODE_HEADER_SIZE: {}", self.leaf_header_size)?;
        writeln!(f, "LEAF_NODE_CELL_SIZE: {}", self.leaf_cell_size)?;
        writeln!(f, "LEAF_NODE_SPACE_FOR_CELLS: {}", self.leaf_space_for_cells)?;
        writeln!(f, "LEAF_NODE_MAX_CELLS: {}", self.leaf_max_cells)?;
        writeln!(f, "INTERNAL_NODE_HEADER_SIZE: {}", self.internal_header_size)?;
        writeln!(f, "INTERNAL_NODE_CELL_SIZE: {}", self.internal_cell_size)?;
        writeln!(f, "INTERNAL_NODE_MAX_KEYS: {}", self.internal_max_keys)?;
        write!(f, "TABLE_MAX_PAGES: {}", self.max_pages)
    }
}
