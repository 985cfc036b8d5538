//! Typed views over B+Tree node pages.
//!
//! A view borrows (or owns) a page buffer and exposes bounds-checked accessors
//! for one node kind. Constructing a view checks the buffer length and the
//! node type byte, so the accessors only need to check cell indexes.
//!
//! Leaf node layout:
//! ```text
//! +------------------------+ 0
//! | node_type: u8          |
//! | is_root: u8            |
//! | parent_page: u32       | 6
//! | num_cells: u32         | 10 (LEAF_HEADER_SIZE)
//! +------------------------+
//! | key_0: u32             |
//! | row_0: [u8; 291]       | 305
//! | key_1: u32             |
//! | ...                    |
//! +------------------------+
//! ```
//!
//! Internal node layout:
//! ```text
//! +------------------------+ 0
//! | node_type: u8          |
//! | is_root: u8            |
//! | parent_page: u32       | 6
//! | num_keys: u32          | 10
//! | right_child: u32       | 14 (INTERNAL_HEADER_SIZE)
//! +------------------------+
//! | child_0: u32           |
//! | key_0: u32             | 22
//! | child_1: u32           |
//! | ...                    |
//! +------------------------+
//! ```

use super::constants::{
    INTERNAL_CELL_SIZE, INTERNAL_CHILD_SIZE, INTERNAL_HEADER_SIZE, INTERNAL_MAX_KEYS,
    INTERNAL_NUM_KEYS_OFFSET, INTERNAL_RIGHT_CHILD_OFFSET, LEAF_CELL_SIZE, LEAF_HEADER_SIZE,
    LEAF_KEY_SIZE, LEAF_MAX_CELLS, LEAF_NUM_CELLS_OFFSET, LEAF_VALUE_OFFSET,
};
use crate::row::{Row, ROW_SIZE};
use quill_common::page::{NodeHeader, NodeType, PageNum, PAGE_SIZE};
use quill_common::{QuillError, Result};

#[inline(always)]
fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline(always)]
fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn corrupt(page_num: PageNum, reason: impl Into<String>) -> QuillError {
    QuillError::CorruptNode {
        page_num,
        reason: reason.into(),
    }
}

/// Decodes the common header of a page.
pub fn read_header(page_num: PageNum, data: &[u8]) -> Result<NodeHeader> {
    if data.len() != PAGE_SIZE {
        return Err(corrupt(
            page_num,
            format!("page buffer is {} bytes, expected {}", data.len(), PAGE_SIZE),
        ));
    }
    NodeHeader::from_bytes(data).ok_or_else(|| {
        corrupt(
            page_num,
            format!("invalid node type {}", data[NodeHeader::NODE_TYPE_OFFSET]),
        )
    })
}

fn check_type(page_num: PageNum, data: &[u8], expected: NodeType) -> Result<()> {
    let header = read_header(page_num, data)?;
    if header.node_type != expected {
        return Err(corrupt(
            page_num,
            format!("expected {} node, found {}", expected, header.node_type),
        ));
    }
    Ok(())
}

/// Common header access shared by both node kinds.
pub trait NodePage {
    /// Page number this view was built for.
    fn page_num(&self) -> PageNum;

    /// Raw page bytes.
    fn bytes(&self) -> &[u8];

    /// Returns true if this node is the tree root.
    fn is_root(&self) -> bool {
        self.bytes()[NodeHeader::IS_ROOT_OFFSET] != 0
    }

    /// Returns the parent page number.
    fn parent(&self) -> PageNum {
        read_u32(self.bytes(), NodeHeader::PARENT_OFFSET)
    }
}

/// Common header mutation shared by both node kinds.
pub trait NodePageMut: NodePage {
    /// Raw page bytes, writable.
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Sets or clears the root flag.
    fn set_root(&mut self, is_root: bool) {
        self.bytes_mut()[NodeHeader::IS_ROOT_OFFSET] = is_root as u8;
    }

    /// Sets the parent page number.
    fn set_parent(&mut self, parent: PageNum) {
        write_u32(self.bytes_mut(), NodeHeader::PARENT_OFFSET, parent);
    }
}

/// A page interpreted according to its node type byte.
pub enum Node<B> {
    Leaf(LeafNode<B>),
    Internal(InternalNode<B>),
}

impl<B: AsRef<[u8]>> Node<B> {
    /// Builds the view matching the page's node type.
    pub fn from_page(page_num: PageNum, data: B) -> Result<Self> {
        match read_header(page_num, data.as_ref())?.node_type {
            NodeType::Leaf => LeafNode::from_page(page_num, data).map(Node::Leaf),
            NodeType::Internal => InternalNode::from_page(page_num, data).map(Node::Internal),
        }
    }

    /// Returns the node type.
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Leaf(_) => NodeType::Leaf,
            Node::Internal(_) => NodeType::Internal,
        }
    }
}

impl<B: AsRef<[u8]>> NodePage for Node<B> {
    fn page_num(&self) -> PageNum {
        match self {
            Node::Leaf(leaf) => leaf.page_num(),
            Node::Internal(internal) => internal.page_num(),
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Node::Leaf(leaf) => leaf.bytes(),
            Node::Internal(internal) => internal.bytes(),
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> NodePageMut for Node<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Node::Leaf(leaf) => leaf.bytes_mut(),
            Node::Internal(internal) => internal.bytes_mut(),
        }
    }
}

// =============================================================================
// Leaf nodes
// =============================================================================

/// View of a leaf node: sorted `(key, row)` cells.
pub struct LeafNode<B> {
    page_num: PageNum,
    data: B,
}

impl<B: AsRef<[u8]>> NodePage for LeafNode<B> {
    fn page_num(&self) -> PageNum {
        self.page_num
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> NodePageMut for LeafNode<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }
}

impl<B: AsRef<[u8]>> LeafNode<B> {
    /// Wraps an existing leaf page.
    pub fn from_page(page_num: PageNum, data: B) -> Result<Self> {
        check_type(page_num, data.as_ref(), NodeType::Leaf)?;
        let node = Self { page_num, data };
        let num_cells = node.num_cells();
        if num_cells > LEAF_MAX_CELLS {
            return Err(corrupt(
                page_num,
                format!("leaf has {} cells, max {}", num_cells, LEAF_MAX_CELLS),
            ));
        }
        Ok(node)
    }

    /// Byte offset of cell `index`, checked against the leaf capacity.
    fn cell_offset(index: u32) -> Result<usize> {
        if index >= LEAF_MAX_CELLS {
            return Err(QuillError::CellOutOfBounds {
                index,
                count: LEAF_MAX_CELLS,
            });
        }
        Ok(LEAF_HEADER_SIZE + index as usize * LEAF_CELL_SIZE)
    }

    /// Checks `index` against the current cell count.
    fn check_index(&self, index: u32) -> Result<usize> {
        let count = self.num_cells();
        if index >= count {
            return Err(QuillError::CellOutOfBounds { index, count });
        }
        Self::cell_offset(index)
    }

    /// Returns the number of cells.
    #[inline]
    pub fn num_cells(&self) -> u32 {
        read_u32(self.bytes(), LEAF_NUM_CELLS_OFFSET)
    }

    /// Returns true if no more cells fit.
    pub fn is_full(&self) -> bool {
        self.num_cells() >= LEAF_MAX_CELLS
    }

    /// Returns the key of cell `index`.
    pub fn key(&self, index: u32) -> Result<u32> {
        let offset = self.check_index(index)?;
        Ok(read_u32(self.bytes(), offset))
    }

    /// Returns the row of cell `index`.
    pub fn row(&self, index: u32) -> Result<Row> {
        let offset = self.check_index(index)? + LEAF_VALUE_OFFSET;
        Row::deserialize(&self.bytes()[offset..offset + ROW_SIZE])
            .ok_or_else(|| corrupt(self.page_num, format!("unreadable row in cell {}", index)))
    }

    /// Returns the raw bytes of cell `index` (key followed by row).
    pub fn cell_bytes(&self, index: u32) -> Result<&[u8]> {
        let offset = self.check_index(index)?;
        Ok(&self.bytes()[offset..offset + LEAF_CELL_SIZE])
    }

    /// Returns the key of the last cell, or None for an empty leaf.
    pub fn max_key(&self) -> Option<u32> {
        match self.num_cells() {
            0 => None,
            n => self.key(n - 1).ok(),
        }
    }

    /// Binary search for a key. Returns Ok(index) if found, Err(index) for the
    /// insertion point that keeps the cells sorted.
    pub fn search(&self, key: u32) -> std::result::Result<u32, u32> {
        let data = self.bytes();
        let mut low = 0u32;
        let mut high = self.num_cells();

        while low < high {
            let mid = low + (high - low) / 2;
            let cell_key = read_u32(data, LEAF_HEADER_SIZE + mid as usize * LEAF_CELL_SIZE);
            match key.cmp(&cell_key) {
                std::cmp::Ordering::Equal => return Ok(mid),
                std::cmp::Ordering::Less => high = mid,
                std::cmp::Ordering::Greater => low = mid + 1,
            }
        }
        Err(low)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> LeafNode<B> {
    /// Formats the page as an empty, non-root leaf.
    pub fn init(page_num: PageNum, mut data: B) -> Result<Self> {
        let bytes = data.as_mut();
        if bytes.len() != PAGE_SIZE {
            return Err(corrupt(page_num, "page buffer has the wrong size"));
        }
        bytes[..NodeHeader::SIZE].copy_from_slice(&NodeHeader::new(NodeType::Leaf).to_bytes());
        write_u32(bytes, LEAF_NUM_CELLS_OFFSET, 0);
        Ok(Self { page_num, data })
    }

    /// Sets the cell count.
    fn set_num_cells(&mut self, num_cells: u32) {
        write_u32(self.bytes_mut(), LEAF_NUM_CELLS_OFFSET, num_cells);
    }

    /// Writes `(key, row)` into slot `index` without touching the cell count.
    fn write_cell(&mut self, index: u32, key: u32, row: &Row) -> Result<()> {
        let offset = Self::cell_offset(index)?;
        let data = self.bytes_mut();
        write_u32(data, offset, key);
        row.serialize_into(&mut data[offset + LEAF_KEY_SIZE..offset + LEAF_CELL_SIZE]);
        Ok(())
    }

    /// Inserts `(key, row)` at `index`, shifting later cells one slot right.
    pub fn insert(&mut self, index: u32, key: u32, row: &Row) -> Result<()> {
        let num_cells = self.num_cells();
        if num_cells >= LEAF_MAX_CELLS {
            return Err(QuillError::CellOutOfBounds {
                index: num_cells,
                count: LEAF_MAX_CELLS,
            });
        }
        if index > num_cells {
            return Err(QuillError::CellOutOfBounds {
                index,
                count: num_cells,
            });
        }

        if index < num_cells {
            let start = Self::cell_offset(index)?;
            let end = LEAF_HEADER_SIZE + num_cells as usize * LEAF_CELL_SIZE;
            self.bytes_mut()
                .copy_within(start..end, start + LEAF_CELL_SIZE);
        }

        self.write_cell(index, key, row)?;
        self.set_num_cells(num_cells + 1);
        Ok(())
    }

    /// Replaces every cell with `cells`, zeroing the unused tail.
    ///
    /// Each cell must be LEAF_CELL_SIZE bytes (key followed by row).
    pub fn write_cells<C: AsRef<[u8]>>(&mut self, cells: &[C]) -> Result<()> {
        if cells.len() > LEAF_MAX_CELLS as usize {
            return Err(QuillError::CellOutOfBounds {
                index: cells.len() as u32,
                count: LEAF_MAX_CELLS,
            });
        }

        if cells.iter().any(|cell| cell.as_ref().len() != LEAF_CELL_SIZE) {
            return Err(corrupt(self.page_num, "leaf cell has the wrong size"));
        }

        let data = self.bytes_mut();
        let mut offset = LEAF_HEADER_SIZE;
        for cell in cells {
            let cell = cell.as_ref();
            data[offset..offset + LEAF_CELL_SIZE].copy_from_slice(cell);
            offset += LEAF_CELL_SIZE;
        }
        data[offset..].fill(0);

        self.set_num_cells(cells.len() as u32);
        Ok(())
    }
}

/// Builds the raw bytes of a leaf cell.
pub fn leaf_cell(key: u32, row: &Row) -> [u8; LEAF_CELL_SIZE] {
    let mut cell = [0u8; LEAF_CELL_SIZE];
    write_u32(&mut cell, 0, key);
    row.serialize_into(&mut cell[LEAF_KEY_SIZE..]);
    cell
}

// =============================================================================
// Internal nodes
// =============================================================================

/// View of an internal node: sorted `(child, key)` cells plus a right child.
///
/// Children are addressed by index `0..=num_keys`; index `num_keys` is the
/// right child.
pub struct InternalNode<B> {
    page_num: PageNum,
    data: B,
}

impl<B: AsRef<[u8]>> NodePage for InternalNode<B> {
    fn page_num(&self) -> PageNum {
        self.page_num
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> NodePageMut for InternalNode<B> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }
}

impl<B: AsRef<[u8]>> InternalNode<B> {
    /// Wraps an existing internal page.
    pub fn from_page(page_num: PageNum, data: B) -> Result<Self> {
        check_type(page_num, data.as_ref(), NodeType::Internal)?;
        let node = Self { page_num, data };
        let num_keys = node.num_keys();
        if num_keys > INTERNAL_MAX_KEYS {
            return Err(corrupt(
                page_num,
                format!("internal node has {} keys, max {}", num_keys, INTERNAL_MAX_KEYS),
            ));
        }
        Ok(node)
    }

    /// Byte offset of cell `index`, checked against the node capacity.
    fn cell_offset(index: u32) -> Result<usize> {
        if index >= INTERNAL_MAX_KEYS {
            return Err(QuillError::CellOutOfBounds {
                index,
                count: INTERNAL_MAX_KEYS,
            });
        }
        Ok(INTERNAL_HEADER_SIZE + index as usize * INTERNAL_CELL_SIZE)
    }

    /// Returns the number of keys.
    #[inline]
    pub fn num_keys(&self) -> u32 {
        read_u32(self.bytes(), INTERNAL_NUM_KEYS_OFFSET)
    }

    /// Returns the rightmost child pointer.
    #[inline]
    pub fn right_child(&self) -> PageNum {
        read_u32(self.bytes(), INTERNAL_RIGHT_CHILD_OFFSET)
    }

    /// Returns the key of cell `index`.
    pub fn key(&self, index: u32) -> Result<u32> {
        let count = self.num_keys();
        if index >= count {
            return Err(QuillError::CellOutOfBounds { index, count });
        }
        let offset = Self::cell_offset(index)? + INTERNAL_CHILD_SIZE;
        Ok(read_u32(self.bytes(), offset))
    }

    /// Returns child `index`; `num_keys` addresses the right child.
    pub fn child(&self, index: u32) -> Result<PageNum> {
        let num_keys = self.num_keys();
        if index > num_keys {
            return Err(QuillError::CellOutOfBounds {
                index,
                count: num_keys + 1,
            });
        }
        if index == num_keys {
            return Ok(self.right_child());
        }
        let offset = Self::cell_offset(index)?;
        Ok(read_u32(self.bytes(), offset))
    }

    /// Returns the index of the child a key routes to: the first cell whose
    /// key is `>= key`, or `num_keys` (the right child) if there is none.
    pub fn find_child_index(&self, key: u32) -> u32 {
        let data = self.bytes();
        let mut low = 0u32;
        let mut high = self.num_keys();

        while low < high {
            let mid = low + (high - low) / 2;
            let offset = INTERNAL_HEADER_SIZE + mid as usize * INTERNAL_CELL_SIZE;
            let cell_key = read_u32(data, offset + INTERNAL_CHILD_SIZE);
            if cell_key >= key {
                high = mid;
            } else {
                low = mid + 1;
            }
        }
        low
    }

    /// Returns the child page a key routes to.
    pub fn find_child(&self, key: u32) -> Result<PageNum> {
        self.child(self.find_child_index(key))
    }

    /// Returns the index of `child` among this node's children.
    pub fn child_index_of(&self, child: PageNum) -> Option<u32> {
        (0..=self.num_keys()).find(|&i| self.child(i).ok() == Some(child))
    }

    /// Returns all children in order, right child last.
    pub fn children(&self) -> Result<Vec<PageNum>> {
        (0..=self.num_keys()).map(|i| self.child(i)).collect()
    }

    /// Returns all keys in order.
    pub fn keys(&self) -> Result<Vec<u32>> {
        (0..self.num_keys()).map(|i| self.key(i)).collect()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> InternalNode<B> {
    /// Formats the page as an empty, non-root internal node.
    pub fn init(page_num: PageNum, mut data: B) -> Result<Self> {
        let bytes = data.as_mut();
        if bytes.len() != PAGE_SIZE {
            return Err(corrupt(page_num, "page buffer has the wrong size"));
        }
        bytes[..NodeHeader::SIZE]
            .copy_from_slice(&NodeHeader::new(NodeType::Internal).to_bytes());
        write_u32(bytes, INTERNAL_NUM_KEYS_OFFSET, 0);
        write_u32(bytes, INTERNAL_RIGHT_CHILD_OFFSET, 0);
        Ok(Self { page_num, data })
    }

    /// Sets the rightmost child pointer.
    pub fn set_right_child(&mut self, child: PageNum) {
        write_u32(self.bytes_mut(), INTERNAL_RIGHT_CHILD_OFFSET, child);
    }

    /// Sets the key of cell `index`.
    pub fn set_key(&mut self, index: u32, key: u32) -> Result<()> {
        let count = self.num_keys();
        if index >= count {
            return Err(QuillError::CellOutOfBounds { index, count });
        }
        let offset = Self::cell_offset(index)? + INTERNAL_CHILD_SIZE;
        write_u32(self.bytes_mut(), offset, key);
        Ok(())
    }

    /// Replaces the node body with `children` and `keys`.
    ///
    /// `children` holds one more entry than `keys`; the last child becomes
    /// the right child. Unused cells are zeroed.
    pub fn write_entries(&mut self, children: &[PageNum], keys: &[u32]) -> Result<()> {
        if children.len() != keys.len() + 1 {
            return Err(corrupt(
                self.page_num,
                format!("{} children for {} keys", children.len(), keys.len()),
            ));
        }
        if keys.len() > INTERNAL_MAX_KEYS as usize {
            return Err(QuillError::CellOutOfBounds {
                index: keys.len() as u32,
                count: INTERNAL_MAX_KEYS,
            });
        }

        let data = self.bytes_mut();
        let mut offset = INTERNAL_HEADER_SIZE;
        for (child, key) in children.iter().zip(keys) {
            write_u32(data, offset, *child);
            write_u32(data, offset + INTERNAL_CHILD_SIZE, *key);
            offset += INTERNAL_CELL_SIZE;
        }
        data[offset..].fill(0);

        write_u32(data, INTERNAL_NUM_KEYS_OFFSET, keys.len() as u32);
        write_u32(data, INTERNAL_RIGHT_CHILD_OFFSET, children[keys.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_page() -> Box<[u8; PAGE_SIZE]> {
        Box::new([0u8; PAGE_SIZE])
    }

    fn row(id: u32) -> Row {
        Row::new(id, format!("user{}", id), format!("person{}@example.com", id)).unwrap()
    }

    #[test]
    fn test_leaf_init() {
        let mut page = blank_page();
        page[0] = 0xFF;
        page[6] = 0xFF;
        let leaf = LeafNode::init(3, &mut page[..]).unwrap();

        assert_eq!(leaf.page_num(), 3);
        assert_eq!(leaf.num_cells(), 0);
        assert!(!leaf.is_root());
        assert_eq!(leaf.parent(), 0);
        assert_eq!(page[0], NodeType::Leaf as u8);
    }

    #[test]
    fn test_leaf_from_page_rejects_wrong_type() {
        let mut page = blank_page();
        InternalNode::init(0, &mut page[..]).unwrap();
        let err = LeafNode::from_page(0, &page[..]).err().unwrap();
        assert!(matches!(err, QuillError::CorruptNode { page_num: 0, .. }));
    }

    #[test]
    fn test_from_page_rejects_unknown_type() {
        let mut page = blank_page();
        page[0] = 9;
        assert!(Node::from_page(4, &page[..]).is_err());
    }

    #[test]
    fn test_from_page_rejects_short_buffer() {
        let page = [1u8; 64];
        assert!(LeafNode::from_page(0, &page[..]).is_err());
    }

    #[test]
    fn test_leaf_insert_keeps_order() {
        let mut page = blank_page();
        let mut leaf = LeafNode::init(0, &mut page[..]).unwrap();

        for key in [30, 10, 20] {
            let idx = leaf.search(key).unwrap_err();
            leaf.insert(idx, key, &row(key)).unwrap();
        }

        assert_eq!(leaf.num_cells(), 3);
        assert_eq!(leaf.key(0).unwrap(), 10);
        assert_eq!(leaf.key(1).unwrap(), 20);
        assert_eq!(leaf.key(2).unwrap(), 30);
        assert_eq!(leaf.row(1).unwrap(), row(20));
        assert_eq!(leaf.max_key(), Some(30));
    }

    #[test]
    fn test_leaf_cell_byte_layout() {
        let mut page = blank_page();
        let mut leaf = LeafNode::init(0, &mut page[..]).unwrap();
        leaf.insert(0, 5, &row(5)).unwrap();
        leaf.insert(1, 6, &row(6)).unwrap();

        assert_eq!(&page[6..10], &2u32.to_le_bytes());
        assert_eq!(&page[10..14], &5u32.to_le_bytes());
        assert_eq!(&page[14..14 + ROW_SIZE], &row(5).to_bytes()[..]);
        assert_eq!(&page[10 + 295..14 + 295], &6u32.to_le_bytes());
    }

    #[test]
    fn test_leaf_search() {
        let mut page = blank_page();
        let mut leaf = LeafNode::init(0, &mut page[..]).unwrap();
        assert_eq!(leaf.search(5), Err(0));

        for (i, key) in [2, 4, 6].into_iter().enumerate() {
            leaf.insert(i as u32, key, &row(key)).unwrap();
        }

        assert_eq!(leaf.search(2), Ok(0));
        assert_eq!(leaf.search(6), Ok(2));
        assert_eq!(leaf.search(1), Err(0));
        assert_eq!(leaf.search(5), Err(2));
        assert_eq!(leaf.search(7), Err(3));
    }

    #[test]
    fn test_leaf_bounds_checks() {
        let mut page = blank_page();
        let mut leaf = LeafNode::init(0, &mut page[..]).unwrap();
        leaf.insert(0, 1, &row(1)).unwrap();

        assert!(matches!(
            leaf.key(1),
            Err(QuillError::CellOutOfBounds { index: 1, count: 1 })
        ));
        assert!(leaf.row(5).is_err());
        // Inserting past the end leaves a gap, which is rejected.
        assert!(leaf.insert(3, 9, &row(9)).is_err());
        assert_eq!(leaf.max_key(), Some(1));
    }

    #[test]
    fn test_leaf_insert_when_full() {
        let mut page = blank_page();
        let mut leaf = LeafNode::init(0, &mut page[..]).unwrap();
        for key in 0..LEAF_MAX_CELLS {
            leaf.insert(key, key, &row(key)).unwrap();
        }
        assert!(leaf.is_full());
        assert!(leaf.insert(0, 100, &row(100)).is_err());
        assert_eq!(leaf.num_cells(), LEAF_MAX_CELLS);
    }

    #[test]
    fn test_leaf_write_cells_zeroes_tail() {
        let mut page = blank_page();
        let mut leaf = LeafNode::init(0, &mut page[..]).unwrap();
        for key in 0..5 {
            leaf.insert(key, key, &row(key)).unwrap();
        }

        let cells = [leaf_cell(8, &row(8)), leaf_cell(9, &row(9))];
        leaf.write_cells(&cells).unwrap();

        assert_eq!(leaf.num_cells(), 2);
        assert_eq!(leaf.key(0).unwrap(), 8);
        assert_eq!(leaf.row(1).unwrap(), row(9));
        assert!(page[LEAF_HEADER_SIZE + 2 * LEAF_CELL_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_header_fields() {
        let mut page = blank_page();
        let mut leaf = LeafNode::init(0, &mut page[..]).unwrap();
        leaf.set_root(true);
        leaf.set_parent(12);
        assert!(leaf.is_root());
        assert_eq!(leaf.parent(), 12);

        leaf.set_root(false);
        assert!(!leaf.is_root());
        assert_eq!(leaf.parent(), 12);
        assert_eq!(page[0], NodeType::Leaf as u8);
    }

    #[test]
    fn test_internal_init_and_entries() {
        let mut page = blank_page();
        let mut node = InternalNode::init(1, &mut page[..]).unwrap();
        node.write_entries(&[10, 11, 12], &[5, 9]).unwrap();

        assert_eq!(node.num_keys(), 2);
        assert_eq!(node.right_child(), 12);
        assert_eq!(node.child(0).unwrap(), 10);
        assert_eq!(node.child(1).unwrap(), 11);
        assert_eq!(node.child(2).unwrap(), 12);
        assert!(node.child(3).is_err());
        assert_eq!(node.key(1).unwrap(), 9);
        assert!(node.key(2).is_err());
        assert_eq!(node.children().unwrap(), vec![10, 11, 12]);
        assert_eq!(node.keys().unwrap(), vec![5, 9]);
    }

    #[test]
    fn test_internal_byte_layout() {
        let mut page = blank_page();
        let mut node = InternalNode::init(1, &mut page[..]).unwrap();
        node.write_entries(&[3, 4], &[77]).unwrap();

        assert_eq!(page[0], NodeType::Internal as u8);
        assert_eq!(&page[6..10], &1u32.to_le_bytes());
        assert_eq!(&page[10..14], &4u32.to_le_bytes());
        assert_eq!(&page[14..18], &3u32.to_le_bytes());
        assert_eq!(&page[18..22], &77u32.to_le_bytes());
    }

    #[test]
    fn test_internal_find_child() {
        let mut page = blank_page();
        let mut node = InternalNode::init(1, &mut page[..]).unwrap();
        node.write_entries(&[10, 11, 12], &[5, 9]).unwrap();

        assert_eq!(node.find_child(0).unwrap(), 10);
        assert_eq!(node.find_child(5).unwrap(), 10);
        assert_eq!(node.find_child(6).unwrap(), 11);
        assert_eq!(node.find_child(9).unwrap(), 11);
        assert_eq!(node.find_child(10).unwrap(), 12);
        assert_eq!(node.find_child(u32::MAX).unwrap(), 12);
    }

    #[test]
    fn test_internal_child_index_of() {
        let mut page = blank_page();
        let mut node = InternalNode::init(1, &mut page[..]).unwrap();
        node.write_entries(&[10, 11, 12], &[5, 9]).unwrap();

        assert_eq!(node.child_index_of(10), Some(0));
        assert_eq!(node.child_index_of(12), Some(2));
        assert_eq!(node.child_index_of(99), None);
    }

    #[test]
    fn test_internal_set_key() {
        let mut page = blank_page();
        let mut node = InternalNode::init(1, &mut page[..]).unwrap();
        node.write_entries(&[10, 11], &[5]).unwrap();
        node.set_key(0, 7).unwrap();
        assert_eq!(node.key(0).unwrap(), 7);
        assert!(node.set_key(1, 8).is_err());
    }

    #[test]
    fn test_internal_write_entries_validates_shape() {
        let mut page = blank_page();
        let mut node = InternalNode::init(1, &mut page[..]).unwrap();
        assert!(node.write_entries(&[1, 2], &[1, 2]).is_err());
    }

    #[test]
    fn test_node_dispatch() {
        let mut page = blank_page();
        InternalNode::init(2, &mut page[..]).unwrap();
        let node = Node::from_page(2, &page[..]).unwrap();
        assert_eq!(node.node_type(), NodeType::Internal);
        assert_eq!(node.page_num(), 2);

        let mut page = blank_page();
        LeafNode::init(3, &mut page[..]).unwrap();
        let mut node = Node::from_page(3, &mut page[..]).unwrap();
        assert_eq!(node.node_type(), NodeType::Leaf);
        node.set_parent(9);
        assert_eq!(node.parent(), 9);
    }
}
