//! B+Tree search and insert over pager-backed nodes.
//!
//! The root always lives at page 0. When the root splits, its contents move
//! to a freshly allocated page and page 0 is rewritten as the new internal
//! root, so the root page number never changes.
//!
//! Every internal key equals the largest key reachable through its child.
//! Routing sends a key to the first child whose key is `>= key`, or to the
//! right child when there is none.

use super::constants::{LEAF_LEFT_SPLIT_COUNT, MAX_HEIGHT};
use super::node::{leaf_cell, InternalNode, LeafNode, Node, NodePage, NodePageMut};
use crate::pager::Pager;
use crate::row::Row;
use quill_common::page::PageNum;
use quill_common::{QuillError, Result};
use tracing::{debug, trace};

/// Page number of the tree root.
pub const ROOT_PAGE_NUM: PageNum = 0;

pub(crate) fn corrupt(page_num: PageNum, reason: impl Into<String>) -> QuillError {
    QuillError::CorruptNode {
        page_num,
        reason: reason.into(),
    }
}

fn too_deep(page_num: PageNum) -> QuillError {
    corrupt(
        page_num,
        format!("tree exceeds maximum height {}", MAX_HEIGHT),
    )
}

/// Sets the parent pointer of any node.
fn set_parent(pager: &mut Pager, page_num: PageNum, parent: PageNum) -> Result<()> {
    Node::from_page(page_num, pager.get_page_mut(page_num)?)?.set_parent(parent);
    Ok(())
}

/// Points every child of an internal node back at it. Leaves are ignored.
fn reparent_children(pager: &mut Pager, page_num: PageNum) -> Result<()> {
    let children = match Node::from_page(page_num, pager.get_page(page_num)?)? {
        Node::Leaf(_) => return Ok(()),
        Node::Internal(node) => node.children()?,
    };
    for child in children {
        set_parent(pager, child, page_num)?;
    }
    Ok(())
}

/// Handle to the tree rooted at page 0.
///
/// Holds no page data itself. Every operation goes through the pager, so the
/// tree and the pager are borrowed separately.
#[derive(Debug, Clone, Copy)]
pub struct BTree {
    root: PageNum,
    internal_max_keys: u32,
}

impl BTree {
    /// Creates a tree handle that splits internal nodes above `internal_max_keys`.
    pub fn new(internal_max_keys: u32) -> Self {
        Self {
            root: ROOT_PAGE_NUM,
            internal_max_keys,
        }
    }

    /// Returns the root page number.
    #[inline]
    pub fn root(&self) -> PageNum {
        self.root
    }

    /// Returns the internal node key cap.
    #[inline]
    pub fn internal_max_keys(&self) -> u32 {
        self.internal_max_keys
    }

    /// Formats the root page as an empty root leaf.
    pub fn init_root(&self, pager: &mut Pager) -> Result<()> {
        let mut root = LeafNode::init(self.root, pager.get_page_mut(self.root)?)?;
        root.set_root(true);
        debug!(root = self.root, "initialized empty root leaf");
        Ok(())
    }

    /// Checks that the root page decodes as a node flagged as root.
    pub fn check_root(&self, pager: &mut Pager) -> Result<()> {
        let node = Node::from_page(self.root, pager.get_page(self.root)?)?;
        if !node.is_root() {
            return Err(corrupt(self.root, "root page is not flagged as root"));
        }
        Ok(())
    }

    /// Walks from the root to the leaf a key routes to.
    ///
    /// Returns the internal pages visited (root first) and the leaf page.
    fn descend(&self, pager: &mut Pager, key: u32) -> Result<(Vec<PageNum>, PageNum)> {
        let mut ancestors = Vec::new();
        let mut current = self.root;

        loop {
            if ancestors.len() >= MAX_HEIGHT {
                return Err(too_deep(current));
            }
            match Node::from_page(current, pager.get_page(current)?)? {
                Node::Leaf(_) => return Ok((ancestors, current)),
                Node::Internal(node) => {
                    ancestors.push(current);
                    current = node.find_child(key)?;
                }
            }
        }
    }

    /// Finds the position of `key`: the leaf page and the cell index where
    /// the key is, or where it would be inserted.
    ///
    /// A cell index equal to the leaf's cell count means past the end.
    pub fn search(&self, pager: &mut Pager, key: u32) -> Result<(PageNum, u32)> {
        let (_, leaf_page) = self.descend(pager, key)?;
        let leaf = LeafNode::from_page(leaf_page, pager.get_page(leaf_page)?)?;
        let cell = match leaf.search(key) {
            Ok(index) | Err(index) => index,
        };
        Ok((leaf_page, cell))
    }

    /// Returns the largest key in the subtree rooted at `page_num`.
    pub fn max_key(&self, pager: &mut Pager, page_num: PageNum) -> Result<u32> {
        let mut current = page_num;
        for _ in 0..MAX_HEIGHT {
            match Node::from_page(current, pager.get_page(current)?)? {
                Node::Leaf(leaf) => {
                    return leaf
                        .max_key()
                        .ok_or_else(|| corrupt(current, "empty leaf has no max key"));
                }
                Node::Internal(node) => current = node.right_child(),
            }
        }
        Err(too_deep(page_num))
    }

    /// Returns the leftmost leaf of the subtree rooted at `page_num`.
    pub fn leftmost_leaf(&self, pager: &mut Pager, page_num: PageNum) -> Result<PageNum> {
        let mut current = page_num;
        for _ in 0..MAX_HEIGHT {
            match Node::from_page(current, pager.get_page(current)?)? {
                Node::Leaf(_) => return Ok(current),
                Node::Internal(node) => current = node.child(0)?,
            }
        }
        Err(too_deep(page_num))
    }

    /// Returns the leaf after `leaf_page` in key order, or None for the last leaf.
    ///
    /// Climbs parent pointers until the current node is not its parent's
    /// right child, then descends the leftmost path of the next sibling.
    pub fn next_leaf(&self, pager: &mut Pager, leaf_page: PageNum) -> Result<Option<PageNum>> {
        let mut current = leaf_page;
        for _ in 0..MAX_HEIGHT {
            let (is_root, parent) = {
                let node = Node::from_page(current, pager.get_page(current)?)?;
                (node.is_root(), node.parent())
            };
            if is_root {
                return Ok(None);
            }

            let sibling = {
                let node = InternalNode::from_page(parent, pager.get_page(parent)?)?;
                let index = node.child_index_of(current).ok_or_else(|| {
                    corrupt(parent, format!("page {} is not a child of its parent", current))
                })?;
                if index < node.num_keys() {
                    Some(node.child(index + 1)?)
                } else {
                    None
                }
            };

            match sibling {
                Some(sibling) => return self.leftmost_leaf(pager, sibling).map(Some),
                None => current = parent,
            }
        }
        Err(too_deep(leaf_page))
    }

    /// Returns the number of levels, counting the leaf level.
    pub fn depth(&self, pager: &mut Pager) -> Result<usize> {
        let mut current = self.root;
        for depth in 1..=MAX_HEIGHT {
            match Node::from_page(current, pager.get_page(current)?)? {
                Node::Leaf(_) => return Ok(depth),
                Node::Internal(node) => current = node.child(0)?,
            }
        }
        Err(too_deep(self.root))
    }

    /// Inserts `(key, row)`, splitting nodes as needed.
    ///
    /// Fails with `DuplicateKey` if the key exists and with `TableFull` if the
    /// split would need more pages than the table allows. Both failures leave
    /// the tree unchanged.
    pub fn insert(&self, pager: &mut Pager, key: u32, row: &Row) -> Result<()> {
        let (ancestors, leaf_page) = self.descend(pager, key)?;

        let (index, is_full) = {
            let leaf = LeafNode::from_page(leaf_page, pager.get_page(leaf_page)?)?;
            match leaf.search(key) {
                Ok(_) => return Err(QuillError::DuplicateKey { key }),
                Err(index) => (index, leaf.is_full()),
            }
        };

        if !is_full {
            LeafNode::from_page(leaf_page, pager.get_page_mut(leaf_page)?)?
                .insert(index, key, row)?;
            trace!(key, leaf_page, index, "inserted into leaf");
            return Ok(());
        }

        let needed = self.pages_needed_for_split(pager, &ancestors)?;
        pager.ensure_capacity(needed)?;

        self.split_leaf_and_insert(pager, &ancestors, leaf_page, index, key, row)
    }

    /// Counts the pages a split of a full leaf under `ancestors` allocates.
    ///
    /// One for the new leaf, one per full ancestor that splits in turn, and
    /// one more if the split reaches the root.
    fn pages_needed_for_split(&self, pager: &mut Pager, ancestors: &[PageNum]) -> Result<u32> {
        let mut needed = 1;
        for &page_num in ancestors.iter().rev() {
            let node = InternalNode::from_page(page_num, pager.get_page(page_num)?)?;
            if node.num_keys() < self.internal_max_keys {
                return Ok(needed);
            }
            needed += 1;
        }
        Ok(needed + 1)
    }

    /// Splits a full leaf around the new cell and links the new right leaf
    /// into the tree.
    fn split_leaf_and_insert(
        &self,
        pager: &mut Pager,
        ancestors: &[PageNum],
        leaf_page: PageNum,
        index: u32,
        key: u32,
        row: &Row,
    ) -> Result<()> {
        let (parent, was_root, mut cells) = {
            let leaf = LeafNode::from_page(leaf_page, pager.get_page(leaf_page)?)?;
            let cells = (0..leaf.num_cells())
                .map(|i| leaf.cell_bytes(i).map(<[u8]>::to_vec))
                .collect::<Result<Vec<_>>>()?;
            (leaf.parent(), leaf.is_root(), cells)
        };
        cells.insert(index as usize, leaf_cell(key, row).to_vec());

        let split = LEAF_LEFT_SPLIT_COUNT as usize;
        let right_page = pager.allocate_page()?;
        {
            let mut right = LeafNode::init(right_page, pager.get_page_mut(right_page)?)?;
            right.set_parent(parent);
            right.write_cells(&cells[split..])?;
        }
        LeafNode::from_page(leaf_page, pager.get_page_mut(leaf_page)?)?
            .write_cells(&cells[..split])?;

        debug!(leaf_page, right_page, key, "split leaf");

        if was_root {
            self.create_new_root(pager, right_page)
        } else {
            self.insert_into_parent(pager, ancestors, leaf_page, right_page)
        }
    }

    /// Registers `right`, the new sibling of `left`, with their parent,
    /// splitting internal nodes upward while they overflow.
    fn insert_into_parent(
        &self,
        pager: &mut Pager,
        ancestors: &[PageNum],
        left: PageNum,
        right: PageNum,
    ) -> Result<()> {
        let mut ancestors = ancestors;
        let mut left = left;
        let mut right = right;

        loop {
            let Some((&parent_page, rest)) = ancestors.split_last() else {
                return Err(corrupt(left, "split node has no parent"));
            };

            let left_max = self.max_key(pager, left)?;
            let right_max = self.max_key(pager, right)?;

            let (mut children, mut keys, is_root, grandparent) = {
                let node = InternalNode::from_page(parent_page, pager.get_page(parent_page)?)?;
                (node.children()?, node.keys()?, node.is_root(), node.parent())
            };

            let pos = children.iter().position(|&c| c == left).ok_or_else(|| {
                corrupt(parent_page, format!("page {} is not a child of its parent", left))
            })?;
            if pos == keys.len() {
                // Left was the right child; the new page takes its place.
                keys.push(left_max);
                children.push(right);
            } else {
                keys[pos] = left_max;
                keys.insert(pos + 1, right_max);
                children.insert(pos + 1, right);
            }

            if keys.len() as u32 <= self.internal_max_keys {
                InternalNode::from_page(parent_page, pager.get_page_mut(parent_page)?)?
                    .write_entries(&children, &keys)?;
                set_parent(pager, right, parent_page)?;
                trace!(parent_page, left, right, "linked split into parent");
                return Ok(());
            }

            // Split: the left half keeps children[..=mid], keys[mid] is dropped
            // since it equals the left half's new max key.
            let mid = keys.len() / 2;
            let right_children = children.split_off(mid + 1);
            let right_keys = keys.split_off(mid + 1);
            keys.truncate(mid);

            let new_page = pager.allocate_page()?;
            InternalNode::from_page(parent_page, pager.get_page_mut(parent_page)?)?
                .write_entries(&children, &keys)?;
            {
                let mut node = InternalNode::init(new_page, pager.get_page_mut(new_page)?)?;
                node.set_parent(grandparent);
                node.write_entries(&right_children, &right_keys)?;
            }

            if children.contains(&right) {
                set_parent(pager, right, parent_page)?;
            }
            for &child in &right_children {
                set_parent(pager, child, new_page)?;
            }

            debug!(parent_page, new_page, "split internal node");

            if is_root {
                return self.create_new_root(pager, new_page);
            }

            ancestors = rest;
            left = parent_page;
            right = new_page;
        }
    }

    /// Grows the tree by one level after the root split into itself and
    /// `right_page`.
    ///
    /// The root's current contents move to a new left page, and the root page
    /// is rewritten as an internal node over the two halves.
    fn create_new_root(&self, pager: &mut Pager, right_page: PageNum) -> Result<()> {
        let root = self.root;
        let left_page = pager.allocate_page()?;

        let root_copy = *pager.get_page(root)?;
        {
            let left = pager.get_page_mut(left_page)?;
            *left = root_copy;
            let mut node = Node::from_page(left_page, left)?;
            node.set_root(false);
            node.set_parent(root);
        }
        reparent_children(pager, left_page)?;

        let left_max = self.max_key(pager, left_page)?;
        {
            let mut node = InternalNode::init(root, pager.get_page_mut(root)?)?;
            node.set_root(true);
            node.write_entries(&[left_page, right_page], &[left_max])?;
        }
        set_parent(pager, right_page, root)?;

        debug!(left_page, right_page, left_max, "created new root");
        Ok(())
    }
}
