//! Ordered iteration over leaf cells.

use super::node::LeafNode;
use super::tree::BTree;
use crate::pager::Pager;
use crate::row::Row;
use quill_common::page::PageNum;
use quill_common::{QuillError, Result};

/// A position in the tree: a leaf page and a cell index within it.
///
/// The cursor borrows the pager mutably, so the table cannot be modified
/// while a cursor is alive.
pub struct Cursor<'a> {
    pager: &'a mut Pager,
    tree: &'a BTree,
    page_num: PageNum,
    cell_num: u32,
    end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Positions a cursor at the smallest key.
    pub fn start(pager: &'a mut Pager, tree: &'a BTree) -> Result<Self> {
        let page_num = tree.leftmost_leaf(pager, tree.root())?;
        let mut cursor = Self {
            pager,
            tree,
            page_num,
            cell_num: 0,
            end_of_table: false,
        };
        cursor.settle()?;
        Ok(cursor)
    }

    /// Positions a cursor at `key`, or where it would be inserted.
    pub fn find(pager: &'a mut Pager, tree: &'a BTree, key: u32) -> Result<Self> {
        let (page_num, cell_num) = tree.search(pager, key)?;
        let mut cursor = Self {
            pager,
            tree,
            page_num,
            cell_num,
            end_of_table: false,
        };
        cursor.settle()?;
        Ok(cursor)
    }

    /// Returns the leaf page the cursor points into.
    #[inline]
    pub fn page_num(&self) -> PageNum {
        self.page_num
    }

    /// Returns the cell index within the leaf.
    #[inline]
    pub fn cell_num(&self) -> u32 {
        self.cell_num
    }

    /// Returns true once the cursor has moved past the last cell.
    #[inline]
    pub fn is_end(&self) -> bool {
        self.end_of_table
    }

    fn leaf_cells(&mut self) -> Result<u32> {
        let leaf = LeafNode::from_page(self.page_num, self.pager.get_page(self.page_num)?)?;
        Ok(leaf.num_cells())
    }

    /// Moves off the end of a leaf onto the next non-empty leaf, or marks
    /// the end of the table.
    fn settle(&mut self) -> Result<()> {
        while self.cell_num >= self.leaf_cells()? {
            match self.tree.next_leaf(self.pager, self.page_num)? {
                Some(next) => {
                    self.page_num = next;
                    self.cell_num = 0;
                }
                None => {
                    self.end_of_table = true;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn check_not_end(&self) -> Result<()> {
        if self.end_of_table {
            return Err(QuillError::CellOutOfBounds {
                index: self.cell_num,
                count: self.cell_num,
            });
        }
        Ok(())
    }

    /// Returns the key under the cursor.
    pub fn key(&mut self) -> Result<u32> {
        self.check_not_end()?;
        let leaf = LeafNode::from_page(self.page_num, self.pager.get_page(self.page_num)?)?;
        leaf.key(self.cell_num)
    }

    /// Returns the row under the cursor.
    pub fn read(&mut self) -> Result<Row> {
        self.check_not_end()?;
        let leaf = LeafNode::from_page(self.page_num, self.pager.get_page(self.page_num)?)?;
        leaf.row(self.cell_num)
    }

    /// Moves to the next cell in key order.
    pub fn advance(&mut self) -> Result<()> {
        if self.end_of_table {
            return Ok(());
        }
        self.cell_num += 1;
        self.settle()
    }
}

impl Iterator for Cursor<'_> {
    type Item = Result<(u32, Row)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end_of_table {
            return None;
        }

        let item = self.key().and_then(|key| Ok((key, self.read()?)));
        let item = item.and_then(|entry| self.advance().map(|_| entry));
        if item.is_err() {
            // Stop after the first error instead of retrying the same cell.
            self.end_of_table = true;
        }
        Some(item)
    }
}
