//! Table handle tying a pager to its B+Tree.

use crate::btree::constants::LayoutInfo;
use crate::btree::{BTree, Cursor, LeafNode, TreeStats};
use crate::config::TableConfig;
use crate::pager::Pager;
use crate::row::Row;
use quill_common::Result;
use std::path::Path;
use tracing::debug;

/// An open table file.
///
/// Dropping a table without calling [`Table::close`] still flushes dirty
/// pages, but errors are only logged.
pub struct Table {
    pager: Pager,
    tree: BTree,
}

impl Table {
    /// Opens or creates a table file with the default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, TableConfig::default())
    }

    /// Opens or creates a table file.
    ///
    /// An empty file gets an empty root leaf at page 0.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: TableConfig) -> Result<Self> {
        let mut pager = Pager::open(path, &config)?;
        let tree = BTree::new(config.internal_max_keys);

        if pager.num_pages() == 0 {
            tree.init_root(&mut pager)?;
        } else {
            tree.check_root(&mut pager)?;
        }

        debug!(
            path = %pager.path().display(),
            num_pages = pager.num_pages(),
            "opened table"
        );
        Ok(Self { pager, tree })
    }

    /// Flushes every page and closes the file.
    pub fn close(self) -> Result<()> {
        self.pager.close()
    }

    /// Inserts a row under `key`.
    pub fn insert(&mut self, key: u32, row: &Row) -> Result<()> {
        self.tree.insert(&mut self.pager, key, row)
    }

    /// Inserts a row keyed by its id.
    pub fn insert_row(&mut self, row: &Row) -> Result<()> {
        self.insert(row.id(), row)
    }

    /// Returns a cursor at `key`, or at the first larger key.
    pub fn find(&mut self, key: u32) -> Result<Cursor<'_>> {
        Cursor::find(&mut self.pager, &self.tree, key)
    }

    /// Returns a cursor at the smallest key.
    pub fn start(&mut self) -> Result<Cursor<'_>> {
        Cursor::start(&mut self.pager, &self.tree)
    }

    /// Looks up the row stored under `key`.
    pub fn get(&mut self, key: u32) -> Result<Option<Row>> {
        let (page_num, cell_num) = self.tree.search(&mut self.pager, key)?;
        let leaf = LeafNode::from_page(page_num, self.pager.get_page(page_num)?)?;
        match leaf.key(cell_num) {
            Ok(found) if found == key => leaf.row(cell_num).map(Some),
            _ => Ok(None),
        }
    }

    /// Returns the number of tree levels, counting leaves.
    pub fn depth(&mut self) -> Result<usize> {
        self.tree.depth(&mut self.pager)
    }

    /// Returns the number of pages in use.
    pub fn page_count(&self) -> u32 {
        self.pager.num_pages()
    }

    /// Renders the tree as an indented outline.
    pub fn render_tree(&mut self) -> Result<String> {
        self.tree.render(&mut self.pager)
    }

    /// Checks the tree's structural invariants.
    pub fn verify(&mut self) -> Result<TreeStats> {
        self.tree.verify(&mut self.pager)
    }

    /// Returns the layout constants for this table.
    pub fn layout(&self) -> LayoutInfo {
        LayoutInfo::new(self.pager.max_pages())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_common::QuillError;
    use tempfile::tempdir;

    fn row(id: u32) -> Row {
        Row::new(id, format!("user{}", id), format!("person{}@example.com", id)).unwrap()
    }

    fn test_config() -> TableConfig {
        TableConfig {
            fsync_on_close: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_open_empty_table() {
        let dir = tempdir().unwrap();
        let mut table = Table::open_with_config(dir.path().join("t.db"), test_config()).unwrap();
        assert_eq!(table.page_count(), 1);
        assert_eq!(table.depth().unwrap(), 1);
        assert!(table.start().unwrap().is_end());
        assert_eq!(table.get(1).unwrap(), None);
    }

    #[test]
    fn test_insert_and_get() {
        let dir = tempdir().unwrap();
        let mut table = Table::open_with_config(dir.path().join("t.db"), test_config()).unwrap();
        for key in [4, 2, 8] {
            table.insert_row(&row(key)).unwrap();
        }

        assert_eq!(table.get(2).unwrap(), Some(row(2)));
        assert_eq!(table.get(8).unwrap(), Some(row(8)));
        assert_eq!(table.get(3).unwrap(), None);
        assert_eq!(table.get(100).unwrap(), None);
    }

    #[test]
    fn test_get_across_leaves() {
        let dir = tempdir().unwrap();
        let mut table = Table::open_with_config(dir.path().join("t.db"), test_config()).unwrap();
        for key in 1..=40 {
            table.insert(key, &row(key)).unwrap();
        }
        for key in 1..=40 {
            assert_eq!(table.get(key).unwrap(), Some(row(key)));
        }
        assert_eq!(table.get(41).unwrap(), None);
    }

    #[test]
    fn test_duplicate_key() {
        let dir = tempdir().unwrap();
        let mut table = Table::open_with_config(dir.path().join("t.db"), test_config()).unwrap();
        table.insert(1, &row(1)).unwrap();

        let other = Row::new(1, "other", "other@example.com").unwrap();
        let err = table.insert(1, &other).unwrap_err();
        assert!(matches!(err, QuillError::DuplicateKey { key: 1 }));
        assert!(err.is_recoverable());
        assert_eq!(table.get(1).unwrap(), Some(row(1)));
    }

    #[test]
    fn test_open_rejects_non_root_page_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let mut page = vec![0u8; quill_common::PAGE_SIZE];
        page[0] = 1; // leaf, root flag clear
        std::fs::write(&path, page).unwrap();

        let result = Table::open_with_config(&path, test_config());
        assert!(matches!(result, Err(QuillError::CorruptNode { page_num: 0, .. })));
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let config = TableConfig {
            internal_max_keys: 1,
            ..test_config()
        };
        let result = Table::open_with_config(dir.path().join("t.db"), config);
        assert!(matches!(result, Err(QuillError::ConfigError(_))));
    }

    #[test]
    fn test_layout() {
        let dir = tempdir().unwrap();
        let config = TableConfig {
            max_pages: 250,
            ..test_config()
        };
        let table = Table::open_with_config(dir.path().join("t.db"), config).unwrap();
        let layout = table.layout();
        assert_eq!(layout.max_pages, 250);
        assert_eq!(layout.leaf_max_cells, 13);
    }
}
