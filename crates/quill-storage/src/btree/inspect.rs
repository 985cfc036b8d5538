//! Tree rendering and structural verification.

use super::constants::MAX_HEIGHT;
use super::node::{Node, NodePage};
use super::tree::{corrupt, BTree};
use crate::pager::Pager;
use quill_common::page::PageNum;
use quill_common::Result;
use std::collections::HashSet;

/// Shape summary produced by [`BTree::verify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of levels, counting the leaf level.
    pub depth: usize,
    pub leaf_nodes: usize,
    pub internal_nodes: usize,
    /// Total cells across all leaves.
    pub rows: u64,
}

/// Key range a subtree must fall in: `(lower, upper]`.
#[derive(Clone, Copy)]
struct Bounds {
    lower: Option<u32>,
    upper: Option<u32>,
}

impl Bounds {
    fn contains(&self, key: u32) -> bool {
        self.lower.map_or(true, |lower| key > lower) && self.upper.map_or(true, |upper| key <= upper)
    }
}

struct Verifier {
    root: PageNum,
    visited: HashSet<PageNum>,
    leaf_depth: Option<usize>,
    stats: TreeStats,
}

impl Verifier {
    /// Checks one subtree and returns its largest key, or None if it is an
    /// empty root leaf.
    fn check(
        &mut self,
        pager: &mut Pager,
        page_num: PageNum,
        parent: Option<PageNum>,
        bounds: Bounds,
        level: usize,
    ) -> Result<Option<u32>> {
        if level > MAX_HEIGHT {
            return Err(corrupt(page_num, format!("tree exceeds maximum height {}", MAX_HEIGHT)));
        }
        if !self.visited.insert(page_num) {
            return Err(corrupt(page_num, "page is reachable twice"));
        }

        let node = Node::from_page(page_num, pager.get_page(page_num)?)?;
        let is_root = page_num == self.root;
        if node.is_root() != is_root {
            return Err(corrupt(page_num, format!("root flag is {}", node.is_root())));
        }
        if let Some(parent) = parent {
            if node.parent() != parent {
                return Err(corrupt(
                    page_num,
                    format!("parent pointer is {}, expected {}", node.parent(), parent),
                ));
            }
        }

        match node {
            Node::Leaf(leaf) => {
                match self.leaf_depth {
                    None => self.leaf_depth = Some(level),
                    Some(depth) if depth != level => {
                        return Err(corrupt(
                            page_num,
                            format!("leaf at depth {}, expected {}", level, depth),
                        ));
                    }
                    Some(_) => {}
                }

                let num_cells = leaf.num_cells();
                if num_cells == 0 && !is_root {
                    return Err(corrupt(page_num, "non-root leaf is empty"));
                }

                let mut prev: Option<u32> = None;
                for i in 0..num_cells {
                    let key = leaf.key(i)?;
                    if prev.is_some_and(|p| key <= p) {
                        return Err(corrupt(page_num, format!("key {} out of order", key)));
                    }
                    if !bounds.contains(key) {
                        return Err(corrupt(page_num, format!("key {} outside parent range", key)));
                    }
                    prev = Some(key);
                }

                self.stats.leaf_nodes += 1;
                self.stats.rows += num_cells as u64;
                Ok(prev)
            }
            Node::Internal(internal) => {
                let num_keys = internal.num_keys();
                if num_keys == 0 {
                    return Err(corrupt(page_num, "internal node has no keys"));
                }
                let children = internal.children()?;
                let keys = internal.keys()?;
                if keys.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(corrupt(page_num, "internal keys out of order"));
                }

                self.stats.internal_nodes += 1;

                let mut lower = bounds.lower;
                let mut max = None;
                for (i, &child) in children.iter().enumerate() {
                    let upper = keys.get(i).copied().or(bounds.upper);
                    let child_bounds = Bounds { lower, upper };
                    let child_max =
                        self.check(pager, child, Some(page_num), child_bounds, level + 1)?;

                    if let Some(&key) = keys.get(i) {
                        if child_max != Some(key) {
                            return Err(corrupt(
                                page_num,
                                format!("key {} does not match child {} max {:?}", key, child, child_max),
                            ));
                        }
                        lower = Some(key);
                    }
                    max = child_max;
                }
                Ok(max)
            }
        }
    }
}

impl BTree {
    /// Walks the whole tree checking its structural invariants.
    ///
    /// Checks sorted unique keys, separator keys against subtree maxima,
    /// parent pointers, root flags, and a uniform leaf depth.
    pub fn verify(&self, pager: &mut Pager) -> Result<TreeStats> {
        let mut verifier = Verifier {
            root: self.root(),
            visited: HashSet::new(),
            leaf_depth: None,
            stats: TreeStats::default(),
        };
        let bounds = Bounds {
            lower: None,
            upper: None,
        };
        verifier.check(pager, self.root(), None, bounds, 1)?;
        verifier.stats.depth = verifier.leaf_depth.unwrap_or(1);
        Ok(verifier.stats)
    }

    /// Renders the tree as an indented outline, one node or key per line.
    ///
    /// ```text
    /// - internal (size 1)
    ///   - leaf (size 7)
    ///     - 1
    ///     ...
    ///   - key 7
    ///   - leaf (size 7)
    ///     - 8
    ///     ...
    /// ```
    pub fn render(&self, pager: &mut Pager) -> Result<String> {
        let mut out = String::new();
        render_node(pager, self.root(), 0, &mut out)?;
        Ok(out)
    }
}

fn render_node(pager: &mut Pager, page_num: PageNum, level: usize, out: &mut String) -> Result<()> {
    if level >= MAX_HEIGHT {
        return Err(corrupt(page_num, format!("tree exceeds maximum height {}", MAX_HEIGHT)));
    }
    let pad = "  ".repeat(level);

    let (children, keys) = match Node::from_page(page_num, pager.get_page(page_num)?)? {
        Node::Leaf(leaf) => {
            out.push_str(&format!("{}- leaf (size {})\n", pad, leaf.num_cells()));
            for i in 0..leaf.num_cells() {
                out.push_str(&format!("{}  - {}\n", pad, leaf.key(i)?));
            }
            return Ok(());
        }
        Node::Internal(internal) => {
            out.push_str(&format!("{}- internal (size {})\n", pad, internal.num_keys()));
            (internal.children()?, internal.keys()?)
        }
    };

    for (i, &child) in children.iter().enumerate() {
        render_node(pager, child, level + 1, out)?;
        if let Some(key) = keys.get(i) {
            out.push_str(&format!("{}  - key {}\n", pad, key));
        }
    }
    Ok(())
}
