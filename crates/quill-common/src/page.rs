//! Page structures for QuillDB storage.

use serde::{Deserialize, Serialize};

/// Page size in bytes (4 KB, the OS virtual memory page size).
pub const PAGE_SIZE: usize = 4096;

/// Zero-based page number within the database file.
pub type PageNum = u32;

/// Node types stored in the first byte of every tree page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    /// Internal node holding child pointers.
    Internal = 0,
    /// Leaf node holding rows.
    Leaf = 1,
}

impl NodeType {
    /// Decodes a node type byte. Returns None for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(NodeType::Internal),
            1 => Some(NodeType::Leaf),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeType::Internal => write!(f, "internal"),
            NodeType::Leaf => write!(f, "leaf"),
        }
    }
}

/// Header shared by leaf and internal nodes.
///
/// Layout (6 bytes):
/// - node_type: 1 byte
/// - is_root: 1 byte
/// - parent_page: 4 bytes
///
/// The fields never share bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHeader {
    /// Type of this node.
    pub node_type: NodeType,
    /// Whether this node is the root of the tree.
    pub is_root: bool,
    /// Page number of the parent node (meaningless for the root).
    pub parent_page: PageNum,
}

impl NodeHeader {
    /// Size of the node header in bytes.
    pub const SIZE: usize = 6;

    /// Offset of the node type byte.
    pub const NODE_TYPE_OFFSET: usize = 0;
    /// Offset of the root flag byte.
    pub const IS_ROOT_OFFSET: usize = 1;
    /// Offset of the parent pointer.
    pub const PARENT_OFFSET: usize = 2;

    /// Creates a non-root header with no parent.
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            is_root: false,
            parent_page: 0,
        }
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[Self::NODE_TYPE_OFFSET] = self.node_type as u8;
        buf[Self::IS_ROOT_OFFSET] = self.is_root as u8;
        buf[Self::PARENT_OFFSET..Self::SIZE].copy_from_slice(&self.parent_page.to_le_bytes());
        buf
    }

    /// Deserializes the header from bytes.
    ///
    /// Returns None if the buffer is too short or the node type is unknown.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let node_type = NodeType::from_u8(buf[Self::NODE_TYPE_OFFSET])?;
        let is_root = buf[Self::IS_ROOT_OFFSET] != 0;
        let parent_page = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);

        Some(Self {
            node_type,
            is_root,
            parent_page,
        })
    }
}
