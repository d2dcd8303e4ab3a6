//! B+tree node types and page parsing.
//!
//! Every node page starts with a 1-byte tag and a 4-byte entry count:
//!
//! ```text
//! Leaf:     tag=1 | count | { klen u32 | key | head u64 | tail u64 } * count
//! Internal: tag=2 | count | leftmost u64 | { klen u32 | key | right u64 } * count
//! Overflow: tag=3 | count | { vlen u32 | value } * count | ... | next i64 (last 8 bytes)
//! ```
//!
//! Parsing validates the page as it goes: entries must lie inside the page,
//! keys must be at most `MAX_KEY_SIZE` bytes and strictly ascending.

use crate::page::{DATA_OFFSET, END_OF_CHAIN, NEXT_PAGE_OFFSET, PAGE_SIZE, Page, PageId};

/// Maximum key length in bytes.
pub const MAX_KEY_SIZE: usize = 128;

/// Overflow head value meaning "no values".
pub const EMPTY_CHAIN: PageId = u64::MAX;

/// Node type discriminant (the page tag byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    Leaf = 1,
    Internal = 2,
    Overflow = 3,
}

impl TryFrom<u8> for NodeType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Leaf),
            2 => Ok(Self::Internal),
            3 => Ok(Self::Overflow),
            _ => Err(value),
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leaf => write!(f, "leaf"),
            Self::Internal => write!(f, "internal"),
            Self::Overflow => write!(f, "overflow"),
        }
    }
}

impl NodeType {
    /// Read the node type from a page's tag byte.
    pub fn of(page: &Page) -> Result<Self, NodeError> {
        Self::try_from(page.tag()).map_err(NodeError::UnknownNodeType)
    }
}

/// Leaf entry layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeafLayout {
    /// Each entry stores the overflow head and tail page numbers.
    #[default]
    HeadAndTail,
    /// Legacy layout: only the overflow head is stored.
    HeadOnly,
}

/// First and last page of a key's overflow chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowChain {
    pub head: PageId,
    pub tail: PageId,
}

impl OverflowChain {
    /// Whether the chain holds no pages at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head == EMPTY_CHAIN
    }
}

/// A key and its overflow chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafEntry {
    pub key: Vec<u8>,
    pub chain: OverflowChain,
}

/// A parsed leaf node.
#[derive(Debug)]
pub struct LeafNode {
    /// Entries in strictly ascending key order.
    pub entries: Vec<LeafEntry>,
}

impl LeafNode {
    /// Read a leaf node from a page.
    pub fn from_page(page: &Page, layout: LeafLayout) -> Result<Self, NodeError> {
        expect_type(page, NodeType::Leaf)?;

        let count = page.entry_count();
        let mut reader = EntryReader::new(page);
        let mut entries: Vec<LeafEntry> = Vec::with_capacity(capacity_hint(count));

        for _ in 0..count {
            let key = reader.key()?;
            let head = reader.u64()?;
            let tail = match layout {
                LeafLayout::HeadAndTail => reader.u64()?,
                LeafLayout::HeadOnly => head,
            };
            if let Some(prev) = entries.last()
                && prev.key.as_slice() >= key
            {
                return Err(NodeError::KeysOutOfOrder {
                    index: entries.len(),
                });
            }
            entries.push(LeafEntry {
                key: key.to_vec(),
                chain: OverflowChain { head, tail },
            });
        }

        Ok(Self { entries })
    }

    /// Find the entry for an exact key.
    #[must_use]
    pub fn find(&self, key: &[u8]) -> Option<&LeafEntry> {
        self.entries
            .binary_search_by(|e| e.key.as_slice().cmp(key))
            .ok()
            .map(|i| &self.entries[i])
    }
}

/// A parsed internal node.
///
/// `children[i]` holds keys in `[keys[i], keys[i + 1])`; `leftmost` holds
/// keys below `keys[0]`.
#[derive(Debug)]
pub struct InternalNode {
    pub leftmost: PageId,
    /// Separator keys in strictly ascending order.
    pub keys: Vec<Vec<u8>>,
    /// Right child of each separator. `children.len()` == `keys.len()`
    pub children: Vec<PageId>,
}

impl InternalNode {
    /// Read an internal node from a page.
    pub fn from_page(page: &Page) -> Result<Self, NodeError> {
        expect_type(page, NodeType::Internal)?;

        let count = page.entry_count();
        if count == 0 {
            return Err(NodeError::EmptyInternal);
        }

        let mut reader = EntryReader::new(page);
        let leftmost = reader.u64()?;
        let mut keys: Vec<Vec<u8>> = Vec::with_capacity(capacity_hint(count));
        let mut children = Vec::with_capacity(capacity_hint(count));

        for _ in 0..count {
            let key = reader.key()?;
            let right = reader.u64()?;
            if let Some(prev) = keys.last()
                && prev.as_slice() >= key
            {
                return Err(NodeError::KeysOutOfOrder { index: keys.len() });
            }
            keys.push(key.to_vec());
            children.push(right);
        }

        Ok(Self {
            leftmost,
            keys,
            children,
        })
    }

    /// Child to descend into for `key`.
    ///
    /// Walks separators in order: stop at the first separator greater than
    /// `key`, otherwise move to that separator's right child.
    #[must_use]
    pub fn child_for(&self, key: &[u8]) -> PageId {
        let idx = self.keys.partition_point(|k| k.as_slice() <= key);
        if idx == 0 {
            self.leftmost
        } else {
            self.children[idx - 1]
        }
    }
}

/// A parsed overflow page: a run of values plus the continuation pointer.
#[derive(Debug)]
pub struct OverflowPage {
    pub values: Vec<Vec<u8>>,
    /// Next page in the chain, `None` at the end.
    pub next: Option<PageId>,
}

impl OverflowPage {
    /// Read an overflow page.
    pub fn from_page(page: &Page) -> Result<Self, NodeError> {
        expect_type(page, NodeType::Overflow)?;

        let count = page.entry_count();
        let mut reader = EntryReader::with_limit(page, NEXT_PAGE_OFFSET);
        let mut values = Vec::with_capacity(capacity_hint(count));
        for _ in 0..count {
            let len = reader.u32()? as usize;
            values.push(reader.bytes(len)?.to_vec());
        }

        let raw_next = page
            .read_i64(NEXT_PAGE_OFFSET)
            .ok_or(NodeError::EntryOutOfBounds {
                offset: NEXT_PAGE_OFFSET,
            })?;
        let next = match raw_next {
            END_OF_CHAIN => None,
            n => PageId::try_from(n)
                .map(Some)
                .map_err(|_| NodeError::InvalidNextPage(n))?,
        };

        Ok(Self { values, next })
    }
}

/// Errors that can occur when parsing a node page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The tag byte is not a known node type.
    UnknownNodeType(u8),
    /// The page is a valid node of the wrong kind.
    WrongNodeType {
        expected: NodeType,
        actual: NodeType,
    },
    /// An entry extends past the usable end of the page.
    EntryOutOfBounds { offset: usize },
    /// A stored key exceeds `MAX_KEY_SIZE`.
    KeyTooLong { len: usize },
    /// Keys are not strictly ascending at the given entry index.
    KeysOutOfOrder { index: usize },
    /// An internal node with no separators.
    EmptyInternal,
    /// A negative continuation pointer other than the end marker.
    InvalidNextPage(i64),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownNodeType(tag) => write!(f, "unknown node type tag {tag}"),
            Self::WrongNodeType { expected, actual } => {
                write!(f, "expected {expected} node, found {actual} node")
            }
            Self::EntryOutOfBounds { offset } => {
                write!(f, "entry at offset {offset} extends past end of page")
            }
            Self::KeyTooLong { len } => {
                write!(f, "key too long: {len} bytes (max {MAX_KEY_SIZE})")
            }
            Self::KeysOutOfOrder { index } => {
                write!(f, "keys not strictly ascending at entry {index}")
            }
            Self::EmptyInternal => write!(f, "internal node has no entries"),
            Self::InvalidNextPage(n) => write!(f, "invalid continuation page {n}"),
        }
    }
}

impl std::error::Error for NodeError {}

fn expect_type(page: &Page, expected: NodeType) -> Result<(), NodeError> {
    let actual = NodeType::of(page)?;
    if actual == expected {
        Ok(())
    } else {
        Err(NodeError::WrongNodeType { expected, actual })
    }
}

/// Bound preallocation by what could physically fit in a page.
fn capacity_hint(count: u32) -> usize {
    (count as usize).min(PAGE_SIZE / 4)
}

/// Bounds-checked sequential reads over a page's entry area.
struct EntryReader<'a> {
    page: &'a Page,
    offset: usize,
    limit: usize,
}

impl<'a> EntryReader<'a> {
    const fn new(page: &'a Page) -> Self {
        Self::with_limit(page, PAGE_SIZE)
    }

    const fn with_limit(page: &'a Page, limit: usize) -> Self {
        Self {
            page,
            offset: DATA_OFFSET,
            limit,
        }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], NodeError> {
        let start = self.offset;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.limit)
            .ok_or(NodeError::EntryOutOfBounds { offset: start })?;
        let bytes = self
            .page
            .read_bytes(start, len)
            .ok_or(NodeError::EntryOutOfBounds { offset: start })?;
        self.offset = end;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32, NodeError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, NodeError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.bytes(8)?);
        Ok(u64::from_be_bytes(buf))
    }

    fn key(&mut self) -> Result<&'a [u8], NodeError> {
        let len = self.u32()? as usize;
        if len > MAX_KEY_SIZE {
            return Err(NodeError::KeyTooLong { len });
        }
        self.bytes(len)
    }
}
