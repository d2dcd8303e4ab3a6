//! Read-only B+tree lookups over a `PageSource`.
//!
//! Descent is a bounded loop over page numbers: read a page, parse it, pick a
//! child, repeat until a leaf. The values for a key live in a chain of
//! overflow pages that `Values` walks one page at a time.

use std::collections::HashSet;
use std::iter::FusedIterator;

use crate::btree::node::{
    InternalNode, LeafLayout, LeafNode, MAX_KEY_SIZE, NodeError, NodeType, OverflowChain,
    OverflowPage,
};
use crate::page::PageId;
use crate::source::{PageSource, SourceError};

/// Maximum number of levels walked before the index is declared corrupt.
pub const MAX_TREE_DEPTH: usize = 64;

/// A read-only B+tree over a page source.
#[derive(Debug)]
pub struct BTreeReader<S> {
    source: S,
    root_page: PageId,
    layout: LeafLayout,
}

impl<S: PageSource> BTreeReader<S> {
    /// Open a tree with the standard leaf layout. Reads the root pointer.
    pub fn open(source: S) -> Result<Self, BTreeError> {
        Self::open_with_layout(source, LeafLayout::default())
    }

    /// Open a tree whose leaves use `layout`.
    pub fn open_with_layout(mut source: S, layout: LeafLayout) -> Result<Self, BTreeError> {
        let root_page = source.root_page()?;
        tracing::debug!(root_page, ?layout, "Opened B+tree");
        Ok(Self {
            source,
            root_page,
            layout,
        })
    }

    /// Get the root page ID.
    #[must_use]
    pub const fn root_page(&self) -> PageId {
        self.root_page
    }

    #[must_use]
    pub const fn layout(&self) -> LeafLayout {
        self.layout
    }

    /// Get a reference to the underlying page source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Find the overflow chain stored for `key`, without reading it.
    ///
    /// Returns `None` when the key is absent or its chain is empty.
    pub fn lookup(&mut self, key: &[u8]) -> Result<Option<OverflowChain>, BTreeError> {
        if key.len() > MAX_KEY_SIZE {
            return Err(BTreeError::KeyTooLong {
                len: key.len(),
                max: MAX_KEY_SIZE,
            });
        }

        let (leaf_page_id, leaf) = self.find_leaf(key)?;
        let chain = leaf
            .find(key)
            .map(|entry| entry.chain)
            .filter(|chain| !chain.is_empty());
        tracing::trace!(leaf_page_id, found = chain.is_some(), "Searched leaf");
        Ok(chain)
    }

    /// Look up every value stored for `key`.
    ///
    /// The key is validated and the tree descended eagerly; the overflow chain
    /// is read lazily as the returned iterator advances. An absent key yields
    /// an empty iterator.
    pub fn search(&mut self, key: &[u8]) -> Result<Values<'_, S>, BTreeError> {
        let chain = self.lookup(key)?;
        Ok(Values::new(&mut self.source, chain.map(|c| c.head)))
    }

    fn find_leaf(&mut self, key: &[u8]) -> Result<(PageId, LeafNode), BTreeError> {
        let mut current_page_id = self.root_page;

        for _ in 0..MAX_TREE_DEPTH {
            let page_id = current_page_id;
            let page = self.source.read_page(page_id)?;
            let corrupt = move |source| BTreeError::Corrupt { page_id, source };

            match NodeType::of(&page).map_err(corrupt)? {
                NodeType::Leaf => {
                    let leaf = LeafNode::from_page(&page, self.layout).map_err(corrupt)?;
                    return Ok((page_id, leaf));
                }
                NodeType::Internal => {
                    let node = InternalNode::from_page(&page).map_err(corrupt)?;
                    current_page_id = node.child_for(key);
                }
                NodeType::Overflow => {
                    return Err(corrupt(NodeError::WrongNodeType {
                        expected: NodeType::Internal,
                        actual: NodeType::Overflow,
                    }));
                }
            }
        }

        Err(BTreeError::DepthExceeded {
            max: MAX_TREE_DEPTH,
        })
    }
}

/// Lazy iterator over the values in an overflow chain.
///
/// Each page is fetched when its values are first needed. After an error is
/// yielded the iterator is exhausted.
pub struct Values<'a, S> {
    source: &'a mut S,
    next_page: Option<PageId>,
    buffered: std::vec::IntoIter<Vec<u8>>,
    visited: HashSet<PageId>,
    pages_read: u64,
    failed: bool,
}

impl<'a, S: PageSource> Values<'a, S> {
    fn new(source: &'a mut S, head: Option<PageId>) -> Self {
        Self {
            source,
            next_page: head,
            buffered: Vec::new().into_iter(),
            visited: HashSet::new(),
            pages_read: 0,
            failed: false,
        }
    }

    /// Number of overflow pages read so far.
    #[must_use]
    pub const fn pages_read(&self) -> u64 {
        self.pages_read
    }

    fn load(&mut self, page_id: PageId) -> Result<OverflowPage, BTreeError> {
        if !self.visited.insert(page_id) {
            return Err(BTreeError::ChainCycle { page_id });
        }
        let page = self.source.read_page(page_id)?;
        self.pages_read += 1;
        OverflowPage::from_page(&page).map_err(|source| BTreeError::Corrupt { page_id, source })
    }
}

impl<S: PageSource> Iterator for Values<'_, S> {
    type Item = Result<Vec<u8>, BTreeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.buffered.next() {
                return Some(Ok(value));
            }
            if self.failed {
                return None;
            }
            let page_id = self.next_page.take()?;
            match self.load(page_id) {
                Ok(overflow) => {
                    tracing::trace!(
                        page_id,
                        values = overflow.values.len(),
                        "Read overflow page"
                    );
                    self.buffered = overflow.values.into_iter();
                    self.next_page = overflow.next;
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<S: PageSource> FusedIterator for Values<'_, S> {}

impl<S> std::fmt::Debug for Values<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Values")
            .field("next_page", &self.next_page)
            .field("pages_read", &self.pages_read)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

/// Errors that can occur during B+tree lookups.
#[derive(Debug)]
pub enum BTreeError {
    /// The lookup key is longer than any stored key can be.
    KeyTooLong { len: usize, max: usize },
    /// Page source error.
    Source(SourceError),
    /// A page failed to parse.
    Corrupt { page_id: PageId, source: NodeError },
    /// Descent did not reach a leaf within `max` levels.
    DepthExceeded { max: usize },
    /// An overflow chain revisits a page.
    ChainCycle { page_id: PageId },
    /// An index value is not an 8-byte stream offset.
    InvalidOffsetValue { len: usize },
}

impl std::fmt::Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyTooLong { len, max } => write!(f, "key too long: {len} bytes (max {max})"),
            Self::Source(e) => write!(f, "page source error: {e}"),
            Self::Corrupt { page_id, source } => write!(f, "corrupt page {page_id}: {source}"),
            Self::DepthExceeded { max } => write!(f, "tree deeper than {max} levels"),
            Self::ChainCycle { page_id } => {
                write!(f, "overflow chain revisits page {page_id}")
            }
            Self::InvalidOffsetValue { len } => {
                write!(f, "index value is {len} bytes, expected an 8-byte offset")
            }
        }
    }
}

impl std::error::Error for BTreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(e) => Some(e),
            Self::Corrupt { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<SourceError> for BTreeError {
    fn from(e: SourceError) -> Self {
        Self::Source(e)
    }
}
