//! Read-only paged B+tree index.
//!
//! # Structure
//!
//! The index object starts with an 8-byte root pointer, followed by 4KB
//! pages of three kinds:
//! - Internal nodes: separator keys and child page pointers
//! - Leaf nodes: keys and the first/last page of their overflow chain
//! - Overflow pages: the values for one key, linked into a chain
//!
//! Keys are arbitrary byte strings of at most 128 bytes, compared as unsigned
//! bytes. Values are opaque; by convention each is an 8-byte big-endian
//! offset into a record stream (see `decode_offset`).
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use streamdex::btree::{BTreeReader, decode_offset};
//! use streamdex::source::FilePageSource;
//!
//! let source = FilePageSource::open(Path::new("prices.index"))?;
//! let mut tree = BTreeReader::open(source)?;
//! for value in tree.search(b"AAPL0")? {
//!     println!("record at {}", decode_offset(&value?)?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod node;
mod tree;

pub use node::{
    EMPTY_CHAIN, InternalNode, LeafEntry, LeafLayout, LeafNode, MAX_KEY_SIZE, NodeError, NodeType,
    OverflowChain, OverflowPage,
};
pub use tree::{BTreeError, BTreeReader, MAX_TREE_DEPTH, Values};

/// Decode an index value as a record-stream offset (8-byte big-endian).
pub fn decode_offset(value: &[u8]) -> Result<u64, BTreeError> {
    let bytes: [u8; 8] = value
        .try_into()
        .map_err(|_| BTreeError::InvalidOffsetValue { len: value.len() })?;
    Ok(u64::from_be_bytes(bytes))
}
