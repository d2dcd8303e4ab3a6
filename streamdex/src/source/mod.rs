//! Page sources for the index.
//!
//! A `PageSource` hands out immutable 4KB pages by number. The B+tree is
//! written once against this trait and runs unchanged over a local file, a
//! remote object, or a cache wrapped around either.

mod cache;
mod file;
mod remote;

pub use cache::{CacheStats, CachedPageSource};
pub use file::FilePageSource;
pub use remote::RemotePageSource;

use crate::object_store::ObjectStoreError;
use crate::page::{Page, PageId, ROOT_POINTER_SIZE};

/// Errors that can occur while reading index pages.
#[derive(Debug)]
pub enum SourceError {
    /// Local I/O error.
    Io(std::io::Error),
    /// Object store request failed.
    ObjectStore(ObjectStoreError),
    /// The page starts at or past the end of the index object.
    PageOutOfBounds { page_id: PageId, size: u64 },
    /// The index object is too short to hold the root pointer.
    TruncatedRootPointer { len: usize },
    /// The store returned fewer bytes than the object holds for this page.
    ShortRead {
        page_id: PageId,
        expected: usize,
        actual: usize,
    },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ObjectStore(e) => write!(f, "object store error: {e}"),
            Self::PageOutOfBounds { page_id, size } => {
                write!(f, "page {page_id} out of bounds (index size: {size} bytes)")
            }
            Self::TruncatedRootPointer { len } => write!(
                f,
                "root pointer truncated: {len} of {ROOT_POINTER_SIZE} bytes"
            ),
            Self::ShortRead {
                page_id,
                expected,
                actual,
            } => write!(
                f,
                "short read of page {page_id}: got {actual} of {expected} bytes"
            ),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::ObjectStore(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ObjectStoreError> for SourceError {
    fn from(e: ObjectStoreError) -> Self {
        Self::ObjectStore(e)
    }
}

/// Abstraction over where index pages come from.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `read_page` returns exactly `PAGE_SIZE` bytes, zero-padded when the
///   backing object ends inside the page
/// - a page starting at or past the end of the object is `PageOutOfBounds`
/// - `root_page` decodes the 8-byte big-endian slot at offset 0
pub trait PageSource {
    /// Read one page.
    fn read_page(&mut self, page_id: PageId) -> Result<Page, SourceError>;

    /// Read the root page number from the header slot.
    fn root_page(&mut self) -> Result<PageId, SourceError>;
}

impl<S: PageSource + ?Sized> PageSource for Box<S> {
    fn read_page(&mut self, page_id: PageId) -> Result<Page, SourceError> {
        (**self).read_page(page_id)
    }

    fn root_page(&mut self) -> Result<PageId, SourceError> {
        (**self).root_page()
    }
}

impl<S: PageSource + ?Sized> PageSource for &mut S {
    fn read_page(&mut self, page_id: PageId) -> Result<Page, SourceError> {
        (**self).read_page(page_id)
    }

    fn root_page(&mut self) -> Result<PageId, SourceError> {
        (**self).root_page()
    }
}

/// Decode the root slot from the first bytes of the index object.
fn decode_root_pointer(bytes: &[u8]) -> Result<PageId, SourceError> {
    let slot: [u8; ROOT_POINTER_SIZE] = bytes
        .get(..ROOT_POINTER_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or(SourceError::TruncatedRootPointer { len: bytes.len() })?;
    Ok(u64::from_be_bytes(slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_root_pointer() {
        assert_eq!(
            decode_root_pointer(&[0, 0, 0, 0, 0, 0, 0, 3]).expect("root"),
            3
        );
        assert_eq!(
            decode_root_pointer(&[0, 0, 0, 0, 0, 0, 1, 0, 0xff]).expect("root"),
            256
        );
        assert!(matches!(
            decode_root_pointer(&[0, 0, 0]),
            Err(SourceError::TruncatedRootPointer { len: 3 })
        ));
    }
}
