//! Index pages fetched from an object store with range requests.

use crate::object_store::{ObjectStore, RemoteObject};
use crate::page::{PAGE_SIZE, PAGE_SIZE_U64, Page, PageId, ROOT_POINTER_SIZE, page_offset};
use crate::source::{PageSource, SourceError, decode_root_pointer};

/// Reads index pages from a remote object, one range request per page.
///
/// The object size is fetched once at open. A page that runs past the end of
/// the object comes back as a short body and is zero-padded.
#[derive(Debug)]
pub struct RemotePageSource<C> {
    object: RemoteObject<C>,
    size: u64,
}

impl<C: ObjectStore> RemotePageSource<C> {
    pub fn open(object: RemoteObject<C>) -> Result<Self, SourceError> {
        let size = object.size()?;
        tracing::debug!(
            bucket = object.bucket(),
            key = object.key(),
            size,
            "Opened remote index"
        );
        Ok(Self { object, size })
    }

    /// Size of the index object in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn object(&self) -> &RemoteObject<C> {
        &self.object
    }
}

impl<C: ObjectStore> PageSource for RemotePageSource<C> {
    fn read_page(&mut self, page_id: PageId) -> Result<Page, SourceError> {
        let offset = match page_offset(page_id) {
            Some(offset) if offset < self.size => offset,
            _ => {
                return Err(SourceError::PageOutOfBounds {
                    page_id,
                    size: self.size,
                });
            }
        };

        let body = self.object.read(offset, PAGE_SIZE)?;
        // Only the end of the object may cut a page short
        let available = (self.size - offset).min(PAGE_SIZE_U64);
        if (body.len() as u64) < available {
            return Err(SourceError::ShortRead {
                page_id,
                expected: usize::try_from(available).unwrap_or(PAGE_SIZE),
                actual: body.len(),
            });
        }
        if body.len() < PAGE_SIZE {
            tracing::trace!(page_id, bytes = body.len(), "Zero-padded short remote page");
        }
        Ok(Page::from_prefix(&body))
    }

    fn root_page(&mut self) -> Result<PageId, SourceError> {
        let body = self.object.read(0, ROOT_POINTER_SIZE)?;
        decode_root_pointer(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{FaultConfig, SimulatedObjectStore};

    #[test]
    fn test_remote_source_requests_exact_ranges() {
        let store = SimulatedObjectStore::new(1);
        let mut bytes = vec![0u8; PAGE_SIZE * 2];
        bytes[7] = 1;
        bytes[PAGE_SIZE] = 1;
        store.put("b", "idx", bytes);

        let mut source =
            RemotePageSource::open(RemoteObject::new(&store, "b", "idx")).expect("open");
        assert_eq!(source.size(), 2 * PAGE_SIZE_U64);
        assert_eq!(source.root_page().expect("root"), 1);
        assert_eq!(source.read_page(1).expect("page").tag(), 1);

        let stats = store.stats();
        assert_eq!(stats.heads, 1);
        assert_eq!(stats.ranges, vec![(0, 7), (4096, 8191)]);
    }

    #[test]
    fn test_remote_short_page_is_zero_padded() {
        let store = SimulatedObjectStore::new(1);
        let mut bytes = vec![0u8; PAGE_SIZE + 3];
        bytes[PAGE_SIZE] = 1;
        bytes[PAGE_SIZE + 2] = 0x7F;
        store.put("b", "idx", bytes);

        let mut source =
            RemotePageSource::open(RemoteObject::new(&store, "b", "idx")).expect("open");
        let page = source.read_page(1).expect("page");
        assert_eq!(page.tag(), 1);
        assert_eq!(page.as_bytes()[2], 0x7F);
        assert!(page.as_bytes()[3..].iter().all(|&b| b == 0));

        assert!(matches!(
            source.read_page(2),
            Err(SourceError::PageOutOfBounds { page_id: 2, .. })
        ));
    }

    #[test]
    fn test_remote_short_body_is_an_error() {
        let store = SimulatedObjectStore::with_config(
            5,
            FaultConfig {
                request_error_rate: 0.0,
                short_body_rate: 1.0,
            },
        );
        store.put("b", "idx", vec![1u8; PAGE_SIZE * 2]);
        let mut source =
            RemotePageSource::open(RemoteObject::new(&store, "b", "idx")).expect("open");
        assert!(matches!(
            source.read_page(1),
            Err(SourceError::ShortRead { page_id: 1, expected: PAGE_SIZE, .. })
        ));
    }

    #[test]
    fn test_remote_truncated_root() {
        let store = SimulatedObjectStore::new(1);
        store.put("b", "idx", vec![0u8; 4]);
        let mut source =
            RemotePageSource::open(RemoteObject::new(&store, "b", "idx")).expect("open");
        assert!(matches!(
            source.root_page(),
            Err(SourceError::TruncatedRootPointer { len: 4 })
        ));
    }

    #[test]
    fn test_remote_missing_object_fails_at_open() {
        let store = SimulatedObjectStore::new(1);
        assert!(matches!(
            RemotePageSource::open(RemoteObject::new(&store, "b", "missing")),
            Err(SourceError::ObjectStore(_))
        ));
    }
}
