//! Index pages from a local file.

use std::path::Path;

use crate::io::PositionedFile;
use crate::page::{PAGE_SIZE, Page, PageId, ROOT_POINTER_SIZE, page_offset};
use crate::source::{PageSource, SourceError, decode_root_pointer};

/// Reads index pages from a local file with positioned reads.
#[derive(Debug)]
pub struct FilePageSource {
    file: PositionedFile,
    pages_read: u64,
}

impl FilePageSource {
    /// Open an index file. The size is captured here; the file is immutable.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = PositionedFile::open(path)?;
        tracing::debug!(path = %path.display(), size = file.len(), "Opened index file");
        Ok(Self {
            file,
            pages_read: 0,
        })
    }

    /// Size of the index file in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.file.len()
    }

    /// Number of pages read so far.
    #[must_use]
    pub const fn pages_read(&self) -> u64 {
        self.pages_read
    }
}

impl PageSource for FilePageSource {
    fn read_page(&mut self, page_id: PageId) -> Result<Page, SourceError> {
        let out_of_bounds = SourceError::PageOutOfBounds {
            page_id,
            size: self.file.len(),
        };
        let Some(offset) = page_offset(page_id) else {
            return Err(out_of_bounds);
        };
        if offset >= self.file.len() {
            return Err(out_of_bounds);
        }

        let mut page = Page::new();
        let n = self.file.read_at_most(offset, page.as_bytes_mut())?;
        self.pages_read += 1;
        if n < PAGE_SIZE {
            tracing::trace!(page_id, bytes = n, "Zero-padded short page");
        }
        Ok(page)
    }

    fn root_page(&mut self) -> Result<PageId, SourceError> {
        let mut slot = [0u8; ROOT_POINTER_SIZE];
        let n = self.file.read_at_most(0, &mut slot)?;
        decode_root_pointer(&slot[..n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_file_source_pads_and_bounds() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("short.index");
        let mut bytes = vec![0u8; PAGE_SIZE + 10];
        bytes[7] = 1;
        bytes[PAGE_SIZE] = 1;
        bytes[PAGE_SIZE + 9] = 0xAB;
        fs::write(&path, &bytes).expect("write index");

        let mut source = FilePageSource::open(&path).expect("open");
        assert_eq!(source.size(), (PAGE_SIZE + 10) as u64);
        assert_eq!(source.root_page().expect("root"), 1);

        let page = source.read_page(1).expect("page 1");
        assert_eq!(page.tag(), 1);
        assert_eq!(page.as_bytes()[9], 0xAB);
        assert!(page.as_bytes()[10..].iter().all(|&b| b == 0));
        assert_eq!(source.pages_read(), 1);

        assert!(matches!(
            source.read_page(2),
            Err(SourceError::PageOutOfBounds { page_id: 2, .. })
        ));
    }

    #[test]
    fn test_file_source_truncated_root() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("tiny.index");
        fs::write(&path, [0u8; 5]).expect("write index");

        let mut source = FilePageSource::open(&path).expect("open");
        assert!(matches!(
            source.root_page(),
            Err(SourceError::TruncatedRootPointer { len: 5 })
        ));
    }

    #[test]
    fn test_file_source_missing_file() {
        let dir = tempdir().expect("create temp dir");
        assert!(matches!(
            FilePageSource::open(&dir.path().join("absent")),
            Err(SourceError::Io(_))
        ));
    }
}
