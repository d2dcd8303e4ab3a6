//! Object store backed by a local directory tree.
//!
//! Objects live at `<root>/<bucket>/<key>`. Useful for exercising the remote
//! read paths against files on disk.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::io::PositionedFile;
use crate::object_store::{ObjectStore, ObjectStoreError};

/// Serves `head` and `get_range` from files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
}

impl DirectoryObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `bucket/key` to a path under the root.
    ///
    /// Rejects names that could escape the root (`..`, absolute paths).
    fn resolve(&self, bucket: &str, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let mut path = self.root.clone();
        for part in [bucket, key] {
            let rel = Path::new(part);
            if part.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
                return Err(ObjectStoreError::InvalidName(format!("{bucket}/{key}")));
            }
            path.push(rel);
        }
        Ok(path)
    }

    fn open(&self, bucket: &str, key: &str) -> Result<PositionedFile, ObjectStoreError> {
        let path = self.resolve(bucket, key)?;
        PositionedFile::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => ObjectStoreError::Io(e),
        })
    }
}

impl ObjectStore for DirectoryObjectStore {
    fn head(&self, bucket: &str, key: &str) -> Result<u64, ObjectStoreError> {
        Ok(self.open(bucket, key)?.len())
    }

    fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, ObjectStoreError> {
        if end < start {
            return Err(ObjectStoreError::InvalidRange { start, end });
        }
        let file = self.open(bucket, key)?;
        let size = file.len();
        if start >= size {
            return Err(ObjectStoreError::RangeNotSatisfiable { start, size });
        }

        let wanted = end.min(size - 1) - start + 1;
        let len = usize::try_from(wanted)
            .map_err(|_| ObjectStoreError::InvalidRange { start, end })?;
        let mut buf = vec![0u8; len];
        let n = file.read_at_most(start, &mut buf)?;
        buf.truncate(n);
        tracing::trace!(
            bucket,
            key,
            start,
            end,
            bytes = n,
            "Served range from directory"
        );
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_directory_store_head_and_range() {
        let dir = tempdir().expect("create temp dir");
        fs::create_dir_all(dir.path().join("bucket/nested")).expect("mkdir");
        fs::write(dir.path().join("bucket/nested/obj"), b"hello world").expect("write");

        let store = DirectoryObjectStore::new(dir.path());
        assert_eq!(store.head("bucket", "nested/obj").expect("head"), 11);
        assert_eq!(
            store.get_range("bucket", "nested/obj", 6, 10).expect("range"),
            b"world"
        );
        // Past the end yields a short body
        assert_eq!(
            store.get_range("bucket", "nested/obj", 9, 4096).expect("short"),
            b"ld"
        );
        assert!(matches!(
            store.get_range("bucket", "nested/obj", 11, 20),
            Err(ObjectStoreError::RangeNotSatisfiable {
                start: 11,
                size: 11,
            })
        ));
    }

    #[test]
    fn test_directory_store_missing_object() {
        let dir = tempdir().expect("create temp dir");
        let store = DirectoryObjectStore::new(dir.path());
        assert!(matches!(
            store.head("bucket", "absent"),
            Err(ObjectStoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_directory_store_rejects_escaping_names() {
        let dir = tempdir().expect("create temp dir");
        let store = DirectoryObjectStore::new(dir.path());
        for (bucket, key) in [("..", "x"), ("b", "../x"), ("b", "/etc/passwd"), ("", "x")] {
            assert!(matches!(
                store.head(bucket, key),
                Err(ObjectStoreError::InvalidName(_))
            ));
        }
    }
}
