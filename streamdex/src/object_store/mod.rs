//! Remote object store abstraction.
//!
//! The index and record stream can live in an object store and be queried
//! with byte-range requests instead of being downloaded whole. This module
//! defines the narrow client interface the rest of the crate consumes:
//!
//! - `head`: the size of an object
//! - `get_range`: an inclusive byte range of an object
//!
//! Client construction, credentials and retry policy belong to the
//! implementation, not to this crate.

mod directory;

use std::sync::Arc;

pub use directory::DirectoryObjectStore;

/// Errors returned by object store clients.
#[derive(Debug)]
pub enum ObjectStoreError {
    /// Transport or filesystem failure.
    Io(std::io::Error),
    /// The object does not exist.
    NotFound { bucket: String, key: String },
    /// The range starts at or past the end of the object.
    RangeNotSatisfiable { start: u64, size: u64 },
    /// The range end precedes its start.
    InvalidRange { start: u64, end: u64 },
    /// The bucket or key cannot name an object.
    InvalidName(String),
    /// Injected fault for simulation.
    InjectedFault(String),
}

impl std::fmt::Display for ObjectStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "object store I/O error: {e}"),
            Self::NotFound { bucket, key } => write!(f, "object not found: {bucket}/{key}"),
            Self::RangeNotSatisfiable { start, size } => {
                write!(
                    f,
                    "range starting at {start} not satisfiable (object size {size})"
                )
            }
            Self::InvalidRange { start, end } => write!(f, "invalid range: bytes={start}-{end}"),
            Self::InvalidName(name) => write!(f, "invalid object name: {name}"),
            Self::InjectedFault(msg) => write!(f, "injected fault: {msg}"),
        }
    }
}

impl std::error::Error for ObjectStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ObjectStoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Client interface to a remote object store.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `get_range` treats `end` as inclusive, like an HTTP `Range` header
/// - a range extending past the end of the object returns the available
///   bytes (a short body), not an error
/// - a range starting at or past the end returns `RangeNotSatisfiable`
pub trait ObjectStore {
    /// Size of the object in bytes.
    fn head(&self, bucket: &str, key: &str) -> Result<u64, ObjectStoreError>;

    /// Fetch bytes `start..=end` of the object.
    fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, ObjectStoreError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for &T {
    fn head(&self, bucket: &str, key: &str) -> Result<u64, ObjectStoreError> {
        (**self).head(bucket, key)
    }

    fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, ObjectStoreError> {
        (**self).get_range(bucket, key, start, end)
    }
}

impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn head(&self, bucket: &str, key: &str) -> Result<u64, ObjectStoreError> {
        (**self).head(bucket, key)
    }

    fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, ObjectStoreError> {
        (**self).get_range(bucket, key, start, end)
    }
}

impl<T: ObjectStore + ?Sized> ObjectStore for Box<T> {
    fn head(&self, bucket: &str, key: &str) -> Result<u64, ObjectStoreError> {
        (**self).head(bucket, key)
    }

    fn get_range(
        &self,
        bucket: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, ObjectStoreError> {
        (**self).get_range(bucket, key, start, end)
    }
}

/// One object in a store: the client plus its bucket and key.
#[derive(Debug, Clone)]
pub struct RemoteObject<C> {
    store: C,
    bucket: String,
    key: String,
}

impl<C: ObjectStore> RemoteObject<C> {
    /// Address `bucket/key` through `store`.
    pub fn new(store: C, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse a `bucket/key` path (the key may itself contain slashes).
    pub fn from_path(store: C, path: &str) -> Result<Self, ObjectStoreError> {
        match path.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                Ok(Self::new(store, bucket, key))
            }
            _ => Err(ObjectStoreError::InvalidName(path.to_string())),
        }
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get a reference to the underlying client.
    #[must_use]
    pub const fn store(&self) -> &C {
        &self.store
    }

    /// Size of the object in bytes.
    pub fn size(&self) -> Result<u64, ObjectStoreError> {
        self.store.head(&self.bucket, &self.key)
    }

    /// Fetch `len` bytes starting at `offset`; the body may be short at the
    /// end of the object. A zero-length request returns an empty body without
    /// contacting the store.
    ///
    /// A range whose end is not addressable is `RangeNotSatisfiable`; the
    /// object size is fetched to report it.
    pub fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>, ObjectStoreError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let Some(end) = offset.checked_add(len as u64 - 1) else {
            return Err(ObjectStoreError::RangeNotSatisfiable {
                start: offset,
                size: self.size()?,
            });
        };
        self.store.get_range(&self.bucket, &self.key, offset, end)
    }
}

/// Slice `data` the way an object store answers `bytes=start-end`.
///
/// Shared by the in-process stores so they agree on range semantics.
pub(crate) fn slice_range(data: &[u8], start: u64, end: u64) -> Result<Vec<u8>, ObjectStoreError> {
    if end < start {
        return Err(ObjectStoreError::InvalidRange { start, end });
    }
    let size = data.len() as u64;
    if start >= size {
        return Err(ObjectStoreError::RangeNotSatisfiable { start, size });
    }
    let end_exclusive = end.saturating_add(1).min(size);
    #[allow(clippy::cast_possible_truncation)]
    Ok(data[start as usize..end_exclusive as usize].to_vec())
}
