//! Page buffer and layout constants for the index file.
//!
//! The index is a grid of 4KB pages. All integers are big-endian.
//!
//! ```text
//! offset 0..8            root page number (u64), overlaps page 0
//! page N * 4096..+4096   one node page (leaf, internal or overflow)
//! ```
//!
//! Every node page starts with a 1-byte tag followed by a 4-byte entry count.

/// Page size in bytes (4KB).
pub const PAGE_SIZE: usize = 4096;

/// Page size as u64 for offset calculations.
pub const PAGE_SIZE_U64: u64 = PAGE_SIZE as u64;

/// A page identifier (0-indexed page number).
pub type PageId = u64;

/// Size of the root pointer slot at the start of the index object.
pub const ROOT_POINTER_SIZE: usize = 8;

/// Offset of the 4-byte entry count in every node page.
pub const COUNT_OFFSET: usize = 1;

/// Offset where node data begins (after tag + count).
pub const DATA_OFFSET: usize = 5;

/// Offset of the continuation pointer in overflow pages (last 8 bytes).
pub const NEXT_PAGE_OFFSET: usize = PAGE_SIZE - 8;

/// Continuation value that terminates an overflow chain.
pub const END_OF_CHAIN: i64 = -1;

/// Byte offset of a page within the index object, or `None` if the page
/// number is too large to address.
#[must_use]
pub const fn page_offset(page_id: PageId) -> Option<u64> {
    page_id.checked_mul(PAGE_SIZE_U64)
}

/// A raw page buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// Create a new zeroed page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// Create a page from a possibly short buffer.
    ///
    /// Missing trailing bytes are zero; bytes past `PAGE_SIZE` are ignored.
    #[must_use]
    pub fn from_prefix(bytes: &[u8]) -> Self {
        let mut page = Self::new();
        let len = bytes.len().min(PAGE_SIZE);
        page.data[..len].copy_from_slice(&bytes[..len]);
        page
    }

    /// Get the raw page data.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Get mutable access to the raw page data.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    /// The node tag byte.
    #[must_use]
    pub fn tag(&self) -> u8 {
        self.data[0]
    }

    /// The entry count stored in the node header.
    #[must_use]
    pub fn entry_count(&self) -> u32 {
        self.read_u32(COUNT_OFFSET).unwrap_or(0)
    }

    /// Read `len` bytes at `offset`, or `None` if the range leaves the page.
    #[must_use]
    pub fn read_bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        self.data.get(offset..end)
    }

    /// Read a big-endian u32 at the given offset.
    #[must_use]
    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        let bytes = self.read_bytes(offset, 4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a big-endian u64 at the given offset.
    #[must_use]
    pub fn read_u64(&self, offset: usize) -> Option<u64> {
        let bytes = self.read_bytes(offset, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Some(u64::from_be_bytes(buf))
    }

    /// Read a big-endian i64 at the given offset.
    #[must_use]
    pub fn read_i64(&self, offset: usize) -> Option<i64> {
        let bytes = self.read_bytes(offset, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Some(i64::from_be_bytes(buf))
    }

    /// Write bytes at a specific offset.
    ///
    /// # Panics
    /// Panics if the bytes do not fit inside the page.
    #[cfg(test)]
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Write a u8 at the given offset.
    #[cfg(test)]
    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    /// Write a big-endian u32 at the given offset.
    #[cfg(test)]
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.write_bytes(offset, &value.to_be_bytes());
    }

    /// Write a big-endian u64 at the given offset.
    #[cfg(test)]
    pub fn write_u64(&mut self, offset: usize, value: u64) {
        self.write_bytes(offset, &value.to_be_bytes());
    }

    /// Write a big-endian i64 at the given offset.
    #[cfg(test)]
    pub fn write_i64(&mut self, offset: usize, value: i64) {
        self.write_bytes(offset, &value.to_be_bytes());
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("first_16_bytes", &&self.data[..16])
            .finish_non_exhaustive()
    }
}
