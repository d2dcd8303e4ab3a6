//! Positioned frame access shared by the local and remote readers.
//!
//! Both `StreamReader::read_at` and `RemoteStreamReader::read_at` go through
//! `RangeRead`, so the framing rules live in one place.

use crate::io::PositionedFile;
use crate::object_store::{ObjectStore, ObjectStoreError, RemoteObject};
use crate::stream::{HEADER_OFFSET, MAGIC, PREFIX_SIZE, Record, SEAL_MARKER, StreamError};

/// Random-access reads of a byte range.
pub trait RangeRead {
    /// Read up to `len` bytes at `offset`. Fewer bytes means the data ends
    /// inside the range; an empty result means `offset` is at or past the end.
    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>, StreamError>;
}

impl RangeRead for PositionedFile {
    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>, StreamError> {
        // Never allocate more than the file could return
        let available = self.len().saturating_sub(offset);
        let len = usize::try_from(available).map_or(len, |available| len.min(available));
        let mut buf = vec![0u8; len];
        let n = self.read_at_most(offset, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

impl<C: ObjectStore> RangeRead for RemoteObject<C> {
    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>, StreamError> {
        match self.read(offset, len) {
            Ok(bytes) => Ok(bytes),
            Err(ObjectStoreError::RangeNotSatisfiable { .. }) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read exactly `len` bytes at `offset`.
pub(super) fn read_exact_at<R: RangeRead + ?Sized>(
    source: &R,
    offset: u64,
    len: usize,
) -> Result<Vec<u8>, StreamError> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let bytes = source.read_range(offset, len)?;
    if bytes.len() < len {
        return Err(StreamError::ShortRead {
            offset,
            expected: len,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Read a big-endian `i32` at `offset`.
pub(super) fn read_i32_at<R: RangeRead + ?Sized>(
    source: &R,
    offset: u64,
) -> Result<i32, StreamError> {
    let bytes = read_exact_at(source, offset, PREFIX_SIZE)?;
    Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read and parse the frame whose length prefix starts at `offset`.
pub(super) fn read_frame_at<P: Record, R: RangeRead + ?Sized>(
    source: &R,
    offset: u64,
) -> Result<P, StreamError> {
    let length = read_i32_at(source, offset)?;
    if length == SEAL_MARKER {
        return Err(StreamError::SealAtOffset { offset });
    }
    let len = usize::try_from(length)
        .map_err(|_| StreamError::InvalidFrameLength { offset, length })?;

    let payload = read_exact_at(source, offset + PREFIX_SIZE as u64, len)?;
    P::decode_record(&payload).map_err(|source| StreamError::Payload { offset, source })
}

/// Read the magic, header length and header. Returns the parsed header and
/// the offset of the first frame.
pub(super) fn read_preamble<H: Record, R: RangeRead + ?Sized>(
    source: &R,
) -> Result<(H, u64), StreamError> {
    let magic = read_i32_at(source, 0).map_err(truncated)?;
    if magic != MAGIC {
        return Err(StreamError::InvalidMagic { found: magic });
    }

    let header_len = read_i32_at(source, PREFIX_SIZE as u64).map_err(truncated)?;
    let len = usize::try_from(header_len)
        .map_err(|_| StreamError::InvalidHeaderLength(header_len))?;

    let bytes = read_exact_at(source, HEADER_OFFSET, len).map_err(truncated)?;
    let header = H::decode_record(&bytes).map_err(StreamError::Header)?;
    Ok((header, HEADER_OFFSET + len as u64))
}

/// Report a short preamble read as a truncated stream.
fn truncated(e: StreamError) -> StreamError {
    match e {
        StreamError::ShortRead {
            offset,
            expected,
            actual,
        } => StreamError::Truncated {
            offset,
            expected,
            actual,
        },
        other => other,
    }
}
