//! Length-framed record streams.
//!
//! # File Format
//!
//! ```text
//! +------------+---------------+-----------------+
//! | magic (4)  | header_len (4)| header bytes    |
//! +------------+---------------+-----------------+
//! | frame_len (4) | payload (frame_len bytes)    |  repeated
//! +---------------+------------------------------+
//! | -1 (4)  seal marker, end of stream           |
//! +----------------------------------------------+
//! ```
//!
//! All integers are big-endian `i32`. A frame's offset is the position of its
//! length prefix; that offset is what an index stores to address the record.
//! Bytes after the seal marker are ignored.

mod frame;
mod reader;
mod record;
mod remote;
mod writer;

pub use frame::RangeRead;
pub use reader::{Frames, StreamReader, StreamSummary, summarize};
pub use record::{RawRecord, Record, RecordError};
pub use remote::RemoteStreamReader;
pub use writer::{SealOutcome, StreamWriter, seal_file};

use crate::object_store::ObjectStoreError;

/// Magic number at the start of every stream.
pub const MAGIC: i32 = 0x1973;

/// Frame length value that seals the stream.
pub const SEAL_MARKER: i32 = -1;

/// Size of the magic number and of every length prefix.
pub const PREFIX_SIZE: usize = 4;

/// Offset of the header bytes (after magic and header length).
pub const HEADER_OFFSET: u64 = 8;

/// Errors that can occur while reading or writing a stream.
#[derive(Debug)]
pub enum StreamError {
    /// I/O error.
    Io(std::io::Error),
    /// Object store request failed.
    ObjectStore(ObjectStoreError),
    /// The stream does not start with `MAGIC`.
    InvalidMagic { found: i32 },
    /// The header length is negative.
    InvalidHeaderLength(i32),
    /// The stream ends inside its magic, header length or header.
    Truncated {
        offset: u64,
        expected: usize,
        actual: usize,
    },
    /// The header bytes failed to parse.
    Header(RecordError),
    /// The stream ended before a seal marker.
    MissingSeal { offset: u64 },
    /// A negative frame length other than the seal marker.
    InvalidFrameLength { offset: u64, length: i32 },
    /// A frame payload failed to parse.
    Payload { offset: u64, source: RecordError },
    /// Random access landed on the seal marker.
    SealAtOffset { offset: u64 },
    /// Random access ran past the end of the stream.
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },
    /// The writer has already written its seal marker.
    Sealed,
    /// An earlier write failed; the stream is incomplete.
    Poisoned,
    /// A payload or header does not fit a 4-byte length prefix.
    FrameTooLarge { len: usize },
    /// The final frame of an unsealed stream is incomplete.
    TornFrame { offset: u64 },
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ObjectStore(e) => write!(f, "object store error: {e}"),
            Self::InvalidMagic { found } => {
                write!(f, "invalid magic {found:#x} (expected {MAGIC:#x})")
            }
            Self::InvalidHeaderLength(len) => write!(f, "invalid header length {len}"),
            Self::Truncated {
                offset,
                expected,
                actual,
            } => write!(
                f,
                "stream truncated at offset {offset}: needed {expected} bytes, got {actual}"
            ),
            Self::Header(e) => write!(f, "invalid header: {e}"),
            Self::MissingSeal { offset } => {
                write!(f, "stream ends at offset {offset} without a seal marker")
            }
            Self::InvalidFrameLength { offset, length } => {
                write!(f, "invalid frame length {length} at offset {offset}")
            }
            Self::Payload { offset, source } => {
                write!(f, "invalid payload at offset {offset}: {source}")
            }
            Self::SealAtOffset { offset } => write!(f, "seal marker at offset {offset}"),
            Self::ShortRead {
                offset,
                expected,
                actual,
            } => write!(
                f,
                "short read at offset {offset}: needed {expected} bytes, got {actual}"
            ),
            Self::Sealed => write!(f, "stream is sealed"),
            Self::Poisoned => write!(f, "stream writer failed earlier and is unusable"),
            Self::FrameTooLarge { len } => {
                write!(f, "frame too large: {len} bytes (max {})", i32::MAX)
            }
            Self::TornFrame { offset } => {
                write!(f, "incomplete frame at offset {offset}; refusing to seal")
            }
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::ObjectStore(e) => Some(e),
            Self::Header(e) | Self::Payload { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ObjectStoreError> for StreamError {
    fn from(e: ObjectStoreError) -> Self {
        Self::ObjectStore(e)
    }
}

/// Encode a byte length as a frame length prefix.
fn length_prefix(len: usize) -> Result<i32, StreamError> {
    i32::try_from(len).map_err(|_| StreamError::FrameTooLarge { len })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_prefix_limits() {
        assert_eq!(length_prefix(0).expect("zero"), 0);
        assert_eq!(length_prefix(i32::MAX as usize).expect("max"), i32::MAX);
        assert!(matches!(
            length_prefix(i32::MAX as usize + 1),
            Err(StreamError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            StreamError::InvalidMagic { found: 0x1234 }.to_string(),
            "invalid magic 0x1234 (expected 0x1973)"
        );
        assert_eq!(
            StreamError::MissingSeal { offset: 42 }.to_string(),
            "stream ends at offset 42 without a seal marker"
        );
    }
}
