//! Writing record streams.
//!
//! A writer emits the magic and header on creation, one length-prefixed frame
//! per `write_frame`, and the seal marker exactly once: on `seal`, `finish`,
//! or drop. A writer whose underlying I/O failed is poisoned and never seals,
//! so readers see `MissingSeal` instead of a stream that looks complete.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

use crate::io::PositionedFile;
use crate::stream::{
    HEADER_OFFSET, MAGIC, PREFIX_SIZE, RawRecord, Record, SEAL_MARKER, StreamError,
    StreamReader, length_prefix,
};

/// Write buffer size for file-backed writers.
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// A writer for a record stream with payloads of type `P`.
pub struct StreamWriter<P, W: Write = BufWriter<File>> {
    /// `None` only after `finish` has handed the writer back.
    inner: Option<W>,
    position: u64,
    frames_written: u64,
    sealed: bool,
    poisoned: bool,
    _payload: PhantomData<fn(&P)>,
}

impl<P: Record> StreamWriter<P, BufWriter<File>> {
    /// Create (or truncate) a stream file and write its header.
    pub fn create<H: Record>(path: &Path, header: &H) -> Result<Self, StreamError> {
        let file = File::create(path)?;
        tracing::debug!(path = %path.display(), "Created record stream");
        Self::new(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file), header)
    }
}

impl<P: Record, W: Write> StreamWriter<P, W> {
    /// Start a stream on `inner` by writing the magic, header length and
    /// header.
    pub fn new<H: Record>(inner: W, header: &H) -> Result<Self, StreamError> {
        let header_bytes = header.encode_record();
        let header_len = length_prefix(header_bytes.len())?;

        let mut writer = Self {
            inner: Some(inner),
            position: 0,
            frames_written: 0,
            sealed: false,
            poisoned: false,
            _payload: PhantomData,
        };
        writer.write_raw(&MAGIC.to_be_bytes())?;
        writer.write_raw(&header_len.to_be_bytes())?;
        writer.write_raw(&header_bytes)?;
        debug_assert_eq!(writer.position, HEADER_OFFSET + header_bytes.len() as u64);
        Ok(writer)
    }

    /// Offset where the next frame will start.
    ///
    /// This is the value an index stores to address the next record.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    #[must_use]
    pub const fn frames_written(&self) -> u64 {
        self.frames_written
    }

    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Append one frame. Returns the number of bytes appended (length prefix
    /// plus payload).
    ///
    /// # Errors
    ///
    /// Returns `Sealed` after the seal marker was written, `Poisoned` after an
    /// earlier I/O failure, and `FrameTooLarge` (before writing anything) if
    /// the payload does not fit an `i32` length.
    pub fn write_frame(&mut self, payload: &P) -> Result<usize, StreamError> {
        self.check_writable()?;
        let bytes = payload.encode_record();
        let len = length_prefix(bytes.len())?;

        self.write_raw(&len.to_be_bytes())?;
        self.write_raw(&bytes)?;
        self.frames_written += 1;
        Ok(PREFIX_SIZE + bytes.len())
    }

    /// Write the seal marker. Later calls do nothing.
    pub fn seal(&mut self) -> Result<(), StreamError> {
        if self.sealed {
            return Ok(());
        }
        if self.poisoned {
            return Err(StreamError::Poisoned);
        }
        self.write_raw(&SEAL_MARKER.to_be_bytes())?;
        self.sealed = true;
        tracing::debug!(
            frames = self.frames_written,
            bytes = self.position,
            "Sealed record stream"
        );
        Ok(())
    }

    /// Flush buffered bytes to the underlying writer.
    pub fn flush(&mut self) -> Result<(), StreamError> {
        let result = match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => return Err(StreamError::Poisoned),
        };
        result.map_err(|e| {
            self.poisoned = true;
            StreamError::Io(e)
        })
    }

    /// Seal, flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W, StreamError> {
        self.seal()?;
        self.flush()?;
        self.inner.take().ok_or(StreamError::Poisoned)
    }

    /// Flush and return the underlying writer without sealing.
    ///
    /// The stream stays open for appending; `seal_file` can seal it later.
    pub fn into_unsealed(mut self) -> Result<W, StreamError> {
        self.check_writable()?;
        self.flush()?;
        self.inner.take().ok_or(StreamError::Poisoned)
    }

    const fn check_writable(&self) -> Result<(), StreamError> {
        if self.poisoned {
            Err(StreamError::Poisoned)
        } else if self.sealed {
            Err(StreamError::Sealed)
        } else {
            Ok(())
        }
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(StreamError::Poisoned);
        };
        if let Err(e) = inner.write_all(bytes) {
            self.poisoned = true;
            return Err(StreamError::Io(e));
        }
        self.position += bytes.len() as u64;
        Ok(())
    }
}

impl<P, W: Write> Drop for StreamWriter<P, W> {
    fn drop(&mut self) {
        let Some(inner) = self.inner.as_mut() else {
            return;
        };
        if self.poisoned {
            tracing::warn!(
                frames = self.frames_written,
                "Dropping poisoned stream writer without sealing"
            );
            return;
        }
        if !self.sealed {
            match inner.write_all(&SEAL_MARKER.to_be_bytes()) {
                Ok(()) => self.sealed = true,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to seal stream on drop");
                    return;
                }
            }
        }
        if let Err(e) = inner.flush() {
            tracing::warn!(error = %e, "Failed to flush stream on drop");
        }
    }
}

impl<P, W: Write> std::fmt::Debug for StreamWriter<P, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter")
            .field("position", &self.position)
            .field("frames_written", &self.frames_written)
            .field("sealed", &self.sealed)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

/// Result of `seal_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealOutcome {
    /// The stream already had a seal marker; nothing was written.
    AlreadySealed { frames: u64 },
    /// A seal marker was appended after the last complete frame.
    Sealed { frames: u64, seal_offset: u64 },
}

/// Seal an existing stream whose writer never sealed it.
///
/// Every frame must be complete: the file is scanned to its end first, and a
/// torn final frame is refused rather than sealed over.
pub fn seal_file(path: &Path) -> Result<SealOutcome, StreamError> {
    let mut reader = StreamReader::<RawRecord, RawRecord>::open(path)?;
    let len = PositionedFile::open(path)?.len();

    let mut frames = 0;
    loop {
        match reader.next_frame() {
            Ok(Some(_)) => frames += 1,
            Ok(None) => return Ok(SealOutcome::AlreadySealed { frames }),
            Err(StreamError::MissingSeal { offset }) if offset == len => break,
            Err(StreamError::MissingSeal { offset }) => {
                return Err(StreamError::TornFrame { offset });
            }
            Err(e) => return Err(e),
        }
    }

    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(&SEAL_MARKER.to_be_bytes())?;
    file.sync_all()?;
    tracing::info!(path = %path.display(), frames, seal_offset = len, "Sealed stream file");
    Ok(SealOutcome::Sealed {
        frames,
        seal_offset: len,
    })
}
