//! Reading record streams from local files.
//!
//! `StreamReader` walks frames in order through a buffered reader and also
//! serves random-access `read_at` through a separate positioned handle, so
//! the two never disturb each other.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::Path;

use crate::io::PositionedFile;
use crate::stream::frame::{read_frame_at, read_preamble};
use crate::stream::{PREFIX_SIZE, RawRecord, Record, SEAL_MARKER, StreamError};

/// Read buffer size for sequential scans.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A reader over a local record stream.
///
/// `H` is the header record type, `P` the frame payload type.
pub struct StreamReader<H, P> {
    reader: BufReader<File>,
    positioned: PositionedFile,
    header: H,
    first_frame_offset: u64,
    position: u64,
    sealed: bool,
    _payload: PhantomData<fn() -> P>,
}

impl<H: Record, P: Record> StreamReader<H, P> {
    /// Open a stream and parse its header.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the file does not start with `MAGIC`
    /// - the header length is negative
    /// - the file ends inside the header
    /// - the header does not parse as `H`
    pub fn open(path: &Path) -> Result<Self, StreamError> {
        let positioned = PositionedFile::open(path)?;
        let (header, first_frame_offset) = read_preamble::<H, _>(&positioned)?;

        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(first_frame_offset))?;
        tracing::debug!(
            path = %path.display(),
            size = positioned.len(),
            first_frame_offset,
            "Opened record stream"
        );

        Ok(Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            positioned,
            header,
            first_frame_offset,
            position: first_frame_offset,
            sealed: false,
            _payload: PhantomData,
        })
    }

    /// Get the parsed header.
    #[must_use]
    pub const fn header(&self) -> &H {
        &self.header
    }

    /// Offset of the first frame (just past the header).
    #[must_use]
    pub const fn first_frame_offset(&self) -> u64 {
        self.first_frame_offset
    }

    /// Offset of the next frame the sequential cursor will read.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Whether the sequential cursor has reached the seal marker.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Read the next frame, or `None` once the seal marker is reached.
    pub fn next_frame(&mut self) -> Result<Option<P>, StreamError> {
        Ok(self.next_frame_with_offset()?.map(|(_, payload)| payload))
    }

    /// Read the next frame along with the offset of its length prefix.
    ///
    /// # Errors
    ///
    /// Returns `MissingSeal` if the file ends (cleanly or mid-frame) before
    /// the seal marker. After the seal marker every call returns `Ok(None)`.
    pub fn next_frame_with_offset(&mut self) -> Result<Option<(u64, P)>, StreamError> {
        if self.sealed {
            return Ok(None);
        }
        let offset = self.position;

        let mut prefix = [0u8; PREFIX_SIZE];
        if read_full(&mut self.reader, &mut prefix)? < PREFIX_SIZE {
            return Err(StreamError::MissingSeal { offset });
        }
        let length = i32::from_be_bytes(prefix);
        if length == SEAL_MARKER {
            self.sealed = true;
            self.position += PREFIX_SIZE as u64;
            tracing::trace!(offset, "Reached seal marker");
            return Ok(None);
        }
        let len = u64::try_from(length)
            .map_err(|_| StreamError::InvalidFrameLength { offset, length })?;

        // Grows with the data actually present, not the claimed length
        let mut payload = Vec::new();
        let n = (&mut self.reader).take(len).read_to_end(&mut payload)?;
        if (n as u64) < len {
            return Err(StreamError::MissingSeal { offset });
        }
        self.position += PREFIX_SIZE as u64 + len;

        let record =
            P::decode_record(&payload).map_err(|source| StreamError::Payload { offset, source })?;
        Ok(Some((offset, record)))
    }

    /// Iterate over the remaining frames.
    pub const fn frames(&mut self) -> Frames<'_, H, P> {
        Frames {
            reader: self,
            done: false,
        }
    }

    /// Read the frame whose length prefix is at `offset`.
    ///
    /// Independent of the sequential cursor.
    ///
    /// # Errors
    ///
    /// Returns `SealAtOffset` if `offset` holds the seal marker and
    /// `ShortRead` if the frame runs past the end of the file.
    pub fn read_at(&self, offset: u64) -> Result<P, StreamError> {
        read_frame_at(&self.positioned, offset)
    }
}

/// Iterator over the frames of a `StreamReader`.
///
/// Ends at the seal marker. An error is yielded once, then iteration stops.
pub struct Frames<'a, H, P> {
    reader: &'a mut StreamReader<H, P>,
    done: bool,
}

impl<H: Record, P: Record> Iterator for Frames<'_, H, P> {
    type Item = Result<P, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_frame() {
            Ok(Some(payload)) => Some(Ok(payload)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<H: Record, P: Record> std::iter::FusedIterator for Frames<'_, H, P> {}

/// Fill `buf` from `reader`, stopping early only at end of file.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Shape and fingerprint of a complete stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Size of the header in bytes.
    pub header_len: u64,
    /// Number of frames before the seal marker.
    pub frames: u64,
    /// Sum of all payload lengths.
    pub payload_bytes: u64,
    /// CRC32 of the header followed by every payload, in order.
    pub crc32: u32,
    /// Offset just past the seal marker.
    pub end_offset: u64,
}

/// Scan a sealed stream and summarize it.
///
/// Two streams with equal summaries hold the same header and frames with
/// overwhelming likelihood; useful for comparing a local copy to a remote one.
pub fn summarize(path: &Path) -> Result<StreamSummary, StreamError> {
    let mut reader = StreamReader::<RawRecord, RawRecord>::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(reader.header().as_bytes());

    let mut frames = 0;
    let mut payload_bytes = 0;
    while let Some(payload) = reader.next_frame()? {
        frames += 1;
        payload_bytes += payload.as_bytes().len() as u64;
        hasher.update(payload.as_bytes());
    }

    let summary = StreamSummary {
        header_len: reader.first_frame_offset() - crate::stream::HEADER_OFFSET,
        frames,
        payload_bytes,
        crc32: hasher.finalize(),
        end_offset: reader.position(),
    };
    tracing::debug!(path = %path.display(), ?summary, "Summarized record stream");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamWriter;
    use crate::testing::{PriceEntity, StreamHeader};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::fs;
    use tempfile::tempdir;

    fn header() -> StreamHeader {
        StreamHeader {
            source: "prices".to_string(),
            created_at_ms: 1_700_000_000_000,
        }
    }

    fn write_prices(path: &Path, entities: &[PriceEntity]) -> Vec<u64> {
        let mut writer = StreamWriter::create(path, &header()).expect("create writer");
        let mut offsets = Vec::new();
        for entity in entities {
            offsets.push(writer.position());
            writer.write_frame(entity).expect("write frame");
        }
        writer.finish().expect("finish");
        offsets
    }

    fn sample_entities() -> Vec<PriceEntity> {
        vec![
            PriceEntity::new("AAPL0", &[189.5, 190.25]),
            PriceEntity::new("MSFT", &[]),
            PriceEntity::default(),
            PriceEntity::new("GOOG", &[140.0; 64]),
        ]
    }

    #[test]
    fn test_round_trip_then_end_of_stream() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("prices.binpb");
        let entities = sample_entities();
        write_prices(&path, &entities);

        let mut reader = StreamReader::<StreamHeader, PriceEntity>::open(&path).expect("open");
        assert_eq!(reader.header(), &header());
        assert!(!reader.is_sealed());

        let read: Vec<PriceEntity> = reader
            .frames()
            .collect::<Result<_, _>>()
            .expect("frames");
        assert_eq!(read, entities);
        assert!(reader.is_sealed());
        assert_eq!(reader.position(), fs::metadata(&path).expect("stat").len());

        // Sealed stays sealed
        for _ in 0..3 {
            assert!(reader.next_frame().expect("after seal").is_none());
        }
    }

    #[test]
    fn test_random_payloads_round_trip() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("random.bin");
        let mut rng = StdRng::seed_from_u64(1973);
        let payloads: Vec<RawRecord> = (0..200)
            .map(|_| {
                let len = rng.random_range(0..2048);
                RawRecord((0..len).map(|_| rng.random::<u8>()).collect())
            })
            .collect();

        let mut writer =
            StreamWriter::create(&path, &RawRecord(b"raw".to_vec())).expect("create writer");
        for payload in &payloads {
            writer.write_frame(payload).expect("write frame");
        }
        drop(writer);

        let mut reader = StreamReader::<RawRecord, RawRecord>::open(&path).expect("open");
        let mut read = Vec::new();
        while let Some(payload) = reader.next_frame().expect("frame") {
            read.push(payload);
        }
        assert_eq!(read, payloads);
    }

    #[test]
    fn test_next_frame_with_offset_matches_read_at() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("prices.binpb");
        let entities = sample_entities();
        let written_offsets = write_prices(&path, &entities);

        let mut reader = StreamReader::<StreamHeader, PriceEntity>::open(&path).expect("open");
        assert_eq!(written_offsets[0], reader.first_frame_offset());

        let mut seen = Vec::new();
        while let Some((offset, entity)) = reader.next_frame_with_offset().expect("frame") {
            seen.push(offset);
            assert_eq!(reader.read_at(offset).expect("read_at"), entity);
        }
        assert_eq!(seen, written_offsets);
    }

    #[test]
    fn test_read_at_does_not_move_cursor() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("prices.binpb");
        let entities = sample_entities();
        let offsets = write_prices(&path, &entities);

        let mut reader = StreamReader::<StreamHeader, PriceEntity>::open(&path).expect("open");
        assert_eq!(
            reader.next_frame().expect("frame"),
            Some(entities[0].clone())
        );
        assert_eq!(reader.read_at(offsets[3]).expect("read_at"), entities[3]);
        assert_eq!(reader.read_at(offsets[0]).expect("read_at"), entities[0]);
        assert_eq!(
            reader.next_frame().expect("frame"),
            Some(entities[1].clone())
        );
    }

    #[test]
    fn test_read_at_seal_and_past_end() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("prices.binpb");
        write_prices(&path, &sample_entities());
        let len = fs::metadata(&path).expect("stat").len();

        let reader = StreamReader::<StreamHeader, PriceEntity>::open(&path).expect("open");
        assert!(matches!(
            reader.read_at(len - 4),
            Err(StreamError::SealAtOffset { .. })
        ));
        assert!(matches!(
            reader.read_at(len),
            Err(StreamError::ShortRead { actual: 0, .. })
        ));
        assert!(matches!(
            reader.read_at(len + 1000),
            Err(StreamError::ShortRead { .. })
        ));
    }

    #[test]
    fn test_truncation_is_missing_seal() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("prices.binpb");
        write_prices(&path, &sample_entities());
        let full = fs::read(&path).expect("read");

        // Every cut past the header, including a clean frame boundary
        let first_frame = {
            let reader = StreamReader::<StreamHeader, PriceEntity>::open(&path).expect("open");
            usize::try_from(reader.first_frame_offset()).expect("offset")
        };
        for cut in first_frame..full.len() {
            fs::write(&path, &full[..cut]).expect("truncate");
            let mut reader =
                StreamReader::<StreamHeader, PriceEntity>::open(&path).expect("open");
            let result: Result<Vec<_>, _> = reader.frames().collect();
            assert!(
                matches!(result, Err(StreamError::MissingSeal { .. })),
                "cut at {cut}: {result:?}"
            );
        }
    }

    #[test]
    fn test_bytes_after_seal_are_ignored() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("prices.binpb");
        let entities = sample_entities();
        write_prices(&path, &entities);
        let mut bytes = fs::read(&path).expect("read");
        bytes.extend_from_slice(b"trailing garbage");
        fs::write(&path, bytes).expect("write");

        let mut reader = StreamReader::<StreamHeader, PriceEntity>::open(&path).expect("open");
        let read: Vec<_> = reader.frames().collect::<Result<_, _>>().expect("frames");
        assert_eq!(read, entities);
    }

    #[test]
    fn test_open_rejects_bad_preamble() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("bad.bin");

        fs::write(&path, [0, 0, 0x19, 0x74, 0, 0, 0, 0]).expect("write");
        assert!(matches!(
            StreamReader::<RawRecord, RawRecord>::open(&path),
            Err(StreamError::InvalidMagic { found: 0x1974 })
        ));

        fs::write(&path, [0, 0, 0x19, 0x73, 0xff, 0xff, 0xff, 0xfe]).expect("write");
        assert!(matches!(
            StreamReader::<RawRecord, RawRecord>::open(&path),
            Err(StreamError::InvalidHeaderLength(-2))
        ));

        fs::write(&path, [0, 0, 0x19, 0x73, 0, 0, 0, 9, 1, 2]).expect("write");
        assert!(matches!(
            StreamReader::<RawRecord, RawRecord>::open(&path),
            Err(StreamError::Truncated {
                offset: 8,
                expected: 9,
                actual: 2,
            })
        ));

        // Header bytes that are not a valid message
        fs::write(&path, [0, 0, 0x19, 0x73, 0, 0, 0, 2, 0x0A, 0x05]).expect("write");
        assert!(matches!(
            StreamReader::<StreamHeader, RawRecord>::open(&path),
            Err(StreamError::Header(_))
        ));
    }

    #[test]
    fn test_payload_parse_failure_reports_offset() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("mixed.bin");
        let mut writer =
            StreamWriter::create(&path, &RawRecord::default()).expect("create writer");
        writer
            .write_frame(&RawRecord(vec![0x0A, 100, 1]))
            .expect("write frame");
        writer.finish().expect("finish");

        let mut reader = StreamReader::<RawRecord, PriceEntity>::open(&path).expect("open");
        assert!(matches!(
            reader.next_frame(),
            Err(StreamError::Payload { offset: 8, .. })
        ));
    }

    #[test]
    fn test_invalid_frame_length() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("neg.bin");
        let mut bytes = vec![0, 0, 0x19, 0x73, 0, 0, 0, 0];
        bytes.extend_from_slice(&(-7i32).to_be_bytes());
        fs::write(&path, bytes).expect("write");

        let mut reader = StreamReader::<RawRecord, RawRecord>::open(&path).expect("open");
        assert!(matches!(
            reader.next_frame(),
            Err(StreamError::InvalidFrameLength {
                offset: 8,
                length: -7,
            })
        ));
    }

    #[test]
    fn test_summarize() {
        let dir = tempdir().expect("create temp dir");
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        write_prices(&a, &sample_entities());
        write_prices(&b, &sample_entities());

        let summary = summarize(&a).expect("summary");
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.end_offset, fs::metadata(&a).expect("stat").len());
        assert_eq!(summary, summarize(&b).expect("summary"));

        write_prices(&b, &sample_entities()[..3]);
        assert_ne!(summary.crc32, summarize(&b).expect("summary").crc32);
    }
}
