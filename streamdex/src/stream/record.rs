//! The record seam between the stream codec and caller schemas.
//!
//! The codec never interprets payloads. Any prost message is a `Record`;
//! `RawRecord` carries bytes through untouched.

/// A value that can be stored as a stream header or frame payload.
pub trait Record: Sized {
    /// Serialize to frame payload bytes.
    fn encode_record(&self) -> Vec<u8>;

    /// Parse from frame payload bytes.
    fn decode_record(bytes: &[u8]) -> Result<Self, RecordError>;
}

impl<M: prost::Message + Default> Record for M {
    fn encode_record(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    fn decode_record(bytes: &[u8]) -> Result<Self, RecordError> {
        Self::decode(bytes).map_err(RecordError::Decode)
    }
}

/// Uninterpreted payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRecord(pub Vec<u8>);

impl RawRecord {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for RawRecord {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for RawRecord {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Record for RawRecord {
    #[allow(clippy::disallowed_methods)] // Clone needed for an owned payload
    fn encode_record(&self) -> Vec<u8> {
        self.0.clone()
    }

    fn decode_record(bytes: &[u8]) -> Result<Self, RecordError> {
        Ok(Self(bytes.to_vec()))
    }
}

/// Errors produced when a payload does not parse as the expected record.
#[derive(Debug)]
pub enum RecordError {
    /// Protobuf decoding failed.
    Decode(prost::DecodeError),
    /// A hand-written record rejected its bytes.
    Invalid(String),
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode error: {e}"),
            Self::Invalid(msg) => write!(f, "invalid record: {msg}"),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}
