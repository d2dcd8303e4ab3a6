//! Random access to record streams held in an object store.

use std::marker::PhantomData;

use crate::object_store::{ObjectStore, RemoteObject};
use crate::stream::frame::{read_frame_at, read_preamble};
use crate::stream::{Record, StreamError};

/// A random-access reader over a remote record stream.
///
/// Every read is a range request; nothing is buffered between calls. There is
/// no sequential cursor: frames are addressed by the offsets an index stores.
pub struct RemoteStreamReader<C, H, P> {
    object: RemoteObject<C>,
    header: H,
    first_frame_offset: u64,
    _payload: PhantomData<fn() -> P>,
}

impl<C: ObjectStore, H: Record, P: Record> RemoteStreamReader<C, H, P> {
    /// Fetch and validate the stream's magic and header.
    ///
    /// # Implementation Notes
    ///
    /// Issues one range request each for the magic, the header length and the
    /// header bytes. An empty header costs no third request.
    pub fn open(object: RemoteObject<C>) -> Result<Self, StreamError> {
        let (header, first_frame_offset) = read_preamble::<H, _>(&object)?;
        tracing::debug!(
            bucket = object.bucket(),
            key = object.key(),
            first_frame_offset,
            "Opened remote record stream"
        );
        Ok(Self {
            object,
            header,
            first_frame_offset,
            _payload: PhantomData,
        })
    }

    #[must_use]
    pub const fn header(&self) -> &H {
        &self.header
    }

    #[must_use]
    pub const fn first_frame_offset(&self) -> u64 {
        self.first_frame_offset
    }

    #[must_use]
    pub const fn object(&self) -> &RemoteObject<C> {
        &self.object
    }

    /// Fetch the frame whose length prefix is at `offset`.
    ///
    /// Same rules as `StreamReader::read_at`.
    pub fn read_at(&self, offset: u64) -> Result<P, StreamError> {
        read_frame_at(&self.object, offset)
    }
}

impl<C, H: std::fmt::Debug, P> std::fmt::Debug for RemoteStreamReader<C, H, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStreamReader")
            .field("header", &self.header)
            .field("first_frame_offset", &self.first_frame_offset)
            .finish_non_exhaustive()
    }
}
