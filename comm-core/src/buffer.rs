//! Buffer primitives for the write and read pipelines
//!
//! A [`WriteBuffer`] is one chunk of outgoing data together with a cursor
//! recording how much of it the transport has already accepted. A
//! [`ReadBuffer`] is an owned copy of one completed read.

use bytes::Bytes;

/// Default maximum size of a single write chunk
pub const WRITE_BUFFER_SIZE: usize = 1024;

/// Default capacity of the read scratch buffer and of each [`ReadBuffer`]
pub const READ_BUFFER_SIZE: usize = 1024;

/// One queued chunk of outgoing bytes
///
/// `pos` counts the bytes already handed to the transport, so
/// `0 <= pos <= len()` always holds. The chunk is fully sent once
/// `remaining()` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBuffer {
    data: Bytes,
    pos: usize,
}

impl WriteBuffer {
    /// Create a write buffer over `data` with nothing sent yet
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Total length of the chunk
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes already handed to the transport
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The bytes that still have to be sent
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Number of bytes that still have to be sent
    pub fn nbytes(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Record that the transport accepted `n` more bytes
    ///
    /// The cursor saturates at the end of the chunk.
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.data.len());
    }

    /// Whether every byte of the chunk has been sent
    pub fn is_sent(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// Split `src` into write buffers of at most `max_chunk` bytes each
///
/// The source is copied once; the chunks share that allocation. An empty
/// source produces no chunks. `max_chunk` of zero is treated as one.
pub fn chunk(src: &[u8], max_chunk: usize) -> Vec<WriteBuffer> {
    let max_chunk = max_chunk.max(1);
    let data = Bytes::copy_from_slice(src);
    let mut chunks = Vec::with_capacity(src.len().div_ceil(max_chunk));
    let mut pos = 0;
    while pos < data.len() {
        let end = (pos + max_chunk).min(data.len());
        chunks.push(WriteBuffer::new(data.slice(pos..end)));
        pos = end;
    }
    chunks
}

/// Owned copy of one completed read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBuffer {
    data: Bytes,
}

impl ReadBuffer {
    /// Copy the received span out of the shared scratch buffer
    pub fn copy_from(src: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(src),
        }
    }

    /// Received bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of received bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the read completed with zero bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for ReadBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
