//! Engine statistics collection

use serde::{Deserialize, Serialize};

/// Communication engine statistics
///
/// Counters are updated by the reactor and dispatch threads while the
/// engine runs; a snapshot can be taken at any time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommStatistics {
    /// Bytes accepted by the transport
    pub bytes_sent: u64,
    /// Write chunks fully handed to the transport
    pub chunks_sent: u64,
    /// Write requests issued against the transport (partial writes count each time)
    pub writes_issued: u64,
    /// Bytes delivered by successful reads
    pub bytes_received: u64,
    /// Successful read completions, including zero-length ones
    pub reads_completed: u64,
    /// Receive callback invocations
    pub callbacks_dispatched: u64,
    /// Queued write chunks dropped at shutdown
    pub writes_discarded: u64,
    /// Received buffers dropped at shutdown before reaching the callback
    pub reads_discarded: u64,
}

impl CommStatistics {
    /// Create new statistics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all statistics counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Record one write completion of `n` bytes
    pub fn record_write(&mut self, n: usize) {
        self.writes_issued += 1;
        self.bytes_sent += n as u64;
    }

    /// Record that a chunk has been fully sent
    pub fn record_chunk_sent(&mut self) {
        self.chunks_sent += 1;
    }

    /// Record one read completion of `n` bytes
    pub fn record_read(&mut self, n: usize) {
        self.reads_completed += 1;
        self.bytes_received += n as u64;
    }

    /// Record one receive callback invocation
    pub fn record_callback(&mut self) {
        self.callbacks_dispatched += 1;
    }
}
