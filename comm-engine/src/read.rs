//! Read pipeline
//!
//! Perpetual read loop on the reactor. Each completed read is copied out of
//! the scratch buffer and queued for the dispatch consumer before the next
//! read reuses the scratch buffer.

use crate::dispatch::DispatchEvent;
use crate::engine::{lock, Shared};
use crate::state::{CommFault, Direction, StopReason};
use comm_core::ReadBuffer;
use comm_transport::Transport;
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) struct ReadPipeline<T> {
    shared: Arc<Shared<T>>,
    dispatch_tx: mpsc::UnboundedSender<DispatchEvent>,
    stop_tx: mpsc::UnboundedSender<StopReason>,
}

impl<T: Transport> ReadPipeline<T> {
    pub(crate) fn new(
        shared: Arc<Shared<T>>,
        dispatch_tx: mpsc::UnboundedSender<DispatchEvent>,
        stop_tx: mpsc::UnboundedSender<StopReason>,
    ) -> Self {
        Self {
            shared,
            dispatch_tx,
            stop_tx,
        }
    }

    /// Read until the transport reports closed or a read fails
    ///
    /// A closed transport ends the loop quietly. A failed read is a fault
    /// and no further read is issued.
    pub(crate) async fn run(self) {
        let mut scratch = vec![0u8; self.shared.config.read_buffer_size];

        while self.shared.transport.is_open() {
            match self.shared.transport.read(&mut scratch).await {
                Ok(n) => {
                    let n = n.min(scratch.len());
                    log::trace!("Read {} bytes", n);
                    lock(&self.shared.stats).record_read(n);

                    let buffer = ReadBuffer::copy_from(&scratch[..n]);
                    if self.dispatch_tx.send(DispatchEvent::Data(buffer)).is_err() {
                        log::debug!("Dispatch consumer gone, read loop stopped");
                        return;
                    }
                }
                Err(e) => {
                    log::error!("Transport read error: {}", e);
                    self.shared
                        .report_fault(CommFault::new(Direction::Read, &e), &self.stop_tx);
                    return;
                }
            }
        }
        log::debug!("Transport not open, read loop stopped");
    }
}
