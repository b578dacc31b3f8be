//! Write pipeline
//!
//! FIFO of write chunks drained into the transport by a single task on the
//! reactor. The front chunk is the only one ever in flight; a partial write
//! is resumed from the chunk's cursor.

use crate::engine::{lock, Shared};
use crate::state::{CommFault, Direction, StopReason};
use comm_core::{CommError, CommResult, WriteBuffer};
use comm_transport::Transport;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) struct WritePipeline<T> {
    shared: Arc<Shared<T>>,
    /// One batch per `send_bytes` call
    write_rx: mpsc::UnboundedReceiver<Vec<WriteBuffer>>,
    stop_tx: mpsc::UnboundedSender<StopReason>,
    queue: VecDeque<WriteBuffer>,
}

impl<T: Transport> WritePipeline<T> {
    pub(crate) fn new(
        shared: Arc<Shared<T>>,
        write_rx: mpsc::UnboundedReceiver<Vec<WriteBuffer>>,
        stop_tx: mpsc::UnboundedSender<StopReason>,
    ) -> Self {
        Self {
            shared,
            write_rx,
            stop_tx,
            queue: VecDeque::new(),
        }
    }

    /// Drain the queue until a write fails
    pub(crate) async fn run(mut self) {
        loop {
            if self.queue.is_empty() {
                match self.write_rx.recv().await {
                    Some(batch) => self.queue.extend(batch),
                    None => return,
                }
            }
            while let Ok(batch) = self.write_rx.try_recv() {
                self.queue.extend(batch);
            }

            if let Err(e) = self.write_front().await {
                log::error!("Transport write error: {}", e);
                self.shared
                    .report_fault(CommFault::new(Direction::Write, &e), &self.stop_tx);
                return;
            }
        }
    }

    /// Issue one write for the remaining bytes of the front chunk
    async fn write_front(&mut self) -> CommResult<()> {
        let Some(front) = self.queue.front_mut() else {
            return Ok(());
        };

        let n = self.shared.transport.write(front.remaining()).await?;
        if n == 0 && front.nbytes() > 0 {
            return Err(CommError::Connection(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "transport accepted zero bytes",
            )));
        }
        front.advance(n);
        let sent = front.is_sent();
        log::trace!("Wrote {} bytes, {} left in chunk", n, front.nbytes());

        {
            let mut stats = lock(&self.shared.stats);
            stats.record_write(n);
            if sent {
                stats.record_chunk_sent();
            }
        }
        if sent {
            self.queue.pop_front();
        }
        Ok(())
    }
}

impl<T> Drop for WritePipeline<T> {
    fn drop(&mut self) {
        self.write_rx.close();
        let mut discarded = self.queue.len();
        while let Ok(batch) = self.write_rx.try_recv() {
            discarded += batch.len();
        }
        if discarded > 0 {
            log::debug!("Discarding {} queued write chunks", discarded);
            lock(&self.shared.stats).writes_discarded += discarded as u64;
        }
    }
}
