//! Dispatch consumer
//!
//! Drains the read queue on a dedicated thread and invokes the receive
//! callback with no lock held, so a slow callback never stalls the reactor.

use crate::engine::{lock, ReceiveCallback, Shared};
use comm_core::ReadBuffer;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Message on the read queue
#[derive(Debug)]
pub(crate) enum DispatchEvent {
    Data(ReadBuffer),
    Shutdown,
}

pub(crate) struct Dispatcher<T> {
    shared: Arc<Shared<T>>,
    rx: mpsc::UnboundedReceiver<DispatchEvent>,
    callback: Option<ReceiveCallback>,
    /// Set by the controller before it sends `Shutdown`
    halted: Arc<AtomicBool>,
}

impl<T> Dispatcher<T> {
    pub(crate) fn new(
        shared: Arc<Shared<T>>,
        rx: mpsc::UnboundedReceiver<DispatchEvent>,
        callback: Option<ReceiveCallback>,
        halted: Arc<AtomicBool>,
    ) -> Self {
        if callback.is_none() {
            log::warn!("No receive callback registered, received data will be dropped");
        }
        Self {
            shared,
            rx,
            callback,
            halted,
        }
    }

    /// Dispatch thread body
    pub(crate) fn run(mut self) {
        let mut local = VecDeque::new();
        'dispatch: loop {
            match self.rx.blocking_recv() {
                Some(DispatchEvent::Data(buffer)) => local.push_back(buffer),
                Some(DispatchEvent::Shutdown) | None => break,
            }

            // take everything queued so far in one go
            loop {
                match self.rx.try_recv() {
                    Ok(DispatchEvent::Data(buffer)) => local.push_back(buffer),
                    Ok(DispatchEvent::Shutdown) => break 'dispatch,
                    Err(_) => break,
                }
            }

            while let Some(buffer) = local.pop_front() {
                if self.halted.load(Ordering::Acquire) {
                    local.push_front(buffer);
                    break 'dispatch;
                }
                self.deliver(&buffer);
            }
        }

        self.rx.close();
        let mut discarded = local.len() as u64;
        while let Ok(event) = self.rx.try_recv() {
            if let DispatchEvent::Data(_) = event {
                discarded += 1;
            }
        }
        if discarded > 0 {
            log::debug!("Discarding {} undelivered reads", discarded);
            lock(&self.shared.stats).reads_discarded += discarded;
        }
        log::debug!("Dispatch consumer stopped");
    }

    fn deliver(&mut self, buffer: &ReadBuffer) {
        match self.callback.as_mut() {
            Some(callback) => {
                callback(buffer.data());
                lock(&self.shared.stats).record_callback();
            }
            None => {
                log::trace!("Dropping {} received bytes", buffer.len());
                lock(&self.shared.stats).reads_discarded += 1;
            }
        }
    }
}
