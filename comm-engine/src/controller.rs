//! Lifecycle controller
//!
//! The controller thread opens the transport, starts the dispatch and
//! reactor threads, then sleeps until the first stop trigger: a fault
//! reported by either pipeline, `shutdown()` or `close()`. Teardown order
//! is fixed: halt the reactor, signal the dispatch consumer, join the
//! reactor, join the dispatch consumer.

use crate::dispatch::{DispatchEvent, Dispatcher};
use crate::engine::{lock, Shared};
use crate::read::ReadPipeline;
use crate::state::{CommState, StopReason};
use crate::write::WritePipeline;
use comm_core::{CommError, CommResult};
use comm_transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};

pub(crate) struct Controller<T: Transport + 'static> {
    shared: Arc<Shared<T>>,
    runtime: Runtime,
    stop_tx: mpsc::UnboundedSender<StopReason>,
    stop_rx: mpsc::UnboundedReceiver<StopReason>,
}

impl<T: Transport + 'static> Controller<T> {
    pub(crate) fn new(
        shared: Arc<Shared<T>>,
        runtime: Runtime,
        stop_tx: mpsc::UnboundedSender<StopReason>,
        stop_rx: mpsc::UnboundedReceiver<StopReason>,
    ) -> Self {
        Self {
            shared,
            runtime,
            stop_tx,
            stop_rx,
        }
    }

    /// Controller thread body
    ///
    /// The start-up outcome is reported through `started` before the
    /// controller starts waiting.
    pub(crate) fn run(self, started: SyncSender<CommResult<()>>) {
        let Controller {
            shared,
            runtime,
            stop_tx,
            mut stop_rx,
        } = self;
        lock(&shared.workers).push(thread::current().id());

        if let Err(e) = runtime.block_on(shared.transport.open()) {
            log::error!("Failed to open transport: {}", e);
            let _ = started.send(Err(e));
            return;
        }

        let runtime = Arc::new(runtime);
        let workers = match Workers::start(&shared, &runtime, &stop_tx) {
            Ok(workers) => workers,
            Err(e) => {
                log::error!("Failed to start engine threads: {}", e);
                if shared.claim_transport_close() {
                    if let Err(close_err) = runtime.block_on(shared.transport.close()) {
                        log::error!("Failed to close transport: {}", close_err);
                    }
                }
                let _ = shared.transition(CommState::Stopped);
                let _ = started.send(Err(e));
                return;
            }
        };

        if let Err(e) = shared.transition(CommState::Running) {
            log::error!("{}", e);
        }
        let _ = started.send(Ok(()));
        drop(stop_tx);

        let reason = stop_rx.blocking_recv().unwrap_or(StopReason::Shutdown);
        let _ = shared.transition(CommState::ShuttingDown);
        log::info!("Engine stopping: {}", reason);

        workers.stop();

        // a close() that lost the race to another stop trigger still counts
        let close_transport = match &reason {
            StopReason::Close => true,
            StopReason::Fault(_) => shared.config.close_transport_on_fault,
            StopReason::Shutdown => false,
        } || shared.close_requested.load(Ordering::Acquire);
        if close_transport && shared.claim_transport_close() {
            if let Err(e) = runtime.block_on(shared.transport.close()) {
                log::error!("Failed to close transport: {}", e);
            }
        }

        match Arc::try_unwrap(runtime) {
            Ok(runtime) => *lock(&shared.parked_runtime) = Some(runtime),
            Err(_) => log::warn!("I/O runtime still shared after reactor exit"),
        }
        let _ = shared.transition(CommState::Stopped);
        log::info!("Engine stopped");

        if let StopReason::Fault(fault) = reason {
            let callback = lock(&shared.fault_callback).take();
            if let Some(callback) = callback {
                callback(&fault);
            }
        }
    }
}

/// Reactor and dispatch threads of one engine run
struct Workers {
    halt_tx: watch::Sender<bool>,
    dispatch_tx: mpsc::UnboundedSender<DispatchEvent>,
    halted: Arc<AtomicBool>,
    reactor: Option<JoinHandle<()>>,
    dispatch: Option<JoinHandle<()>>,
}

impl Workers {
    /// Spawn the dispatch consumer, then the reactor
    fn start<T: Transport + 'static>(
        shared: &Arc<Shared<T>>,
        runtime: &Arc<Runtime>,
        stop_tx: &mpsc::UnboundedSender<StopReason>,
    ) -> CommResult<Self> {
        let write_rx = lock(&shared.write_rx)
            .take()
            .ok_or_else(|| CommError::InvalidState("write queue already consumed".to_string()))?;
        let callback = lock(&shared.receive_callback).take();
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let (halt_tx, halt_rx) = watch::channel(false);
        let halted = Arc::new(AtomicBool::new(false));

        let dispatcher = Dispatcher::new(Arc::clone(shared), dispatch_rx, callback, Arc::clone(&halted));
        let dispatch = spawn_worker(shared, "dispatch", move || dispatcher.run())?;
        let mut workers = Workers {
            halt_tx,
            dispatch_tx: dispatch_tx.clone(),
            halted,
            reactor: None,
            dispatch: Some(dispatch),
        };

        let reader = ReadPipeline::new(Arc::clone(shared), dispatch_tx, stop_tx.clone());
        let writer = WritePipeline::new(Arc::clone(shared), write_rx, stop_tx.clone());
        let runtime = Arc::clone(runtime);
        match spawn_worker(shared, "reactor", move || run_reactor(runtime, reader, writer, halt_rx)) {
            Ok(reactor) => {
                workers.reactor = Some(reactor);
                Ok(workers)
            }
            Err(e) => {
                workers.stop();
                Err(e)
            }
        }
    }

    fn stop(mut self) {
        self.halt_tx.send_replace(true);
        self.halted.store(true, Ordering::Release);
        let _ = self.dispatch_tx.send(DispatchEvent::Shutdown);

        if let Some(reactor) = self.reactor.take() {
            if reactor.join().is_err() {
                log::error!("Reactor thread panicked");
            }
        }
        if let Some(dispatch) = self.dispatch.take() {
            if dispatch.join().is_err() {
                log::error!("Dispatch thread panicked");
            }
        }
    }
}

fn spawn_worker<T, F>(shared: &Arc<Shared<T>>, role: &str, body: F) -> CommResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(shared.config.thread_name(role))
        .spawn(body)
        .map_err(|e| CommError::Runtime(format!("failed to spawn {} thread: {}", role, e)))?;
    lock(&shared.workers).push(handle.thread().id());
    Ok(handle)
}

/// Reactor thread body
///
/// Runs the read loop and the write queue on the engine's single-threaded
/// runtime until halted. If both loops finish on their own the thread
/// exits early; the controller keeps waiting for a stop trigger.
fn run_reactor<T: Transport + 'static>(
    runtime: Arc<Runtime>,
    reader: ReadPipeline<T>,
    writer: WritePipeline<T>,
    mut halt_rx: watch::Receiver<bool>,
) {
    runtime.block_on(async move {
        let io = async { tokio::join!(reader.run(), writer.run()) };
        tokio::select! {
            _ = halt_rx.wait_for(|halted| *halted) => log::debug!("Reactor halted"),
            _ = io => log::debug!("Reactor ran out of work"),
        }
    });
}
