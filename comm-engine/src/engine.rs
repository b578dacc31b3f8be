//! Public engine handle
//!
//! [`Comm`] owns the transport and the worker threads. All methods take
//! `&self`; share the handle with `Arc` to call `send_bytes` from several
//! threads. Dropping the handle shuts the engine down.

use crate::controller::Controller;
use crate::state::{CommFault, CommState, StopReason};
use comm_core::{chunk, CommConfig, CommError, CommResult, CommStatistics, WriteBuffer};
use comm_transport::Transport;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// Receive callback, invoked once per completed read on the dispatch thread
pub type ReceiveCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Fault callback, invoked at most once on the controller thread
pub type FaultCallback = Box<dyn FnOnce(&CommFault) + Send + 'static>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the handle and the worker threads
pub(crate) struct Shared<T> {
    pub(crate) transport: T,
    pub(crate) config: CommConfig,
    state: Mutex<CommState>,
    state_changed: Condvar,
    fault: Mutex<Option<CommFault>>,
    pub(crate) stats: Mutex<CommStatistics>,
    /// Taken by the controller once the transport is open
    pub(crate) write_rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<WriteBuffer>>>>,
    pub(crate) receive_callback: Mutex<Option<ReceiveCallback>>,
    pub(crate) fault_callback: Mutex<Option<FaultCallback>>,
    /// Threads that run user code and must never join the controller
    pub(crate) workers: Mutex<Vec<ThreadId>>,
    /// Runtime left behind by the controller, kept to close the transport later
    pub(crate) parked_runtime: Mutex<Option<Runtime>>,
    /// Set by `close()`, read by the controller during teardown
    pub(crate) close_requested: AtomicBool,
    /// Set by whoever invokes the transport's close primitive for this engine
    pub(crate) transport_closed: AtomicBool,
}

impl<T> Shared<T> {
    pub(crate) fn state(&self) -> CommState {
        *lock(&self.state)
    }

    pub(crate) fn transition(&self, new_state: CommState) -> CommResult<()> {
        let mut state = lock(&self.state);
        state.validate_transition(new_state)?;
        log::debug!("Engine state {} -> {}", *state, new_state);
        *state = new_state;
        self.state_changed.notify_all();
        Ok(())
    }

    /// `Created -> Stopped`; refused in every other state
    fn stop_before_start(&self) -> bool {
        let mut state = lock(&self.state);
        if *state != CommState::Created {
            return false;
        }
        *state = CommState::Stopped;
        self.state_changed.notify_all();
        true
    }

    /// Mark the engine stopped after its controller died
    fn abandon(&self) {
        *lock(&self.state) = CommState::Stopped;
        self.state_changed.notify_all();
    }

    /// Block until the teardown started by another caller has finished
    fn wait_stopped(&self) {
        let mut state = lock(&self.state);
        while !state.is_stopped() {
            state = self
                .state_changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Claim the single close of the transport owed by this engine
    pub(crate) fn claim_transport_close(&self) -> bool {
        !self.transport_closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn fault(&self) -> Option<CommFault> {
        lock(&self.fault).clone()
    }

    /// Record a failed completion and wake the controller
    ///
    /// Only the first fault is kept.
    pub(crate) fn report_fault(&self, fault: CommFault, stop_tx: &mpsc::UnboundedSender<StopReason>) {
        {
            let mut slot = lock(&self.fault);
            if slot.is_some() {
                log::debug!("Ignoring subsequent fault: {}", fault);
                return;
            }
            *slot = Some(fault.clone());
        }
        let _ = stop_tx.send(StopReason::Fault(fault));
    }

    pub(crate) fn is_worker_thread(&self) -> bool {
        lock(&self.workers).contains(&thread::current().id())
    }
}

#[derive(Default)]
struct Control {
    controller: Option<JoinHandle<()>>,
    stop_tx: Option<mpsc::UnboundedSender<StopReason>>,
}

/// Asynchronous byte-stream engine over a [`Transport`]
///
/// # Lifecycle
/// 1. Create with [`Comm::new`] or [`Comm::with_config`]
/// 2. Register the receive callback (and optionally a fault callback)
/// 3. [`init`](Comm::init) opens the transport and starts the worker threads
/// 4. [`send_bytes`](Comm::send_bytes) from any thread; received data arrives
///    through the callback
/// 5. [`close`](Comm::close) or [`shutdown`](Comm::shutdown), or drop the handle
///
/// Any read or write failure stops the whole engine. Queued writes and
/// undelivered reads are discarded, the fault is kept in
/// [`fault`](Comm::fault) and the fault callback is invoked.
pub struct Comm<T: Transport + 'static> {
    shared: Arc<Shared<T>>,
    write_tx: mpsc::UnboundedSender<Vec<WriteBuffer>>,
    control: Mutex<Control>,
}

impl<T: Transport + 'static> Comm<T> {
    /// Create an engine with default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, CommConfig::default())
    }

    /// Create an engine with the given configuration
    ///
    /// The configuration is validated by [`init`](Comm::init).
    pub fn with_config(transport: T, config: CommConfig) -> Self {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let shared = Shared {
            transport,
            config,
            state: Mutex::new(CommState::Created),
            state_changed: Condvar::new(),
            fault: Mutex::new(None),
            stats: Mutex::new(CommStatistics::new()),
            write_rx: Mutex::new(Some(write_rx)),
            receive_callback: Mutex::new(None),
            fault_callback: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
            parked_runtime: Mutex::new(None),
            close_requested: AtomicBool::new(false),
            transport_closed: AtomicBool::new(false),
        };
        Self {
            shared: Arc::new(shared),
            write_tx,
            control: Mutex::new(Control::default()),
        }
    }

    /// Register the function that receives incoming bytes
    ///
    /// The callback runs on the dispatch thread, once per completed read and
    /// in arrival order. Zero-length reads are delivered as empty slices.
    ///
    /// # Errors
    /// Returns `InvalidState` once [`init`](Comm::init) has been called
    pub fn register_receive_callback<F>(&self, callback: F) -> CommResult<()>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        if let Err(e) = self.ensure_created("register a receive callback") {
            log::warn!("{}", e);
            return Err(e);
        }
        *lock(&self.shared.receive_callback) = Some(Box::new(callback));
        Ok(())
    }

    /// Register a function invoked when a transport fault stops the engine
    ///
    /// # Errors
    /// Returns `InvalidState` if the engine has already stopped
    pub fn register_fault_callback<F>(&self, callback: F) -> CommResult<()>
    where
        F: FnOnce(&CommFault) + Send + 'static,
    {
        let state = self.shared.state();
        if matches!(state, CommState::ShuttingDown | CommState::Stopped) {
            return Err(CommError::InvalidState(format!(
                "cannot register a fault callback in state {}",
                state
            )));
        }
        *lock(&self.shared.fault_callback) = Some(Box::new(callback));
        Ok(())
    }

    /// Open the transport and start the worker threads
    ///
    /// Returns once the transport is open and the engine is running; it
    /// does not wait for any data.
    ///
    /// # Errors
    /// - `InvalidData` if the configuration is invalid
    /// - the transport's error if it cannot be opened; the engine stays in
    ///   `Created` and `init` may be retried
    /// - `Runtime` if the runtime or a thread cannot be created
    /// - `InvalidState` if the engine was already started or stopped
    pub fn init(&self) -> CommResult<()> {
        let mut control = lock(&self.control);
        self.ensure_created("init")?;
        self.shared.config.validate()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CommError::Runtime(format!("failed to build I/O runtime: {}", e)))?;
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        let (started_tx, started_rx) = std::sync::mpsc::sync_channel(1);

        let controller = Controller::new(Arc::clone(&self.shared), runtime, stop_tx.clone(), stop_rx);
        let handle = thread::Builder::new()
            .name(self.shared.config.thread_name("controller"))
            .spawn(move || controller.run(started_tx))
            .map_err(|e| CommError::Runtime(format!("failed to spawn controller thread: {}", e)))?;

        let started = started_rx.recv().unwrap_or_else(|_| {
            Err(CommError::Runtime(
                "controller thread exited during start-up".to_string(),
            ))
        });
        match started {
            Ok(()) => {
                control.controller = Some(handle);
                control.stop_tx = Some(stop_tx);
                log::info!("Engine started");
                Ok(())
            }
            Err(e) => {
                if handle.join().is_err() {
                    log::error!("Controller thread panicked during start-up");
                }
                Err(e)
            }
        }
    }

    /// Queue bytes for transmission
    ///
    /// The bytes are split into chunks of at most `write_chunk_size` and
    /// appended to the write queue in one step, so chunks of concurrent
    /// calls never interleave. Never blocks on the transport. Bytes sent
    /// before `init` are transmitted once the engine runs; bytes sent after
    /// it stopped are discarded.
    pub fn send_bytes(&self, bytes: &[u8]) {
        let chunks = chunk(bytes, self.shared.config.write_chunk_size);
        if chunks.is_empty() {
            return;
        }
        let count = chunks.len() as u64;
        if self.write_tx.send(chunks).is_err() {
            log::debug!("Engine stopped, discarding {} bytes", bytes.len());
            lock(&self.shared.stats).writes_discarded += count;
        }
    }

    /// Stop the engine and close the transport
    ///
    /// May be called from any thread, any number of times. The transport's
    /// close primitive is invoked exactly once, whether or not the transport
    /// still reports itself open. Returns once the engine is stopped and
    /// the transport closed, unless called from a callback (see
    /// [`shutdown`](Comm::shutdown)); the close then happens during teardown.
    pub fn close(&self) {
        self.shared.close_requested.store(true, Ordering::Release);
        self.stop(StopReason::Close);
        if self.shared.state().is_stopped() && self.shared.claim_transport_close() {
            self.close_stopped_transport();
        }
    }

    /// Stop the engine, leaving the transport as it is
    ///
    /// Idempotent; safe to call when the engine was never started. Returns
    /// once the engine is stopped, even when another thread started the
    /// teardown. Called from a receive or fault callback it only signals
    /// the stop, the threads are joined by the next call from another
    /// thread or by drop.
    pub fn shutdown(&self) {
        self.stop(StopReason::Shutdown);
    }

    /// Current lifecycle state
    pub fn state(&self) -> CommState {
        self.shared.state()
    }

    /// Check if the engine is moving data
    pub fn is_running(&self) -> bool {
        self.shared.state().is_running()
    }

    /// The transport fault that stopped the engine, if any
    pub fn fault(&self) -> Option<CommFault> {
        self.shared.fault()
    }

    /// Snapshot of the engine counters
    pub fn statistics(&self) -> CommStatistics {
        lock(&self.shared.stats).clone()
    }

    /// The transport driven by this engine
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// Engine configuration
    pub fn config(&self) -> &CommConfig {
        &self.shared.config
    }

    #[cfg(test)]
    pub(crate) fn shared_for_tests(&self) -> Arc<Shared<T>> {
        Arc::clone(&self.shared)
    }

    fn ensure_created(&self, what: &str) -> CommResult<()> {
        let state = self.shared.state();
        if state != CommState::Created {
            return Err(CommError::InvalidState(format!(
                "cannot {} in state {}",
                what, state
            )));
        }
        Ok(())
    }

    fn stop(&self, reason: StopReason) {
        let handle = {
            let mut control = lock(&self.control);
            if let Some(stop_tx) = control.stop_tx.take() {
                let _ = stop_tx.send(reason);
            }
            let handle = control.controller.take();
            if handle.is_none() && self.shared.stop_before_start() {
                lock(&self.shared.write_rx).take();
                log::debug!("Engine stopped before start");
                return;
            }
            handle
        };

        let on_engine_thread = self.shared.is_worker_thread()
            || handle
                .as_ref()
                .is_some_and(|h| h.thread().id() == thread::current().id());
        match handle {
            Some(handle) if on_engine_thread => {
                log::debug!("Stop requested from an engine thread, deferring join");
                lock(&self.control).controller = Some(handle);
            }
            Some(handle) => {
                if handle.join().is_err() {
                    log::error!("Controller thread panicked");
                    self.shared.abandon();
                }
            }
            None if on_engine_thread => {}
            None => {
                log::debug!("Teardown already in progress, waiting for it");
                self.shared.wait_stopped();
            }
        }
    }

    /// Close the transport of a stopped engine
    ///
    /// Uses the runtime the transport was opened on when there is one.
    fn close_stopped_transport(&self) {
        let parked = lock(&self.shared.parked_runtime).take();
        let runtime = match parked {
            Some(runtime) => runtime,
            None => match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::error!("Failed to build runtime to close transport: {}", e);
                    return;
                }
            },
        };
        let transport = &self.shared.transport;
        thread::scope(|scope| {
            let closer = thread::Builder::new()
                .name(self.shared.config.thread_name("close"))
                .spawn_scoped(scope, || runtime.block_on(transport.close()));
            match closer.map(|handle| handle.join()) {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => log::error!("Failed to close transport: {}", e),
                Ok(Err(_)) => log::error!("Transport close panicked"),
                Err(e) => log::error!("Failed to spawn close thread: {}", e),
            }
        });
        *lock(&self.shared.parked_runtime) = Some(runtime);
    }
}

impl<T: Transport + 'static> Drop for Comm<T> {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(runtime) = lock(&self.shared.parked_runtime).take() {
            runtime.shutdown_background();
        }
    }
}

impl<T: Transport + 'static> fmt::Debug for Comm<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comm")
            .field("state", &self.state())
            .field("config", &self.shared.config)
            .field("fault", &self.fault())
            .finish()
    }
}
