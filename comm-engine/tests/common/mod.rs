//! Scripted transport used by the engine integration tests
//!
//! Reads are fed one completion at a time through a [`Script`]; writes are
//! recorded. Both primitives track how many calls are outstanding at once.

#![allow(dead_code)]

use async_trait::async_trait;
use comm_core::{CommError, CommResult};
use comm_transport::Transport;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub enum ReadStep {
    Data(Vec<u8>),
    Fail,
    /// Peer went away: the transport stops reporting itself open
    Eof,
}

/// Feeds read completions to a [`ScriptedTransport`]
#[derive(Clone)]
pub struct Script {
    tx: mpsc::UnboundedSender<ReadStep>,
}

impl Script {
    pub fn data(&self, bytes: &[u8]) {
        self.tx.send(ReadStep::Data(bytes.to_vec())).unwrap();
    }

    pub fn fail(&self) {
        self.tx.send(ReadStep::Fail).unwrap();
    }

    pub fn eof(&self) {
        self.tx.send(ReadStep::Eof).unwrap();
    }
}

struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ScriptedTransport {
    open: AtomicBool,
    fail_open: AtomicBool,
    reads: tokio::sync::Mutex<mpsc::UnboundedReceiver<ReadStep>>,
    write_limit: Option<usize>,
    fail_write_at: Option<usize>,
    requests: Mutex<Vec<usize>>,
    writes: Mutex<Vec<Vec<u8>>>,
    write_calls: AtomicUsize,
    reads_started: AtomicUsize,
    reads_in_flight: AtomicUsize,
    max_reads_in_flight: AtomicUsize,
    writes_in_flight: AtomicUsize,
    max_writes_in_flight: AtomicUsize,
    close_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> (Self, Script) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            open: AtomicBool::new(false),
            fail_open: AtomicBool::new(false),
            reads: tokio::sync::Mutex::new(rx),
            write_limit: None,
            fail_write_at: None,
            requests: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            write_calls: AtomicUsize::new(0),
            reads_started: AtomicUsize::new(0),
            reads_in_flight: AtomicUsize::new(0),
            max_reads_in_flight: AtomicUsize::new(0),
            writes_in_flight: AtomicUsize::new(0),
            max_writes_in_flight: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        };
        (transport, Script { tx })
    }

    /// Accept at most `limit` bytes per write
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Fail the write request with the given zero-based index
    pub fn failing_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Sizes of the write requests, in issue order
    pub fn requests(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }

    /// Bytes accepted by each successful write
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    /// Everything accepted so far, concatenated
    pub fn written(&self) -> Vec<u8> {
        self.writes.lock().unwrap().concat()
    }

    pub fn reads_started(&self) -> usize {
        self.reads_started.load(Ordering::SeqCst)
    }

    pub fn max_reads_in_flight(&self) -> usize {
        self.max_reads_in_flight.load(Ordering::SeqCst)
    }

    pub fn max_writes_in_flight(&self) -> usize {
        self.max_writes_in_flight.load(Ordering::SeqCst)
    }

    /// Invocations of the close primitive, whether or not the transport was open
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self) -> CommResult<()> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(CommError::Connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "injected open failure",
            )));
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> CommResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn read(&self, buf: &mut [u8]) -> CommResult<usize> {
        let _in_flight = InFlight::enter(&self.reads_in_flight, &self.max_reads_in_flight);
        self.reads_started.fetch_add(1, Ordering::SeqCst);

        let step = self.reads.lock().await.recv().await;
        match step {
            Some(ReadStep::Data(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(ReadStep::Fail) => Err(CommError::Connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "injected read failure",
            ))),
            Some(ReadStep::Eof) => {
                self.open.store(false, Ordering::SeqCst);
                Err(CommError::Connection(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "injected end of stream",
                )))
            }
            None => std::future::pending::<CommResult<usize>>().await,
        }
    }

    async fn write(&self, buf: &[u8]) -> CommResult<usize> {
        let _in_flight = InFlight::enter(&self.writes_in_flight, &self.max_writes_in_flight);
        let index = self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(buf.len());

        // give an overlapping write a chance to show up
        tokio::task::yield_now().await;

        if self.fail_write_at == Some(index) {
            return Err(CommError::Connection(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "injected write failure",
            )));
        }
        let n = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        self.writes.lock().unwrap().push(buf[..n].to_vec());
        Ok(n)
    }
}

/// Receive callback that records every delivered buffer
pub fn collector() -> (Arc<Mutex<Vec<Vec<u8>>>>, impl FnMut(&[u8]) + Send + 'static) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let callback = move |bytes: &[u8]| sink.lock().unwrap().push(bytes.to_vec());
    (received, callback)
}

/// Poll `condition` until it holds, failing the test after five seconds
pub fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}
