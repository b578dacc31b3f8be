//! TCP client transport implementation

use crate::transport::Transport;
use async_trait::async_trait;
use comm_core::{CommError, CommResult};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub address: SocketAddr,
    /// Limit on connection establishment. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Create TCP settings with a connect timeout
    pub fn with_timeout(address: SocketAddr, timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout: Some(timeout),
        }
    }
}

/// TCP client transport
///
/// The connected stream is split so the read side and the write side are
/// locked independently. End of stream is reported as an `UnexpectedEof`
/// connection error and marks the transport closed.
pub struct TcpTransport {
    settings: TcpSettings,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    open: AtomicBool,
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("settings", &self.settings)
            .field("open", &self.is_open())
            .finish()
    }
}

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            settings,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            open: AtomicBool::new(false),
        }
    }

    /// Create TCP transport from address string
    pub fn from_address(address: &str) -> CommResult<Self> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| CommError::InvalidData(format!("Invalid TCP address: {}", e)))?;
        Ok(Self::new(TcpSettings::new(addr)))
    }

    /// Transport settings
    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&self) -> CommResult<()> {
        if self.is_open() {
            return Err(CommError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let stream = if let Some(timeout) = self.settings.connect_timeout {
            tokio::time::timeout(timeout, TcpStream::connect(self.settings.address))
                .await
                .map_err(|_| CommError::Timeout)??
        } else {
            TcpStream::connect(self.settings.address).await?
        };
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);
        self.open.store(true, Ordering::Release);

        log::info!("TCP connection to {} opened", self.settings.address);
        Ok(())
    }

    async fn close(&self) -> CommResult<()> {
        self.open.store(false, Ordering::Release);
        self.reader.lock().await.take();
        if let Some(mut write_half) = self.writer.lock().await.take() {
            let _ = write_half.shutdown().await;
            log::info!("TCP connection to {} closed", self.settings.address);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn read(&self, buf: &mut [u8]) -> CommResult<usize> {
        let mut guard = self.reader.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| CommError::not_connected("TCP stream"))?;

        match stream.read(buf).await {
            Ok(0) if !buf.is_empty() => {
                log::info!("TCP connection to {} closed by peer", self.settings.address);
                self.open.store(false, Ordering::Release);
                Err(CommError::Connection(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )))
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.open.store(false, Ordering::Release);
                Err(CommError::Connection(e))
            }
        }
    }

    async fn write(&self, buf: &[u8]) -> CommResult<usize> {
        let mut guard = self.writer.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| CommError::not_connected("TCP stream"))?;

        stream.write(buf).await.map_err(CommError::Connection)
    }
}
