//! UDP transport implementation

use crate::transport::Transport;
use async_trait::async_trait;
use comm_core::{CommError, CommResult};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::UdpSocket;
use tokio::sync::RwLock;

/// Maximum UDP payload size
pub const MAX_UDP_PAYLOAD_SIZE: usize = 65507;

/// UDP transport layer settings
#[derive(Debug, Clone)]
pub struct UdpSettings {
    pub bind_address: SocketAddr,
    pub remote_address: SocketAddr,
}

impl UdpSettings {
    /// Create new UDP settings
    pub fn new(bind_address: SocketAddr, remote_address: SocketAddr) -> Self {
        Self {
            bind_address,
            remote_address,
        }
    }

    /// Bind an ephemeral local port on the unspecified address
    pub fn with_remote(remote_address: SocketAddr) -> Self {
        let bind_address = if remote_address.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        Self::new(bind_address, remote_address)
    }
}

/// UDP transport layer implementation
///
/// The socket is connected to the remote address, so datagrams from any
/// other peer never reach `read`. Each read returns one datagram and each
/// write sends one datagram.
#[derive(Debug)]
pub struct UdpTransport {
    socket: RwLock<Option<Arc<UdpSocket>>>,
    settings: UdpSettings,
    open: AtomicBool,
}

impl UdpTransport {
    /// Create a new UDP transport layer
    pub fn new(settings: UdpSettings) -> Self {
        Self {
            socket: RwLock::new(None),
            settings,
            open: AtomicBool::new(false),
        }
    }

    /// Create UDP transport from bind and remote address strings
    pub fn from_addresses(bind_address: &str, remote_address: &str) -> CommResult<Self> {
        let bind: SocketAddr = bind_address
            .parse()
            .map_err(|e| CommError::InvalidData(format!("Invalid UDP bind address: {}", e)))?;
        let remote: SocketAddr = remote_address
            .parse()
            .map_err(|e| CommError::InvalidData(format!("Invalid UDP address: {}", e)))?;
        Ok(Self::new(UdpSettings::new(bind, remote)))
    }

    /// Transport settings
    pub fn settings(&self) -> &UdpSettings {
        &self.settings
    }

    /// Local address the socket is bound to, once open
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let socket = self.socket.read().await;
        socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    async fn socket(&self) -> CommResult<Arc<UdpSocket>> {
        self.socket
            .read()
            .await
            .clone()
            .ok_or_else(|| CommError::not_connected("UDP socket"))
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn open(&self) -> CommResult<()> {
        if self.is_open() {
            return Err(CommError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let socket = UdpSocket::bind(self.settings.bind_address).await?;
        socket.connect(self.settings.remote_address).await?;

        *self.socket.write().await = Some(Arc::new(socket));
        self.open.store(true, Ordering::Release);

        log::info!(
            "UDP socket {} -> {} opened",
            self.settings.bind_address,
            self.settings.remote_address
        );
        Ok(())
    }

    async fn close(&self) -> CommResult<()> {
        self.open.store(false, Ordering::Release);
        if self.socket.write().await.take().is_some() {
            log::info!("UDP socket to {} closed", self.settings.remote_address);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn read(&self, buf: &mut [u8]) -> CommResult<usize> {
        let socket = self.socket().await?;
        socket.recv(buf).await.map_err(CommError::Connection)
    }

    async fn write(&self, buf: &[u8]) -> CommResult<usize> {
        let socket = self.socket().await?;
        let len = buf.len().min(MAX_UDP_PAYLOAD_SIZE);
        socket.send(&buf[..len]).await.map_err(CommError::Connection)
    }
}
