//! Closed set of the built-in transports

use crate::serial::SerialTransport;
use crate::tcp::TcpTransport;
use crate::transport::Transport;
use crate::udp::UdpTransport;
use async_trait::async_trait;
use comm_core::CommResult;

/// One of the built-in transports
///
/// Lets an engine be typed once while the concrete transport is chosen at
/// run time, e.g. from configuration.
#[derive(Debug)]
pub enum AnyTransport {
    Tcp(TcpTransport),
    Udp(UdpTransport),
    Serial(SerialTransport),
}

impl AnyTransport {
    /// Short name of the transport kind
    pub fn kind(&self) -> &'static str {
        match self {
            AnyTransport::Tcp(_) => "tcp",
            AnyTransport::Udp(_) => "udp",
            AnyTransport::Serial(_) => "serial",
        }
    }
}

impl From<TcpTransport> for AnyTransport {
    fn from(transport: TcpTransport) -> Self {
        AnyTransport::Tcp(transport)
    }
}

impl From<UdpTransport> for AnyTransport {
    fn from(transport: UdpTransport) -> Self {
        AnyTransport::Udp(transport)
    }
}

impl From<SerialTransport> for AnyTransport {
    fn from(transport: SerialTransport) -> Self {
        AnyTransport::Serial(transport)
    }
}

#[async_trait]
impl Transport for AnyTransport {
    async fn open(&self) -> CommResult<()> {
        match self {
            AnyTransport::Tcp(t) => t.open().await,
            AnyTransport::Udp(t) => t.open().await,
            AnyTransport::Serial(t) => t.open().await,
        }
    }

    async fn close(&self) -> CommResult<()> {
        match self {
            AnyTransport::Tcp(t) => t.close().await,
            AnyTransport::Udp(t) => t.close().await,
            AnyTransport::Serial(t) => t.close().await,
        }
    }

    fn is_open(&self) -> bool {
        match self {
            AnyTransport::Tcp(t) => t.is_open(),
            AnyTransport::Udp(t) => t.is_open(),
            AnyTransport::Serial(t) => t.is_open(),
        }
    }

    async fn read(&self, buf: &mut [u8]) -> CommResult<usize> {
        match self {
            AnyTransport::Tcp(t) => t.read(buf).await,
            AnyTransport::Udp(t) => t.read(buf).await,
            AnyTransport::Serial(t) => t.read(buf).await,
        }
    }

    async fn write(&self, buf: &[u8]) -> CommResult<usize> {
        match self {
            AnyTransport::Tcp(t) => t.write(buf).await,
            AnyTransport::Udp(t) => t.write(buf).await,
            AnyTransport::Serial(t) => t.write(buf).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcp::TcpSettings;

    #[tokio::test]
    async fn test_kind_and_delegation() {
        let tcp = TcpTransport::new(TcpSettings::new("127.0.0.1:1".parse().unwrap()));
        let any = AnyTransport::from(tcp);
        assert_eq!(any.kind(), "tcp");
        assert!(!any.is_open());
        assert!(any.write(b"x").await.is_err());

        let serial = AnyTransport::from(SerialTransport::new_simple("/dev/null-port", 9600));
        assert_eq!(serial.kind(), "serial");
    }
}
