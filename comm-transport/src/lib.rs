//! Transport layer module for async-comm
//!
//! This crate provides the [`Transport`] capability consumed by the engine
//! and its TCP client, UDP and Serial implementations.

pub mod any;
pub mod serial;
pub mod tcp;
pub mod transport;
pub mod udp;

pub use any::AnyTransport;
pub use comm_core::{CommError, CommResult};
pub use serial::{SerialSettings, SerialTransport};
pub use tcp::{TcpSettings, TcpTransport};
pub use transport::Transport;
pub use udp::{UdpSettings, UdpTransport, MAX_UDP_PAYLOAD_SIZE};
