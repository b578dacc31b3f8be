//! async-comm - asynchronous byte-stream communication over TCP, UDP and serial lines
//!
//! Turns a duplex byte transport into a non-blocking send/receive API.
//! Writes are queued and drained in the background, received bytes arrive
//! through a callback on a dedicated thread.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `comm-core`: error type, buffers, configuration and statistics
//! - `comm-transport`: the `Transport` capability and its TCP, UDP and
//!   Serial implementations
//! - `comm-engine`: the engine (write queue, read loop, callback dispatch,
//!   lifecycle control)
//!
//! # Usage
//!
//! ```no_run
//! use async_comm::TcpClient;
//!
//! let client = async_comm::tcp("127.0.0.1:5000")?;
//! client.register_receive_callback(|bytes| println!("{:02X?}", bytes))?;
//! client.init()?;
//! client.send_bytes(&[0x7E, 0xA0, 0x07]);
//! client.close();
//! # let _: &TcpClient = &client;
//! # Ok::<(), async_comm::CommError>(())
//! ```

// Re-export core types
pub use comm_core::{CommConfig, CommError, CommResult, CommStatistics};

// Re-export engine API
pub use comm_engine::{Comm, CommFault, CommState, Direction, FaultCallback, ReceiveCallback};

// Re-export transports
pub mod transport {
    pub use comm_transport::*;
}

use comm_transport::{AnyTransport, SerialTransport, TcpTransport, UdpTransport};

/// Engine over a TCP client connection
pub type TcpClient = Comm<TcpTransport>;

/// Engine over a connected UDP socket
pub type Udp = Comm<UdpTransport>;

/// Engine over a serial line
pub type Serial = Comm<SerialTransport>;

/// Engine over a transport chosen at runtime
pub type AnyComm = Comm<AnyTransport>;

/// Create a TCP client engine for `address` (`host:port`)
///
/// # Errors
/// Returns `InvalidData` if the address cannot be parsed
pub fn tcp(address: &str) -> CommResult<TcpClient> {
    Ok(Comm::new(TcpTransport::from_address(address)?))
}

/// Create a UDP engine bound to `bind_address` talking to `remote_address`
///
/// # Errors
/// Returns `InvalidData` if either address cannot be parsed
pub fn udp(bind_address: &str, remote_address: &str) -> CommResult<Udp> {
    Ok(Comm::new(UdpTransport::from_addresses(bind_address, remote_address)?))
}

/// Create a serial engine for `port_name` at `baud_rate`, 8N1 without flow control
pub fn serial(port_name: &str, baud_rate: u32) -> Serial {
    Comm::new(SerialTransport::new_simple(port_name, baud_rate))
}
