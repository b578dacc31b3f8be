//! Engine module for async-comm
//!
//! Turns any [`Transport`](comm_transport::Transport) into a non-blocking
//! send/receive API. Three worker threads cooperate:
//!
//! - **controller**: opens the transport, starts the other two threads and
//!   tears everything down when a fault or a stop request arrives
//! - **reactor**: runs a single-threaded tokio runtime executing the read
//!   loop and the write queue
//! - **dispatch**: hands received buffers to the user's receive callback,
//!   in arrival order, with no lock held
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use comm_engine::Comm;
//! use comm_transport::TcpTransport;
//!
//! let comm = Comm::new(TcpTransport::from_address("127.0.0.1:5000")?);
//! comm.register_receive_callback(|bytes| println!("received {} bytes", bytes.len()))?;
//! comm.init()?;
//! comm.send_bytes(b"hello");
//! comm.close();
//! # Ok::<(), comm_core::CommError>(())
//! ```

mod controller;
mod dispatch;
pub mod engine;
mod read;
pub mod state;
mod write;

pub use engine::{Comm, FaultCallback, ReceiveCallback};
pub use state::{CommFault, CommState, Direction};
