//! Engine configuration
//!
//! # Usage Example
//!
//! ```rust
//! use comm_core::CommConfig;
//!
//! let config = CommConfig::new()
//!     .with_write_chunk_size(512)
//!     .with_close_transport_on_fault(true);
//! assert!(config.validate().is_ok());
//! ```

use crate::buffer::{READ_BUFFER_SIZE, WRITE_BUFFER_SIZE};
use crate::error::{CommError, CommResult};
use serde::{Deserialize, Serialize};

/// Configuration for a communication engine
///
/// # Default Settings
/// - Write chunk size: 1024 bytes
/// - Read buffer size: 1024 bytes
/// - Transport stays open after a fault; only `close()` closes it
/// - Thread name prefix: `async-comm`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommConfig {
    /// Maximum number of bytes in one queued write chunk
    pub write_chunk_size: usize,
    /// Capacity of the read scratch buffer
    pub read_buffer_size: usize,
    /// Close the transport when the engine stops because of an I/O fault
    pub close_transport_on_fault: bool,
    /// Prefix used to name the controller, reactor and dispatch threads
    pub thread_name_prefix: String,
}

impl CommConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self {
            write_chunk_size: WRITE_BUFFER_SIZE,
            read_buffer_size: READ_BUFFER_SIZE,
            close_transport_on_fault: false,
            thread_name_prefix: "async-comm".to_string(),
        }
    }

    /// Set the maximum write chunk size
    pub fn with_write_chunk_size(mut self, size: usize) -> Self {
        self.write_chunk_size = size;
        self
    }

    /// Set the read scratch buffer capacity
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Choose whether a fault-triggered shutdown also closes the transport
    pub fn with_close_transport_on_fault(mut self, close: bool) -> Self {
        self.close_transport_on_fault = close;
        self
    }

    /// Set the worker thread name prefix
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Check the configuration before it is handed to an engine
    ///
    /// # Errors
    /// Returns `InvalidData` if either buffer size is zero
    pub fn validate(&self) -> CommResult<()> {
        if self.write_chunk_size == 0 {
            return Err(CommError::InvalidData(
                "write_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(CommError::InvalidData(
                "read_buffer_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Name for one of the engine's worker threads
    pub fn thread_name(&self, role: &str) -> String {
        format!("{}-{}", self.thread_name_prefix, role)
    }
}

impl Default for CommConfig {
    fn default() -> Self {
        Self::new()
    }
}
