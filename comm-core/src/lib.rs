//! Core types for the async-comm byte-stream engine
//!
//! This crate provides the error type, the buffer primitives used by the
//! write and read pipelines, engine configuration and statistics.

pub mod buffer;
pub mod config;
pub mod error;
pub mod statistics;

pub use buffer::{chunk, ReadBuffer, WriteBuffer, READ_BUFFER_SIZE, WRITE_BUFFER_SIZE};
pub use config::CommConfig;
pub use error::{CommError, CommResult};
pub use statistics::CommStatistics;
