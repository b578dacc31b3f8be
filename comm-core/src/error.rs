use thiserror::Error;

/// Main error type for async-comm operations
#[derive(Error, Debug)]
pub enum CommError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl CommError {
    /// Shorthand for a `NotConnected` connection error
    pub fn not_connected(what: &str) -> Self {
        CommError::Connection(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            format!("{} not connected", what),
        ))
    }
}

/// Result type alias for async-comm operations
pub type CommResult<T> = Result<T, CommError>;
