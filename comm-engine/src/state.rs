//! Engine state machine and fault records

use comm_core::{CommError, CommResult};
use std::fmt;

/// Engine lifecycle state
///
/// # State Transitions
/// ```text
/// Created -> Running       (init() opened the transport)
/// Running -> ShuttingDown  (I/O fault, shutdown() or close())
/// ShuttingDown -> Stopped  (worker threads joined)
/// Created -> Stopped       (shutdown() or close() before init())
/// ```
///
/// There is no way back from `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommState {
    /// Constructed, transport not opened yet
    #[default]
    Created,
    /// Transport open, worker threads running
    Running,
    /// A stop trigger fired and the worker threads are being torn down
    ShuttingDown,
    /// All worker threads have exited
    Stopped,
}

impl CommState {
    /// Check if the engine is moving data
    pub fn is_running(&self) -> bool {
        matches!(self, CommState::Running)
    }

    /// Check if the engine has reached its terminal state
    pub fn is_stopped(&self) -> bool {
        matches!(self, CommState::Stopped)
    }

    /// Validate state transition
    ///
    /// # Returns
    /// `Ok(())` if transition is valid, `Err` otherwise
    pub fn validate_transition(&self, new_state: CommState) -> CommResult<()> {
        let valid = matches!(
            (*self, new_state),
            (CommState::Created, CommState::Running)
                | (CommState::Created, CommState::Stopped)
                | (CommState::Running, CommState::ShuttingDown)
                | (CommState::ShuttingDown, CommState::Stopped)
        );

        if valid {
            Ok(())
        } else {
            Err(CommError::InvalidState(format!(
                "Invalid state transition: {:?} -> {:?}",
                self, new_state
            )))
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            CommState::Created => "Created",
            CommState::Running => "Running",
            CommState::ShuttingDown => "ShuttingDown",
            CommState::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for CommState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of the operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// Transport failure that stopped the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommFault {
    pub direction: Direction,
    pub message: String,
}

impl CommFault {
    pub fn new(direction: Direction, error: &CommError) -> Self {
        Self {
            direction,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for CommFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.direction, self.message)
    }
}

/// Event that ends the controller's wait
#[derive(Debug, Clone)]
pub(crate) enum StopReason {
    /// `shutdown()` or drop
    Shutdown,
    /// `close()`: also closes the transport
    Close,
    /// A read or write completion reported failure
    Fault(CommFault),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Shutdown => f.write_str("shutdown requested"),
            StopReason::Close => f.write_str("close requested"),
            StopReason::Fault(fault) => write!(f, "{}", fault),
        }
    }
}
