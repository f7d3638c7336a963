use std::fmt;
use std::io;

use thiserror::Error;

/// Error type for pool construction and startup.
#[derive(Error, Debug)]
pub enum PoolError {
    /// A pool needs at least one worker.
    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    /// A bounded queue needs at least one slot.
    #[error("queue capacity must be at least 1")]
    InvalidCapacity,

    /// Worker thread names cannot contain NUL bytes.
    #[error("thread name prefix contains a NUL byte: {0:?}")]
    InvalidThreadName(String),

    /// IO error from spawning a worker thread.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Failure reported by a job whose body panicked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("job panicked: {0}")]
pub struct JobPanicked(pub String);

/// Error returned by a non-blocking submit.
///
/// The rejected job is handed back so the caller can retry or drop it.
#[derive(Error)]
pub enum TrySubmitError<J> {
    /// The queue is at capacity.
    #[error("job queue is full")]
    Full(J),

    /// The queue has been closed for submission.
    #[error("job queue is closed")]
    Closed(J),
}

impl<J> TrySubmitError<J> {
    /// Takes back the job that could not be submitted.
    pub fn into_inner(self) -> J {
        match self {
            TrySubmitError::Full(job) | TrySubmitError::Closed(job) => job,
        }
    }

    /// Returns `true` if the queue was full.
    pub fn is_full(&self) -> bool {
        matches!(self, TrySubmitError::Full(_))
    }

    /// Returns `true` if the queue was closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, TrySubmitError::Closed(_))
    }
}

// Jobs are usually boxed trait objects without a `Debug` impl.
impl<J> fmt::Debug for TrySubmitError<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySubmitError::Full(_) => f.write_str("Full(..)"),
            TrySubmitError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}
