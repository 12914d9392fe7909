/*!
 * Error Types
 * Centralized error handling with thiserror
 */

use super::types::Descriptor;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for process supervision operations
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Result type for pipe operations
pub type PipeResult<T> = Result<T, PipeError>;

/// Process supervision errors
///
/// Errors travel through futures to multiple observers, so every variant is
/// `Clone` and comparable.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("failed to poll process status: {0}")]
    PollFailed(String),

    #[error("the process was aborted: {0}")]
    Aborted(String),

    #[error("the process exceeded its time limit and was aborted")]
    TimeLimitExceeded,

    #[error("wait timed out after {0:?}")]
    WaitTimeout(Duration),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Pipe(#[from] PipeError),
}

/// Pipe errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum PipeError {
    #[error("no pipe exists for descriptor {0}")]
    UnknownDescriptor(Descriptor),

    #[error("descriptor {0} is not readable by the caller")]
    NotReadable(Descriptor),

    #[error("descriptor {0} is not writable by the caller")]
    NotWritable(Descriptor),

    #[error("descriptor {0} is not supported for piping")]
    UnsupportedDescriptor(Descriptor),

    #[error("failed to poll process pipes: {0}")]
    PollFailed(String),

    #[error("pipe I/O failed on descriptor {descriptor}: {reason}")]
    Io {
        descriptor: Descriptor,
        reason: String,
    },
}
