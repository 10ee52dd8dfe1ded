//! Error types for stepworker operations.
//!
//! This module defines [`WorkerError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `WorkerError` for failures the caller must see (bad arguments, bad job files)
//! - Step bodies report through [`StepError`] so the runner can tell a
//!   cancellation apart from any other failure
//! - Use `anyhow::Error` (via `WorkerError::Other` / `StepError::Failed`) for
//!   unexpected errors
//! - The step runner itself converts every step failure into a result and never
//!   returns an error except for precondition violations

use std::path::PathBuf;
use thiserror::Error;

use crate::condition::ConditionError;

/// Core error type for stepworker operations.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A caller passed an argument that violates the API contract.
    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// Job definition file not found at the given location.
    #[error("Job definition not found: {path}")]
    JobNotFound { path: PathBuf },

    /// Failed to parse the job definition file.
    #[error("Failed to parse job definition at {path}: {message}")]
    JobParseError { path: PathBuf, message: String },

    /// Job definition is structurally invalid.
    #[error("Invalid job definition: {message}")]
    JobValidationError { message: String },

    /// A condition expression could not be parsed or evaluated.
    #[error(transparent)]
    Condition(#[from] ConditionError),

    /// Shell command could not be run.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A job report could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkerError {
    /// Shorthand for an [`WorkerError::InvalidArgument`].
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        WorkerError::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for stepworker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Failure reported by a step body or an async command.
#[derive(Debug, Error)]
pub enum StepError {
    /// The work observed its cancellation token and stopped.
    #[error("The operation was canceled.")]
    Canceled,

    /// Any other failure.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl From<WorkerError> for StepError {
    fn from(err: WorkerError) -> Self {
        StepError::Failed(err.into())
    }
}
