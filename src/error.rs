//! Error types for renderq
//!
//! The library uses a single top-level [`Error`] with nested domain enums:
//! - [`GenerateError`] — per-attempt executor failures (network, service,
//!   empty result); these land the task in `Failed` and never propagate
//!   past the executor boundary
//! - [`ExportError`] — export orchestration failures; per-item fetch
//!   failures are non-fatal to the batch and only surface as events

use crate::types::{TaskId, TaskStatus};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for renderq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for renderq
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before a task was created (e.g. an empty prompt)
    #[error("validation error: {0}")]
    Validation(String),

    /// Task id does not exist in the store
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// Operation not allowed in the task's current status
    #[error("cannot {operation} task {id} in status {current_status}")]
    InvalidState {
        /// The task that is in an invalid status for the operation
        id: TaskId,
        /// The operation that was attempted (e.g. "retry")
        operation: String,
        /// The status that prevents the operation
        current_status: TaskStatus,
    },

    /// Generation attempt failed (terminal per attempt)
    #[error("generation error: {0}")]
    Generate(#[from] GenerateError),

    /// Export run failed
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// A second export was requested while one is in progress
    #[error("an export is already in progress")]
    ExportInProgress,

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Executor-level failure taxonomy
///
/// Every variant lands the task in `Failed` with a human-readable message.
/// The executor never retries internally — retry is an explicit,
/// user-triggered re-enqueue.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Request could not be sent or the response could not be parsed
    #[error("network error: {0}")]
    Network(String),

    /// Remote returned a non-success status
    #[error("service error ({status}): {message}")]
    Service {
        /// HTTP status code returned by the rendering service
        status: u16,
        /// Message from the error body if present, otherwise the status code
        message: String,
    },

    /// Remote returned success but no usable result payload
    #[error("no image data returned from service")]
    EmptyResult,
}

impl From<reqwest::Error> for GenerateError {
    fn from(err: reqwest::Error) -> Self {
        GenerateError::Network(err.to_string())
    }
}

/// Export orchestration failures
#[derive(Debug, Error)]
pub enum ExportError {
    /// One result could not be fetched (non-fatal to the batch)
    #[error("failed to fetch result for task {id}: {reason}")]
    Fetch {
        /// The task whose result could not be fetched
        id: TaskId,
        /// Why the fetch failed
        reason: String,
    },

    /// The store holds no completed tasks with a result
    #[error("no completed tasks to export")]
    NothingToExport,

    /// Archive strategy: zero results could be fetched, whole batch failed
    #[error("no results could be fetched for the archive")]
    NothingFetched,

    /// Building the zip archive failed
    #[error("archive error: {0}")]
    Archive(String),

    /// Writing the output file failed
    #[error("failed to write {path}: {reason}")]
    Write {
        /// Destination path of the failed write
        path: PathBuf,
        /// Why the write failed
        reason: String,
    },
}
