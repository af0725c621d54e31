//! Error types for tree-transcode
//!
//! This module defines the error hierarchy that covers:
//! - Setup and configuration errors (fatal, reported before workers start)
//! - Worker/concurrency errors
//! - Per-file faults raised while running the conversion protocol
//!
//! Per-file failures never escalate: they are turned into [`ErrorRecord`]s
//! by the worker and surfaced once the run completes.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the tree-transcode application
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (tree scan, output tree creation)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input tree could not be walked
    #[error("Failed to scan '{path}': {reason}")]
    Scan { path: PathBuf, reason: String },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid queue capacity
    #[error("Invalid queue capacity {size}: must be at least {min}")]
    InvalidQueueCapacity { size: usize, min: usize },

    /// Invalid dashboard refresh interval
    #[error("Invalid refresh interval {millis}ms: must be between {min} and {max}")]
    InvalidRefreshInterval { millis: u64, min: u64, max: u64 },

    /// Input root missing or not a directory
    #[error("Input directory '{path}' does not exist or is not a directory")]
    InputNotFound { path: PathBuf },

    /// Output root is the input root
    #[error("Output directory '{path}' cannot be the same as the input directory")]
    SameRoots { path: PathBuf },

    /// Output root lives inside the input tree
    #[error("Output directory '{output}' cannot be inside the input directory '{input}'")]
    OutputInsideInput { input: PathBuf, output: PathBuf },

    /// Input root lives inside the output tree
    #[error("Input directory '{input}' cannot be inside the output directory '{output}'")]
    InputInsideOutput { input: PathBuf, output: PathBuf },

    /// Path could not be resolved
    #[error("Cannot resolve path '{path}': {reason}")]
    Unresolvable { path: PathBuf, reason: String },

    /// Empty tool program name
    #[error("External tool for {role} must not be empty")]
    EmptyTool { role: &'static str },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked outside the per-file guard
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Work queue has no receivers left
    #[error("Work queue closed: no worker is receiving")]
    QueueClosed,

    /// Worker thread could not be spawned
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// All workers died while work was still pending
    #[error("All workers have terminated unexpectedly")]
    AllWorkersDead,
}

/// Fault raised while handling a single file
///
/// These are the "unexpected" failures (I/O, malformed work). Expected tool
/// failures are not errors at this level; they come back as
/// [`ErrorKind::TranscodeFailure`] records inside a successful outcome.
#[derive(Error, Debug)]
pub enum FileError {
    /// Filesystem operation failed
    #[error("{op} '{path}': {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External tool could not be launched at all
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Work item was not usable
    #[error("Malformed work item: {0}")]
    Malformed(String),

    /// Handling the file panicked
    #[error("Panicked while handling file: {0}")]
    Panicked(String),
}

impl FileError {
    /// Wrap an I/O error with the operation and path it concerned
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FileError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Kind of a recorded per-file failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// External tool signaled failure, or left no artifact after "success"
    TranscodeFailure,
    /// Unexpected fault (I/O, panic, malformed work)
    UnhandledFault,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TranscodeFailure => f.write_str("transcode failure"),
            ErrorKind::UnhandledFault => f.write_str("unhandled fault"),
        }
    }
}

/// A per-file failure, accumulated by a worker and flushed at shutdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub input: PathBuf,
    pub output: PathBuf,
    pub details: String,
}

impl ErrorRecord {
    pub fn transcode_failure(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::TranscodeFailure,
            input: input.into(),
            output: output.into(),
            details: details.into(),
        }
    }

    /// Record an unexpected fault for the given file
    pub fn fault(input: impl Into<PathBuf>, output: impl Into<PathBuf>, error: &FileError) -> Self {
        Self {
            kind: ErrorKind::UnhandledFault,
            input: input.into(),
            output: output.into(),
            details: error.to_string(),
        }
    }
}

/// Result type alias for TranscodeError
pub type Result<T> = std::result::Result<T, TranscodeError>;

/// Result type alias for per-file work
pub type FileResult<T> = std::result::Result<T, FileError>;
