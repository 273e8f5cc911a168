//! Error types and handling for dirmirror
//!
//! Errors are split into the two fatal classes that stop a run (a missing
//! source directory, an unusable task list) and everything else, which is
//! either recoverable or contained at the level of a single item.

use std::path::{Path, PathBuf};

/// Main error type for dirmirror operations
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// I/O operation on a known path failed
    #[error("I/O error on '{path}': {message}")]
    PathIo {
        /// Path the operation was applied to
        path: PathBuf,
        /// Error message from the I/O operation
        message: String,
    },

    /// Source directory of a task does not exist
    #[error("{path} not exists")]
    SourceMissing {
        /// Source path as given by the task
        path: PathBuf,
    },

    /// Source of a task exists but is not a directory
    #[error("Source is not a directory: {path}")]
    SourceNotDirectory {
        /// Source path as given by the task
        path: PathBuf,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// The task list file does not have the expected structure
    #[error("wrong struct of {path}: {message}")]
    MalformedTaskList {
        /// Path of the task list file
        path: PathBuf,
        /// Parser or validation message
        message: String,
    },

    /// The task list file contains no tasks
    #[error("{path} is empty!")]
    EmptyTaskList {
        /// Path of the task list file
        path: PathBuf,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// A task's source directory is unusable
    SourceMissing,
    /// Configuration errors
    Config,
    /// Task list could not be interpreted
    MalformedTaskList,
    /// Task list had no entries
    EmptyTaskList,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::PathIo { .. } => ErrorKind::Io,
            Self::SourceMissing { .. } | Self::SourceNotDirectory { .. } => {
                ErrorKind::SourceMissing
            }
            Self::Config { .. } => ErrorKind::Config,
            Self::MalformedTaskList { .. } => ErrorKind::MalformedTaskList,
            Self::EmptyTaskList { .. } => ErrorKind::EmptyTaskList,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Whether this error must stop the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SourceMissing | ErrorKind::MalformedTaskList | ErrorKind::EmptyTaskList
        )
    }

    /// Create an I/O error bound to a path
    pub fn io_at<P: AsRef<Path>>(path: P, error: &std::io::Error) -> Self {
        Self::PathIo {
            path: path.as_ref().to_path_buf(),
            message: error.to_string(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
