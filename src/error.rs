//! Error types for the Xiphos library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`XiphosError`] enum.

use std::io;

use thiserror::Error;

/// The main error type for Xiphos operations.
#[derive(Error, Debug)]
pub enum XiphosError {
    /// I/O errors (file operations, blob reads, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage-related errors (missing segments, short reads, closed backends)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Index-related errors (directory inconsistencies, bad snapshots)
    #[error("Index error: {0}")]
    Index(String),

    /// Serialization error (persisted statistics/directory objects)
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with XiphosError.
pub type Result<T> = std::result::Result<T, XiphosError>;

impl XiphosError {
    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        XiphosError::Storage(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        XiphosError::Index(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        XiphosError::Other(format!("Invalid argument: {}", msg.into()))
    }
}

impl From<bincode::Error> for XiphosError {
    fn from(err: bincode::Error) -> Self {
        XiphosError::Serialization(err.to_string())
    }
}
