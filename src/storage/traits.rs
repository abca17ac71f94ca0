//! Storage abstraction trait and common types.

use std::io::{Read, Seek, Write};

use crate::error::{Result, XiphosError};

/// A trait for storage backends that can store and retrieve named blobs.
///
/// This provides a pluggable interface over byte-addressable storage:
/// a local filesystem directory or a remote object-store bucket. Both
/// flavors expose the same open/seek/read/write semantics, so the rest
/// of the engine never depends on a concrete backend.
///
/// A backend handle is constructed once at process start and passed by
/// reference into every component that performs I/O.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open a named blob for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create a named blob for writing, truncating any existing content.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a named blob exists.
    fn file_exists(&self, name: &str) -> bool;

    /// List all blob names in the storage.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get the size of a blob in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// The logical name this input was opened under.
    ///
    /// Every backend sets this uniformly when it constructs the handle;
    /// callers never probe the concrete type for it.
    fn name(&self) -> &str;

    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// The logical name this output was opened under.
    fn name(&self) -> &str;

    /// The current write position in the output stream.
    fn position(&self) -> u64;

    /// Flush buffered bytes and finish the blob.
    fn close(&mut self) -> Result<()>;
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Blob not found.
    FileNotFound(String),

    /// I/O error.
    IoError(String),

    /// A read returned fewer bytes than the directory implies.
    ShortRead { name: String, expected: usize },
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
            StorageError::ShortRead { name, expected } => {
                write!(f, "Short read from {name}: expected {expected} bytes")
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for XiphosError {
    fn from(err: StorageError) -> Self {
        XiphosError::storage(err.to_string())
    }
}
