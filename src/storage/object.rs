//! Object-bucket storage implementation.
//!
//! Models a remote object store as a bucket of named, immutable blobs.
//! Blobs live in process memory; the remote transport itself is an
//! external collaborator, and this backend gives the rest of the engine
//! the same open/seek/read/write semantics as [`FileStorage`].
//!
//! [`FileStorage`]: crate::storage::FileStorage

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::Result;
use crate::storage::traits::{Storage, StorageError, StorageInput, StorageOutput};

type Bucket = Arc<RwLock<AHashMap<String, Arc<[u8]>>>>;

/// An object-bucket storage backend.
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    /// Bucket name, used only for diagnostics.
    bucket_name: String,
    /// The blobs stored in the bucket.
    blobs: Bucket,
}

impl ObjectStorage {
    /// Create a new empty bucket.
    pub fn new<S: Into<String>>(bucket_name: S) -> Self {
        ObjectStorage {
            bucket_name: bucket_name.into(),
            blobs: Arc::new(RwLock::new(AHashMap::new())),
        }
    }

    /// The bucket name.
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Number of blobs in the bucket.
    pub fn blob_count(&self) -> usize {
        self.blobs.read().len()
    }
}

impl Storage for ObjectStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let blobs = self.blobs.read();
        let data = blobs
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;

        Ok(Box::new(ObjectInput {
            name: name.to_string(),
            cursor: Cursor::new(data),
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        Ok(Box::new(ObjectOutput {
            name: name.to_string(),
            buffer: Vec::new(),
            blobs: Arc::clone(&self.blobs),
            closed: false,
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.blobs.read().contains_key(name)
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.blobs.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        let blobs = self.blobs.read();
        let data = blobs
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;
        Ok(data.len() as u64)
    }
}

/// A readable view over one blob.
#[derive(Debug)]
struct ObjectInput {
    name: String,
    cursor: Cursor<Arc<[u8]>>,
}

impl Read for ObjectInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for ObjectInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl StorageInput for ObjectInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> Result<u64> {
        Ok(self.cursor.get_ref().len() as u64)
    }
}

/// A write buffer that becomes a blob on close.
///
/// The blob appears in the bucket only once the writer closes, matching
/// object-store upload semantics where partially written objects are
/// never visible.
#[derive(Debug)]
struct ObjectOutput {
    name: String,
    buffer: Vec<u8>,
    blobs: Bucket,
    closed: bool,
}

impl Write for ObjectOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.closed {
            return Err(std::io::Error::other("output already closed"));
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for ObjectOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn position(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            let data: Arc<[u8]> = std::mem::take(&mut self.buffer).into();
            self.blobs.write().insert(self.name.clone(), data);
        }
        Ok(())
    }
}

impl Drop for ObjectOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
