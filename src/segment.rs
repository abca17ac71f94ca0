//! Segmented block store.
//!
//! Posting bytes for an index shard are laid out as a sequential byte
//! stream split across fixed-capacity segment files named
//! `{stream}_{seq:03}.bin`. The writer returns `(segment, offset)`
//! locations for every chunk it places; the reader resolves those
//! locations back into the original bytes. Segments are append-only and
//! immutable once fully written.

use std::collections::hash_map::Entry;
use std::io::{Read, Seek, SeekFrom};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, XiphosError};
use crate::storage::traits::{Storage, StorageError, StorageInput, StorageOutput};

/// Maximum capacity of one segment file in bytes.
///
/// A multiple of the posting tuple size, so a posting never straddles a
/// segment boundary unless the write itself does.
pub const BLOCK_SIZE: u64 = 1_999_998;

/// Where one contiguous chunk of a logical byte run was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLocation {
    /// Segment file name.
    pub segment: String,
    /// Byte offset within the segment, in `[0, capacity)`.
    pub offset: u64,
}

impl SegmentLocation {
    /// Create a new location.
    pub fn new<S: Into<String>>(segment: S, offset: u64) -> Self {
        SegmentLocation {
            segment: segment.into(),
            offset,
        }
    }
}

/// Deterministic segment file name for a stream and sequence number.
pub fn segment_name(stream: &str, seq: u32) -> String {
    format!("{stream}_{seq:03}.bin")
}

/// Sequential writer that spreads a byte stream over segment files.
///
/// The writer never rewinds: each write appends to the current segment,
/// rolling over to the next sequence number whenever the current segment
/// reaches capacity. A write that lands exactly at capacity leaves the
/// segment full; the next write opens a fresh segment before placing any
/// bytes.
pub struct SegmentWriter<'a> {
    storage: &'a dyn Storage,
    stream: String,
    capacity: u64,
    seq: u32,
    current: Box<dyn StorageOutput>,
}

impl<'a> SegmentWriter<'a> {
    /// Open segment 0 of `stream` with the default capacity.
    pub fn new(storage: &'a dyn Storage, stream: &str) -> Result<Self> {
        Self::with_capacity(storage, stream, BLOCK_SIZE)
    }

    /// Open segment 0 of `stream` with an explicit capacity.
    ///
    /// Readers of the stream must be configured with the same capacity.
    pub fn with_capacity(storage: &'a dyn Storage, stream: &str, capacity: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(XiphosError::invalid_argument("segment capacity must be > 0"));
        }
        let current = storage.create_output(&segment_name(stream, 0))?;
        Ok(SegmentWriter {
            storage,
            stream: stream.to_string(),
            capacity,
            seq: 0,
            current,
        })
    }

    /// Append `buf`, returning the ordered locations of each placed chunk.
    ///
    /// Chunk boundaries occur only at segment boundaries or at the end of
    /// the buffer; every returned chunk is non-empty. Concatenating reads
    /// of the returned locations, in order, reproduces `buf` exactly.
    pub fn write(&mut self, mut buf: &[u8]) -> Result<Vec<SegmentLocation>> {
        let mut locs = Vec::new();

        while !buf.is_empty() {
            let mut pos = self.current.position();
            if pos == self.capacity {
                self.roll_over()?;
                pos = 0;
            }

            let remaining = (self.capacity - pos) as usize;
            let take = remaining.min(buf.len());
            self.current.write_all(&buf[..take])?;

            locs.push(SegmentLocation::new(self.current.name(), pos));
            buf = &buf[take..];
        }

        Ok(locs)
    }

    /// Close the current segment, finishing the stream.
    pub fn close(&mut self) -> Result<()> {
        self.current.close()
    }

    fn roll_over(&mut self) -> Result<()> {
        self.current.close()?;
        self.seq += 1;
        self.current = self
            .storage
            .create_output(&segment_name(&self.stream, self.seq))?;
        Ok(())
    }
}

impl std::fmt::Debug for SegmentWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentWriter")
            .field("stream", &self.stream)
            .field("capacity", &self.capacity)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Reader that resolves segment locations back into bytes.
///
/// Opened segment handles are cached for the lifetime of the reader and
/// released when it is dropped; a reader instance is never shared across
/// concurrent queries.
pub struct SegmentReader<'a> {
    storage: &'a dyn Storage,
    capacity: u64,
    open: AHashMap<String, Box<dyn StorageInput>>,
}

impl<'a> SegmentReader<'a> {
    /// Create a reader over `storage` with the default segment capacity.
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self::with_capacity(storage, BLOCK_SIZE)
    }

    /// Create a reader with an explicit segment capacity.
    pub fn with_capacity(storage: &'a dyn Storage, capacity: u64) -> Self {
        SegmentReader {
            storage,
            capacity,
            open: AHashMap::new(),
        }
    }

    /// Read `n_bytes` spread over `locs`, concatenated in the given order.
    ///
    /// The location order must match the order the writer produced, since
    /// a single logical byte run may be split across entries. A missing
    /// segment or a short read is a fatal storage error: the directory is
    /// assumed consistent with the stored segments, so neither is retried.
    pub fn read(&mut self, locs: &[SegmentLocation], n_bytes: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n_bytes);
        let mut remaining = n_bytes;

        for loc in locs {
            if remaining == 0 {
                break;
            }
            if loc.offset >= self.capacity {
                return Err(XiphosError::index(format!(
                    "location offset {} out of range for segment {}",
                    loc.offset, loc.segment
                )));
            }

            let input = match self.open.entry(loc.segment.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(self.storage.open_input(&loc.segment)?),
            };

            input.seek(SeekFrom::Start(loc.offset))?;
            let n_read = remaining.min((self.capacity - loc.offset) as usize);

            let start = out.len();
            out.resize(start + n_read, 0);
            input.read_exact(&mut out[start..]).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    XiphosError::from(StorageError::ShortRead {
                        name: loc.segment.clone(),
                        expected: n_read,
                    })
                } else {
                    XiphosError::from(e)
                }
            })?;

            remaining -= n_read;
        }

        Ok(out)
    }

    /// Number of segment handles currently cached.
    pub fn open_handles(&self) -> usize {
        self.open.len()
    }
}

impl std::fmt::Debug for SegmentReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("capacity", &self.capacity)
            .field("open", &self.open.len())
            .finish()
    }
}
