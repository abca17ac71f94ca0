//! Persisted index statistics, posting directory, and read-back.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, XiphosError};
use crate::postings::{decode_posting_list, DocId, Posting, TUPLE_SIZE};
use crate::segment::{SegmentLocation, SegmentReader, BLOCK_SIZE};
use crate::storage::Storage;

/// The term-to-locations directory for posting retrieval.
pub type PostingDirectory = AHashMap<String, Vec<SegmentLocation>>;

/// Persisted form of one shard's `{shard}_posting_locs.bin` object.
///
/// Carries the segment capacity the shard was flushed with, so readers
/// always resolve locations against the layout the writer produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardDirectory {
    /// Segment capacity used when the shard's postings were flushed.
    pub capacity: u64,
    /// Term-to-locations directory for the shard.
    pub terms: PostingDirectory,
}

/// File name of an index's statistics object.
pub fn stats_file_name(name: &str) -> String {
    format!("{name}.stats")
}

/// File name of a shard's posting-location directory.
pub fn directory_file_name(shard: &str) -> String {
    format!("{shard}_posting_locs.bin")
}

/// Aggregate corpus statistics, persisted separately from posting bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Aggregate token count across the corpus.
    pub total_corpus_terms: u64,
    /// Total document count (`N`).
    pub doc_count: u64,
    /// Per-document token counts.
    pub doc_len: AHashMap<DocId, u32>,
    /// Per-term document frequency.
    pub df: AHashMap<String, u32>,
    /// Per-term aggregate occurrence count.
    pub term_total: AHashMap<String, u64>,
}

impl IndexStats {
    /// Persist to `{name}.stats`.
    pub fn write(&self, storage: &dyn Storage, name: &str) -> Result<()> {
        let mut output = storage.create_output(&stats_file_name(name))?;
        bincode::serialize_into(&mut output, self)?;
        output.close()?;
        Ok(())
    }

    /// Load from `{name}.stats`.
    pub fn read(storage: &dyn Storage, name: &str) -> Result<Self> {
        let mut input = storage.open_input(&stats_file_name(name))?;
        let stats = bincode::deserialize_from(&mut input)?;
        Ok(stats)
    }
}

/// A read-only view of one built index: statistics plus the merged
/// posting directory.
///
/// Loaded once per process lifetime and shared (via `Arc`) by all
/// concurrent query threads; nothing on the query path mutates it.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    stats: IndexStats,
    directory: PostingDirectory,
    capacity: u64,
}

impl IndexSnapshot {
    /// Assemble a snapshot from already-loaded parts, assuming the
    /// default segment capacity.
    pub fn from_parts(stats: IndexStats, directory: PostingDirectory) -> Self {
        IndexSnapshot {
            stats,
            directory,
            capacity: BLOCK_SIZE,
        }
    }

    /// Load the statistics object `{name}.stats` and merge the directory
    /// objects of `shards`, in the order given.
    ///
    /// Shards are expected to cover disjoint term sets (the build
    /// partitions terms across shards); if a term does appear in several
    /// shards, its locations concatenate in shard order. All shards must
    /// have been flushed with the same segment capacity.
    pub fn open(storage: &dyn Storage, name: &str, shards: &[&str]) -> Result<Self> {
        let stats = IndexStats::read(storage, name)?;

        let mut directory = PostingDirectory::new();
        let mut capacity = None;
        for shard in shards {
            let mut input = storage.open_input(&directory_file_name(shard))?;
            let shard_dir: ShardDirectory = bincode::deserialize_from(&mut input)?;

            match capacity {
                None => capacity = Some(shard_dir.capacity),
                Some(expected) if expected != shard_dir.capacity => {
                    return Err(XiphosError::index(format!(
                        "shard {shard} segment capacity {} differs from {expected}",
                        shard_dir.capacity
                    )));
                }
                Some(_) => {}
            }

            for (term, locs) in shard_dir.terms {
                directory.entry(term).or_default().extend(locs);
            }
        }

        Ok(IndexSnapshot {
            stats,
            directory,
            capacity: capacity.unwrap_or(BLOCK_SIZE),
        })
    }

    /// The segment capacity this snapshot's postings were flushed with.
    pub fn segment_capacity(&self) -> u64 {
        self.capacity
    }

    /// The aggregate statistics.
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Whether the directory has postings for `term`.
    pub fn contains_term(&self, term: &str) -> bool {
        self.directory.contains_key(term)
    }

    /// Document frequency of `term` (0 if unseen).
    pub fn document_frequency(&self, term: &str) -> u32 {
        self.stats.df.get(term).copied().unwrap_or(0)
    }

    /// Recorded length of a document (0 if unknown).
    pub fn doc_length(&self, doc_id: DocId) -> u32 {
        self.stats.doc_len.get(&doc_id).copied().unwrap_or(0)
    }

    /// Number of distinct terms in the directory.
    pub fn term_count(&self) -> usize {
        self.directory.len()
    }

    /// Read the full posting list for `term`.
    ///
    /// A term absent from the directory yields an empty list: a missing
    /// term signals zero matches, not an error. Present terms read
    /// exactly `df * TUPLE_SIZE` bytes through a fresh segment reader
    /// (configured with the snapshot's persisted segment capacity) whose
    /// handles are released on return.
    pub fn read_posting_list(&self, storage: &dyn Storage, term: &str) -> Result<Vec<Posting>> {
        let mut reader = SegmentReader::with_capacity(storage, self.capacity);
        self.read_posting_list_with(&mut reader, term)
    }

    /// Read the posting list for `term` through an existing reader.
    ///
    /// The reader's capacity must match [`segment_capacity`](Self::segment_capacity).
    pub fn read_posting_list_with(
        &self,
        reader: &mut SegmentReader<'_>,
        term: &str,
    ) -> Result<Vec<Posting>> {
        let Some(locs) = self.directory.get(term) else {
            return Ok(Vec::new());
        };

        let df = self.document_frequency(term) as usize;
        let bytes = reader.read(locs, df * TUPLE_SIZE)?;
        decode_posting_list(&bytes, df)
    }

    /// Iterate every `(term, posting_list)` in the directory through one
    /// shared reader. Intended for offline consumers (validation, stats).
    pub fn posting_lists<'a>(&'a self, storage: &'a dyn Storage) -> PostingLists<'a> {
        PostingLists {
            snapshot: self,
            reader: SegmentReader::with_capacity(storage, self.capacity),
            terms: self.directory.keys(),
        }
    }
}

/// Iterator over all posting lists of a snapshot.
pub struct PostingLists<'a> {
    snapshot: &'a IndexSnapshot,
    reader: SegmentReader<'a>,
    terms: std::collections::hash_map::Keys<'a, String, Vec<SegmentLocation>>,
}

impl Iterator for PostingLists<'_> {
    type Item = Result<(String, Vec<Posting>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let term = self.terms.next()?;
        Some(
            self.snapshot
                .read_posting_list_with(&mut self.reader, term)
                .map(|postings| (term.clone(), postings)),
        )
    }
}
