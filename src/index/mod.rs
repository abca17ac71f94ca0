//! Inverted index build, persistence, and read-back.
//!
//! Build time: documents stream through an [`IndexBuilder`], which
//! accumulates corpus statistics and in-memory posting buffers, then
//! flushes posting bytes through the segmented block store and persists
//! the statistics and the term-to-locations directory.
//!
//! Query time: an [`IndexSnapshot`] is loaded once per process, shared
//! read-only across all concurrent queries, and resolves terms to
//! posting lists on demand.

pub mod builder;
pub mod snapshot;

pub use builder::IndexBuilder;
pub use snapshot::{IndexSnapshot, IndexStats, PostingDirectory, ShardDirectory};
