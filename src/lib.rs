//! # Xiphos
//!
//! A document search engine over a large, static text corpus.
//!
//! ## Features
//!
//! - Write-once, segmented binary posting-list storage
//! - Offset-indexed posting directory over pluggable storage backends
//! - BM25 scoring fused with external authority signals
//! - Concurrent per-term posting retrieval at query time
//! - Pluggable text normalization

pub mod analysis;
pub mod authority;
pub mod cli;
pub mod error;
pub mod index;
pub mod postings;
pub mod ranking;
pub mod search;
pub mod segment;
pub mod storage;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
