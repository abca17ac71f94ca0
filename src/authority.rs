//! External authority signals: page views and page rank.
//!
//! Both signals are opaque `document_id -> score` tables supplied fully
//! built, loaded into memory before queries begin, and read-only
//! afterwards. Absent entries read as zero.

use std::io::BufRead;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::postings::DocId;
use crate::storage::Storage;

/// Canonical blob name of the persisted page-view table.
pub const PAGE_VIEWS_FILE: &str = "page_views.bin";

/// Canonical blob name of the page-rank CSV export.
pub const PAGE_RANK_FILE: &str = "pagerank.csv";

/// Read-only authority-signal tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthoritySignals {
    page_views: AHashMap<DocId, u64>,
    page_rank: AHashMap<DocId, f64>,
}

impl AuthoritySignals {
    /// Empty tables: every lookup yields zero.
    pub fn new() -> Self {
        AuthoritySignals::default()
    }

    /// Assemble from already-loaded tables.
    pub fn from_parts(page_views: AHashMap<DocId, u64>, page_rank: AHashMap<DocId, f64>) -> Self {
        AuthoritySignals {
            page_views,
            page_rank,
        }
    }

    /// Load both tables from storage.
    ///
    /// Either blob may be absent, in which case that table is empty; the
    /// engine then behaves as if every document had a zero signal.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        let page_views = if storage.file_exists(PAGE_VIEWS_FILE) {
            let mut input = storage.open_input(PAGE_VIEWS_FILE)?;
            bincode::deserialize_from(&mut input)?
        } else {
            AHashMap::new()
        };

        let page_rank = if storage.file_exists(PAGE_RANK_FILE) {
            let input = storage.open_input(PAGE_RANK_FILE)?;
            parse_page_rank_csv(std::io::BufReader::new(input))?
        } else {
            AHashMap::new()
        };

        Ok(AuthoritySignals {
            page_views,
            page_rank,
        })
    }

    /// Persist the page-view table.
    pub fn write_page_views(&self, storage: &dyn Storage) -> Result<()> {
        let mut output = storage.create_output(PAGE_VIEWS_FILE)?;
        bincode::serialize_into(&mut output, &self.page_views)?;
        output.close()?;
        Ok(())
    }

    /// Page-view count for a document (0 if unknown).
    pub fn page_views(&self, doc_id: DocId) -> u64 {
        self.page_views.get(&doc_id).copied().unwrap_or(0)
    }

    /// Page-rank score for a document (0.0 if unknown).
    pub fn page_rank(&self, doc_id: DocId) -> f64 {
        self.page_rank.get(&doc_id).copied().unwrap_or(0.0)
    }

    /// Batch page-view lookup, one entry per requested id.
    pub fn page_views_for(&self, doc_ids: &[DocId]) -> Vec<u64> {
        doc_ids.iter().map(|&id| self.page_views(id)).collect()
    }

    /// Batch page-rank lookup, one entry per requested id.
    pub fn page_rank_for(&self, doc_ids: &[DocId]) -> Vec<f64> {
        doc_ids.iter().map(|&id| self.page_rank(id)).collect()
    }
}

/// Parse a `doc_id,rank` CSV export into a page-rank table.
///
/// Malformed lines are skipped, not errors: the export format carries
/// the occasional header or truncated line.
pub fn parse_page_rank_csv<R: BufRead>(reader: R) -> Result<AHashMap<DocId, f64>> {
    let mut page_rank = AHashMap::new();

    for line in reader.lines() {
        let line = line?;
        let Some((doc_id, rank)) = line.trim().split_once(',') else {
            continue;
        };
        let (Ok(doc_id), Ok(rank)) = (doc_id.parse::<DocId>(), rank.parse::<f64>()) else {
            continue;
        };
        page_rank.insert(doc_id, rank);
    }

    Ok(page_rank)
}
