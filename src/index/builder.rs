//! Build-time accumulation and flush.

use ahash::AHashMap;

use crate::error::Result;
use crate::index::snapshot::{directory_file_name, IndexStats, ShardDirectory};
use crate::postings::{encode_posting_list, DocId, Posting};
use crate::segment::{SegmentLocation, SegmentWriter, BLOCK_SIZE};
use crate::storage::Storage;

/// In-memory accumulator for one index shard.
///
/// Build is strictly single-threaded per shard: `add_doc` each document
/// exactly once, then flush. Re-adding a document id double-counts every
/// statistic; uniqueness is the caller's precondition, not checked here.
/// Concurrent builders may run on disjoint document ranges as long as
/// each flushes to a distinct shard name.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    /// Aggregate token count across all added documents.
    total_corpus_terms: u64,
    /// Number of documents added.
    doc_count: u64,
    /// Per-document token counts.
    doc_len: AHashMap<DocId, u32>,
    /// Per-term document frequency.
    df: AHashMap<String, u32>,
    /// Per-term aggregate occurrence count.
    term_total: AHashMap<String, u64>,
    /// Per-term posting buffers, in document ingestion order.
    postings: AHashMap<String, Vec<Posting>>,
}

impl IndexBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        IndexBuilder::default()
    }

    /// Add one document's full ordered token sequence.
    pub fn add_doc(&mut self, doc_id: DocId, tokens: &[String]) {
        self.total_corpus_terms += tokens.len() as u64;
        self.doc_count += 1;
        self.doc_len.insert(doc_id, tokens.len() as u32);

        let mut counts: AHashMap<&str, u32> = AHashMap::new();
        for token in tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        for (term, count) in counts {
            *self.df.entry(term.to_string()).or_insert(0) += 1;
            *self.term_total.entry(term.to_string()).or_insert(0) += count as u64;
            self.postings
                .entry(term.to_string())
                .or_default()
                .push(Posting::new(doc_id, count));
        }
    }

    /// Number of documents added so far.
    pub fn doc_count(&self) -> u64 {
        self.doc_count
    }

    /// Aggregate token count across added documents.
    pub fn total_corpus_terms(&self) -> u64 {
        self.total_corpus_terms
    }

    /// Document frequency of `term` (0 if unseen).
    pub fn document_frequency(&self, term: &str) -> u32 {
        self.df.get(term).copied().unwrap_or(0)
    }

    /// The in-memory posting buffer for `term`, if any.
    pub fn posting_list(&self, term: &str) -> Option<&[Posting]> {
        self.postings.get(term).map(|p| p.as_slice())
    }

    /// Flush all posting buffers to segment files under `shard` and
    /// persist the shard's posting-location directory.
    ///
    /// Terms are written in lexicographic order so a given batch always
    /// produces an identical segment layout.
    pub fn write_postings(&self, storage: &dyn Storage, shard: &str) -> Result<()> {
        self.write_postings_with_capacity(storage, shard, BLOCK_SIZE)
    }

    /// [`write_postings`](Self::write_postings) with an explicit segment
    /// capacity.
    pub fn write_postings_with_capacity(
        &self,
        storage: &dyn Storage,
        shard: &str,
        capacity: u64,
    ) -> Result<()> {
        let mut posting_locs: AHashMap<String, Vec<SegmentLocation>> = AHashMap::new();

        let mut terms: Vec<&String> = self.postings.keys().collect();
        terms.sort();

        let mut writer = SegmentWriter::with_capacity(storage, shard, capacity)?;
        for term in terms {
            let bytes = encode_posting_list(&self.postings[term]);
            let locs = writer.write(&bytes)?;
            posting_locs.entry(term.clone()).or_default().extend(locs);
        }
        writer.close()?;

        // The capacity travels with the directory so readers always
        // resolve locations against the layout that was written.
        let directory = ShardDirectory {
            capacity,
            terms: posting_locs,
        };
        let mut output = storage.create_output(&directory_file_name(shard))?;
        bincode::serialize_into(&mut output, &directory)?;
        output.close()?;

        Ok(())
    }

    /// Persist the aggregate statistics object as `{name}.stats`.
    ///
    /// Deliberately decoupled from the (much larger) posting segments so
    /// query-serving startup can load it without touching them.
    pub fn write_stats(&self, storage: &dyn Storage, name: &str) -> Result<()> {
        let stats = IndexStats {
            total_corpus_terms: self.total_corpus_terms,
            doc_count: self.doc_count,
            doc_len: self.doc_len.clone(),
            df: self.df.clone(),
            term_total: self.term_total.clone(),
        };
        stats.write(storage, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_add_doc_accumulates_statistics() {
        let mut builder = IndexBuilder::new();
        builder.add_doc(1, &tokens(&["cat", "dog", "cat"]));
        builder.add_doc(2, &tokens(&["cat"]));

        assert_eq!(builder.doc_count(), 2);
        assert_eq!(builder.total_corpus_terms(), 4);
        assert_eq!(builder.document_frequency("cat"), 2);
        assert_eq!(builder.document_frequency("dog"), 1);
        assert_eq!(builder.document_frequency("fish"), 0);
    }

    #[test]
    fn test_posting_list_matches_document_frequency() {
        let mut builder = IndexBuilder::new();
        builder.add_doc(1, &tokens(&["cat", "cat"]));
        builder.add_doc(2, &tokens(&["cat", "dog"]));
        builder.add_doc(3, &tokens(&["dog"]));

        for term in ["cat", "dog"] {
            let list = builder.posting_list(term).unwrap();
            assert_eq!(list.len() as u32, builder.document_frequency(term));
        }
    }

    #[test]
    fn test_postings_preserve_ingestion_order() {
        let mut builder = IndexBuilder::new();
        builder.add_doc(10, &tokens(&["cat", "cat"]));
        builder.add_doc(3, &tokens(&["cat"]));
        builder.add_doc(7, &tokens(&["cat", "cat", "cat"]));

        let list = builder.posting_list("cat").unwrap();
        assert_eq!(
            list,
            &[
                Posting::new(10, 2),
                Posting::new(3, 1),
                Posting::new(7, 3),
            ]
        );
    }

    #[test]
    fn test_empty_document_counts() {
        let mut builder = IndexBuilder::new();
        builder.add_doc(1, &[]);

        assert_eq!(builder.doc_count(), 1);
        assert_eq!(builder.total_corpus_terms(), 0);
    }
}
