//! BM25 ranking.
//!
//! The variant used throughout the engine: idf is
//! `ln((N - df + 0.5) / (df + 0.5)) + 1`, which goes negative for terms
//! present in almost every document and is deliberately not clamped.

use std::sync::Arc;

use ahash::AHashMap;

use crate::index::IndexSnapshot;
use crate::postings::DocId;

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Length-normalization strength.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params { k1: 1.5, b: 0.75 }
    }
}

/// BM25 ranker over one index's corpus statistics.
///
/// Construction captures everything the scorer needs; scoring is a pure
/// function of those frozen statistics, safe to call from any number of
/// threads without synchronization.
#[derive(Debug, Clone)]
pub struct Bm25 {
    params: Bm25Params,
    snapshot: Arc<IndexSnapshot>,
    avg_doc_len: f64,
}

impl Bm25 {
    /// Create a ranker over `snapshot` with the given parameters.
    pub fn new(snapshot: Arc<IndexSnapshot>, params: Bm25Params) -> Self {
        let stats = snapshot.stats();
        let avg_doc_len = if stats.doc_count == 0 {
            0.0
        } else {
            stats.total_corpus_terms as f64 / stats.doc_count as f64
        };

        Bm25 {
            params,
            snapshot,
            avg_doc_len,
        }
    }

    /// Average document length in the corpus.
    pub fn avg_doc_len(&self) -> f64 {
        self.avg_doc_len
    }

    /// Inverse document frequency for each query term.
    ///
    /// Unseen terms use a document frequency of 0.
    pub fn idf(&self, terms: &[String]) -> AHashMap<String, f64> {
        let n = self.snapshot.stats().doc_count as f64;
        let mut idf = AHashMap::with_capacity(terms.len());

        for term in terms {
            let df = self.snapshot.document_frequency(term) as f64;
            let value = ((n - df + 0.5) / (df + 0.5)).ln() + 1.0;
            idf.insert(term.clone(), value);
        }

        idf
    }

    /// BM25 contribution of a single term to a single document.
    ///
    /// A document with no recorded length contributes 0: a stale
    /// directory entry must not fail the whole ranking.
    pub fn score_term(&self, term_frequency: u32, doc_id: DocId, idf: f64) -> f64 {
        let doc_len = self.snapshot.doc_length(doc_id);
        if doc_len == 0 {
            return 0.0;
        }

        let tf = term_frequency as f64;
        let norm = (1.0 - self.params.b) + self.params.b * (doc_len as f64 / self.avg_doc_len);
        idf * (tf * (self.params.k1 + 1.0)) / (tf + self.params.k1 * norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexSnapshot, IndexStats, PostingDirectory};

    fn snapshot_with(doc_count: u64, total_terms: u64, lens: &[(DocId, u32)], dfs: &[(&str, u32)]) -> Arc<IndexSnapshot> {
        let mut stats = IndexStats {
            total_corpus_terms: total_terms,
            doc_count,
            ..IndexStats::default()
        };
        for &(doc_id, len) in lens {
            stats.doc_len.insert(doc_id, len);
        }
        for &(term, df) in dfs {
            stats.df.insert(term.to_string(), df);
        }
        Arc::new(IndexSnapshot::from_parts(stats, PostingDirectory::new()))
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_default_params() {
        let params = Bm25Params::default();
        assert_eq!(params.k1, 1.5);
        assert_eq!(params.b, 0.75);
    }

    #[test]
    fn test_idf_formula() {
        // N = 3, df("cat") = 2 -> ln((3 - 2 + 0.5) / (2 + 0.5)) + 1.
        let snapshot = snapshot_with(3, 35, &[(1, 10), (2, 20), (3, 5)], &[("cat", 2)]);
        let bm25 = Bm25::new(snapshot, Bm25Params::default());

        let idf = bm25.idf(&terms(&["cat"]));
        let expected = (1.5f64 / 2.5).ln() + 1.0;
        assert!((idf["cat"] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_idf_unseen_term_uses_zero_df() {
        let snapshot = snapshot_with(10, 100, &[], &[]);
        let bm25 = Bm25::new(snapshot, Bm25Params::default());

        let idf = bm25.idf(&terms(&["unicorn"]));
        let expected = ((10.0f64 + 0.5) / 0.5).ln() + 1.0;
        assert!((idf["unicorn"] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_idf_monotone_non_increasing_in_df() {
        let n = 100;
        let dfs: Vec<(String, u32)> = (0..=n).map(|df| (format!("t{df}"), df)).collect();
        let df_refs: Vec<(&str, u32)> = dfs.iter().map(|(t, df)| (t.as_str(), *df)).collect();
        let snapshot = snapshot_with(n as u64, 1000, &[], &df_refs);
        let bm25 = Bm25::new(snapshot, Bm25Params::default());

        let query: Vec<String> = dfs.iter().map(|(t, _)| t.clone()).collect();
        let idf = bm25.idf(&query);

        let mut prev = f64::INFINITY;
        for df in 0..=n {
            let value = idf[&format!("t{df}")];
            assert!(value <= prev, "idf increased at df={df}");
            prev = value;
        }
    }

    #[test]
    fn test_idf_negative_for_very_common_terms() {
        let snapshot = snapshot_with(100, 1000, &[], &[("ubiquitous", 99)]);
        let bm25 = Bm25::new(snapshot, Bm25Params::default());

        let idf = bm25.idf(&terms(&["ubiquitous"]));
        assert!(idf["ubiquitous"] < 0.0);
    }

    #[test]
    fn test_score_term_zero_for_unknown_document() {
        let snapshot = snapshot_with(3, 35, &[(1, 10)], &[("cat", 1)]);
        let bm25 = Bm25::new(snapshot, Bm25Params::default());

        assert_eq!(bm25.score_term(5, 999, 1.0), 0.0);
    }

    #[test]
    fn test_score_term_value() {
        // N = 3, lengths 10/20/5 -> avgdl = 35/3.
        let snapshot = snapshot_with(3, 35, &[(1, 10), (2, 20), (3, 5)], &[("cat", 2)]);
        let params = Bm25Params::default();
        let bm25 = Bm25::new(snapshot.clone(), params);

        let idf = (1.5f64 / 2.5).ln() + 1.0;
        let avgdl = 35.0 / 3.0;
        let norm = (1.0 - params.b) + params.b * (10.0 / avgdl);
        let expected = idf * (2.0 * (params.k1 + 1.0)) / (2.0 + params.k1 * norm);

        assert!((bm25.score_term(2, 1, idf) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_higher_tf_and_shorter_doc_scores_higher() {
        // Doc 1 (tf 2, len 10) must outrank doc 2 (tf 1, len 20).
        let snapshot = snapshot_with(3, 35, &[(1, 10), (2, 20), (3, 5)], &[("cat", 2)]);
        let bm25 = Bm25::new(snapshot, Bm25Params::default());

        let idf = bm25.idf(&terms(&["cat"]))["cat"];
        assert!(bm25.score_term(2, 1, idf) > bm25.score_term(1, 2, idf));
    }

    #[test]
    fn test_score_concurrent_calls() {
        use rayon::prelude::*;

        let snapshot = snapshot_with(3, 35, &[(1, 10), (2, 20), (3, 5)], &[("cat", 2)]);
        let bm25 = Bm25::new(snapshot, Bm25Params::default());
        let idf = bm25.idf(&terms(&["cat"]))["cat"];

        let scores: Vec<f64> = (0..64)
            .into_par_iter()
            .map(|_| bm25.score_term(2, 1, idf))
            .collect();
        assert!(scores.windows(2).all(|w| w[0] == w[1]));
    }
}
