//! Query fusion engine.
//!
//! A query fans out one posting-retrieval task per (field, term) pair
//! across the body and title indexes, folds the results into per-field
//! BM25 accumulators on the calling thread, and fuses the field scores
//! with page-view and page-rank authority signals into a final ranked
//! list.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::Analyzer;
use crate::authority::AuthoritySignals;
use crate::error::Result;
use crate::index::IndexSnapshot;
use crate::postings::{DocId, Posting};
use crate::ranking::{Bm25, Bm25Params};
use crate::storage::Storage;

/// The two searchable fields of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    /// Article body index.
    Body,
    /// Article title index.
    Title,
}

/// Tunable fusion policy.
///
/// The final score of a candidate document is
///
/// ```text
/// body_weight * bm25_body + title_weight * bm25_title
///   + page_views_weight * log10(page_views + 1)
///   + page_rank_weight  * log10(page_rank + 1)
/// ```
///
/// Authority magnitudes are log-dampened before weighting so a handful
/// of extremely popular documents cannot drown out textual relevance.
/// The defaults are the one policy the test suite pins down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Weight of the body BM25 score.
    pub body_weight: f64,
    /// Weight of the title BM25 score.
    pub title_weight: f64,
    /// Weight of the log-dampened page-view count.
    pub page_views_weight: f64,
    /// Weight of the log-dampened page-rank score.
    pub page_rank_weight: f64,
    /// Maximum number of results returned.
    pub max_results: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            body_weight: 0.5,
            title_weight: 0.5,
            page_views_weight: 1.4,
            page_rank_weight: 0.8,
            max_results: 100,
        }
    }
}

/// One searchable index: its snapshot, ranker, and storage handle.
#[derive(Debug, Clone)]
pub struct FieldIndex {
    snapshot: Arc<IndexSnapshot>,
    bm25: Bm25,
    storage: Arc<dyn Storage>,
}

impl FieldIndex {
    /// Create a field index over a loaded snapshot.
    pub fn new(storage: Arc<dyn Storage>, snapshot: Arc<IndexSnapshot>, params: Bm25Params) -> Self {
        let bm25 = Bm25::new(Arc::clone(&snapshot), params);
        FieldIndex {
            snapshot,
            bm25,
            storage,
        }
    }

    /// The index snapshot.
    pub fn snapshot(&self) -> &Arc<IndexSnapshot> {
        &self.snapshot
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document ID.
    pub doc_id: DocId,
    /// Document title (empty if unknown to the title lookup).
    pub title: String,
    /// Fused score the ranking ordered by.
    pub score: f64,
}

/// The query engine over a body index, a title index, authority signals,
/// and a title lookup.
///
/// All state is read-only after construction; any number of queries may
/// run concurrently against one engine.
pub struct SearchEngine {
    body: FieldIndex,
    title: FieldIndex,
    signals: AuthoritySignals,
    titles: AHashMap<DocId, String>,
    config: FusionConfig,
    analyzer: Box<dyn Analyzer>,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("config", &self.config)
            .field("titles", &self.titles.len())
            .finish()
    }
}

impl SearchEngine {
    /// Create a new engine.
    pub fn new(
        body: FieldIndex,
        title: FieldIndex,
        signals: AuthoritySignals,
        titles: AHashMap<DocId, String>,
        config: FusionConfig,
        analyzer: Box<dyn Analyzer>,
    ) -> Self {
        SearchEngine {
            body,
            title,
            signals,
            titles,
            config,
            analyzer,
        }
    }

    /// The authority signals backing the auxiliary lookup surfaces.
    pub fn signals(&self) -> &AuthoritySignals {
        &self.signals
    }

    /// The active fusion policy.
    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Run a free-text query: normalize, then rank.
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let terms = self.analyzer.analyze(query);
        self.search_terms(&terms)
    }

    /// Rank a pre-tokenized query.
    ///
    /// An empty query returns an empty result without touching storage.
    /// A term absent from an index contributes an empty posting list and
    /// zero score from that index. A failed segment read aborts the
    /// whole query; in-flight retrievals are neither cancelled nor
    /// retried.
    pub fn search_terms(&self, terms: &[String]) -> Result<Vec<SearchHit>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let distinct = distinct_terms(terms);
        let body_idf = self.body.bm25.idf(&distinct);
        let title_idf = self.title.bm25.idf(&distinct);

        let tasks = self.retrieval_tasks(&distinct);
        let retrievals: Vec<(Field, String, Vec<Posting>)> = tasks
            .into_par_iter()
            .map(|(field, term)| {
                let index = self.field(field);
                // Each task resolves through its own reader; handles are
                // released when the task returns.
                let postings = index
                    .snapshot
                    .read_posting_list(index.storage.as_ref(), &term)?;
                Ok((field, term, postings))
            })
            .collect::<Result<_>>()?;

        let (body_scores, title_scores) =
            self.fold_retrievals(retrievals, &body_idf, &title_idf);

        Ok(self.fuse(&body_scores, &title_scores))
    }

    /// The retrieval tasks a distinct-term query fans out: one per
    /// (field, term) pair, body tasks first.
    pub fn retrieval_tasks(&self, distinct: &[String]) -> Vec<(Field, String)> {
        [Field::Body, Field::Title]
            .into_iter()
            .flat_map(|field| distinct.iter().map(move |term| (field, term.clone())))
            .collect()
    }

    /// Fold retrieval results into per-field score accumulators.
    ///
    /// Runs on a single thread; the outcome is independent of the order
    /// the results arrive in, since accumulation is additive per
    /// (field, document).
    pub fn fold_retrievals(
        &self,
        retrievals: Vec<(Field, String, Vec<Posting>)>,
        body_idf: &AHashMap<String, f64>,
        title_idf: &AHashMap<String, f64>,
    ) -> (AHashMap<DocId, f64>, AHashMap<DocId, f64>) {
        let mut body_scores: AHashMap<DocId, f64> = AHashMap::new();
        let mut title_scores: AHashMap<DocId, f64> = AHashMap::new();

        for (field, term, postings) in retrievals {
            let (index, idf_map, scores) = match field {
                Field::Body => (&self.body, body_idf, &mut body_scores),
                Field::Title => (&self.title, title_idf, &mut title_scores),
            };
            let idf = idf_map.get(&term).copied().unwrap_or(0.0);

            for posting in postings {
                *scores.entry(posting.doc_id).or_insert(0.0) +=
                    index.bm25.score_term(posting.term_frequency, posting.doc_id, idf);
            }
        }

        (body_scores, title_scores)
    }

    /// Fuse per-field scores with authority signals into the final
    /// ranked list.
    fn fuse(
        &self,
        body_scores: &AHashMap<DocId, f64>,
        title_scores: &AHashMap<DocId, f64>,
    ) -> Vec<SearchHit> {
        let mut candidates: Vec<DocId> = body_scores
            .keys()
            .chain(title_scores.keys())
            .copied()
            .collect::<AHashSet<DocId>>()
            .into_iter()
            .collect();
        // Ties in fused score keep ascending document-id order.
        candidates.sort_unstable();

        let mut ranked: Vec<SearchHit> = candidates
            .into_iter()
            .map(|doc_id| {
                let bm25 = self.config.body_weight * body_scores.get(&doc_id).copied().unwrap_or(0.0)
                    + self.config.title_weight * title_scores.get(&doc_id).copied().unwrap_or(0.0);

                let views = (self.signals.page_views(doc_id) as f64 + 1.0).log10();
                let rank = (self.signals.page_rank(doc_id) + 1.0).log10();

                let score = bm25
                    + self.config.page_views_weight * views
                    + self.config.page_rank_weight * rank;

                SearchHit {
                    doc_id,
                    title: self.titles.get(&doc_id).cloned().unwrap_or_default(),
                    score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(self.config.max_results);
        ranked
    }

    fn field(&self, field: Field) -> &FieldIndex {
        match field {
            Field::Body => &self.body,
            Field::Title => &self.title,
        }
    }
}

/// Deduplicate terms preserving first-seen order.
pub fn distinct_terms(terms: &[String]) -> Vec<String> {
    let mut seen = AHashSet::with_capacity(terms.len());
    terms
        .iter()
        .filter(|term| seen.insert(term.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::KeywordAnalyzer;
    use crate::index::IndexBuilder;
    use crate::storage::ObjectStorage;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn build_index(docs: &[(DocId, &[&str])], name: &str) -> (Arc<dyn Storage>, Arc<IndexSnapshot>) {
        let storage = ObjectStorage::new(name);
        let mut builder = IndexBuilder::new();
        for &(doc_id, words) in docs {
            builder.add_doc(doc_id, &tokens(words));
        }
        builder.write_postings(&storage, name).unwrap();
        builder.write_stats(&storage, name).unwrap();
        let snapshot = IndexSnapshot::open(&storage, name, &[name]).unwrap();
        let storage: Arc<dyn Storage> = Arc::new(storage);
        (storage, Arc::new(snapshot))
    }

    fn engine(
        body_docs: &[(DocId, &[&str])],
        title_docs: &[(DocId, &[&str])],
        signals: AuthoritySignals,
        config: FusionConfig,
    ) -> SearchEngine {
        let (body_storage, body_snapshot) = build_index(body_docs, "body");
        let (title_storage, title_snapshot) = build_index(title_docs, "title");

        let titles: AHashMap<DocId, String> = body_docs
            .iter()
            .map(|&(doc_id, _)| (doc_id, format!("Document {doc_id}")))
            .collect();

        SearchEngine::new(
            FieldIndex::new(body_storage, body_snapshot, Bm25Params::default()),
            FieldIndex::new(title_storage, title_snapshot, Bm25Params::default()),
            signals,
            titles,
            config,
            Box::new(KeywordAnalyzer::new()),
        )
    }

    fn text_only_config() -> FusionConfig {
        FusionConfig {
            page_views_weight: 0.0,
            page_rank_weight: 0.0,
            ..FusionConfig::default()
        }
    }

    #[test]
    fn test_distinct_terms_preserves_order() {
        let terms = tokens(&["b", "a", "b", "c", "a"]);
        assert_eq!(distinct_terms(&terms), tokens(&["b", "a", "c"]));
    }

    #[test]
    fn test_five_distinct_terms_make_ten_tasks() {
        let engine = engine(
            &[(1, &["cat"])],
            &[(1, &["cat"])],
            AuthoritySignals::new(),
            FusionConfig::default(),
        );

        let distinct = distinct_terms(&tokens(&["a", "b", "c", "d", "e"]));
        let tasks = engine.retrieval_tasks(&distinct);
        assert_eq!(tasks.len(), 10);

        let body_tasks = tasks.iter().filter(|(f, _)| *f == Field::Body).count();
        let title_tasks = tasks.iter().filter(|(f, _)| *f == Field::Title).count();
        assert_eq!(body_tasks, 5);
        assert_eq!(title_tasks, 5);
    }

    #[test]
    fn test_empty_query_returns_empty() {
        let engine = engine(
            &[(1, &["cat"])],
            &[(1, &["cat"])],
            AuthoritySignals::new(),
            FusionConfig::default(),
        );

        assert!(engine.search_terms(&[]).unwrap().is_empty());
        assert!(engine.search("").unwrap().is_empty());
    }

    #[test]
    fn test_cat_scenario_ranks_doc1_over_doc2() {
        // Corpus of 3 documents with lengths 10, 20, 5; "cat" appears in
        // documents 1 and 2 with frequencies 2 and 1.
        let doc1: Vec<&str> = std::iter::repeat_n("cat", 2).chain(std::iter::repeat_n("x", 8)).collect();
        let doc2: Vec<&str> = std::iter::repeat_n("cat", 1).chain(std::iter::repeat_n("y", 19)).collect();
        let doc3: Vec<&str> = std::iter::repeat_n("z", 5).collect();

        let engine = engine(
            &[(1, &doc1), (2, &doc2), (3, &doc3)],
            &[(1, &["alpha"]), (2, &["beta"]), (3, &["gamma"])],
            AuthoritySignals::new(),
            text_only_config(),
        );

        let hits = engine.search_terms(&tokens(&["cat"])).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, 1);
        assert_eq!(hits[1].doc_id, 2);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_unknown_term_yields_no_candidates() {
        let engine = engine(
            &[(1, &["cat"])],
            &[(1, &["cat"])],
            AuthoritySignals::new(),
            FusionConfig::default(),
        );

        let hits = engine.search_terms(&tokens(&["unicorn"])).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_document_in_one_index_only() {
        // "cat" matches doc 1 in the body index and doc 2 in the title
        // index; each uses 0 for the missing field's score.
        let engine = engine(
            &[(1, &["cat", "dog"]), (2, &["dog", "dog"])],
            &[(1, &["other"]), (2, &["cat"])],
            AuthoritySignals::new(),
            text_only_config(),
        );

        let hits = engine.search_terms(&tokens(&["cat"])).unwrap();
        let ids: Vec<DocId> = hits.iter().map(|h| h.doc_id).collect();
        assert!(ids.contains(&1));
        assert!(ids.contains(&2));
    }

    #[test]
    fn test_fold_is_order_independent() {
        let engine = engine(
            &[(1, &["cat", "dog"]), (2, &["cat"]), (3, &["dog", "dog"])],
            &[(1, &["cat"]), (3, &["dog"])],
            AuthoritySignals::new(),
            FusionConfig::default(),
        );

        let distinct = distinct_terms(&tokens(&["cat", "dog"]));
        let body_idf = engine.body.bm25.idf(&distinct);
        let title_idf = engine.title.bm25.idf(&distinct);

        let mut retrievals = Vec::new();
        for (field, term) in engine.retrieval_tasks(&distinct) {
            let index = engine.field(field);
            let postings = index
                .snapshot
                .read_posting_list(index.storage.as_ref(), &term)
                .unwrap();
            retrievals.push((field, term, postings));
        }

        let baseline = engine.fold_retrievals(retrievals.clone(), &body_idf, &title_idf);

        let mut reversed = retrievals.clone();
        reversed.reverse();
        let folded = engine.fold_retrievals(reversed, &body_idf, &title_idf);
        assert_eq!(baseline.0, folded.0);
        assert_eq!(baseline.1, folded.1);

        // An interleaving permutation as well.
        let mut interleaved = Vec::new();
        let mid = retrievals.len() / 2;
        let (front, back) = retrievals.split_at(mid);
        for (a, b) in back.iter().zip(front.iter()) {
            interleaved.push(b.clone());
            interleaved.push(a.clone());
        }
        for rest in back.iter().skip(front.len()) {
            interleaved.push(rest.clone());
        }
        let folded = engine.fold_retrievals(interleaved, &body_idf, &title_idf);
        assert_eq!(baseline.0, folded.0);
        assert_eq!(baseline.1, folded.1);
    }

    #[test]
    fn test_authority_signals_break_text_ties() {
        let mut views = AHashMap::new();
        views.insert(2u32, 9_999u64);

        let engine = engine(
            // Identical body text: identical BM25 scores.
            &[(1, &["cat", "dog"]), (2, &["cat", "dog"])],
            &[(1, &["one"]), (2, &["two"])],
            AuthoritySignals::from_parts(views, AHashMap::new()),
            FusionConfig::default(),
        );

        let hits = engine.search_terms(&tokens(&["cat"])).unwrap();
        assert_eq!(hits[0].doc_id, 2);
    }

    #[test]
    fn test_tied_scores_keep_doc_id_order() {
        let engine = engine(
            &[(5, &["cat"]), (2, &["cat"]), (9, &["cat"])],
            &[(5, &["a"]), (2, &["b"]), (9, &["c"])],
            AuthoritySignals::new(),
            text_only_config(),
        );

        // All three documents have identical statistics, so their fused
        // scores tie exactly.
        let hits = engine.search_terms(&tokens(&["cat"])).unwrap();
        let ids: Vec<DocId> = hits.iter().map(|h| h.doc_id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn test_max_results_truncates() {
        let docs: Vec<(DocId, Vec<&str>)> = (1..=20).map(|id| (id, vec!["cat"])).collect();
        let doc_refs: Vec<(DocId, &[&str])> =
            docs.iter().map(|(id, words)| (*id, words.as_slice())).collect();

        let config = FusionConfig {
            max_results: 5,
            ..text_only_config()
        };
        let engine = engine(&doc_refs, &[(1, &["x"])], AuthoritySignals::new(), config);

        let hits = engine.search_terms(&tokens(&["cat"])).unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn test_titles_resolved_on_hits() {
        let engine = engine(
            &[(1, &["cat"])],
            &[(1, &["cat"])],
            AuthoritySignals::new(),
            text_only_config(),
        );

        let hits = engine.search_terms(&tokens(&["cat"])).unwrap();
        assert_eq!(hits[0].title, "Document 1");
    }
}
