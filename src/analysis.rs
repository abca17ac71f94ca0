//! Text normalization.
//!
//! The engine consumes pre-tokenized, normalized terms; everything about
//! how raw text becomes terms sits behind the [`Analyzer`] trait so
//! callers can swap in their own pipeline (stemming, different stopword
//! policies) without the core knowing.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

/// A deterministic `raw text -> ordered normalized terms` function.
pub trait Analyzer: Send + Sync + std::fmt::Debug {
    /// Normalize `text` into an ordered sequence of terms.
    fn analyze(&self, text: &str) -> Vec<String>;
}

lazy_static! {
    /// Word pattern: a word/hash/at character followed by 2 to 24 more
    /// word characters, allowing internal apostrophes and hyphens.
    static ref RE_WORD: Regex = Regex::new(r"[\#\@\w](['\-]?\w){2,24}").unwrap();

    /// English stopwords plus corpus-specific noise terms.
    static ref STOPWORDS: HashSet<&'static str> = [
        // English
        "a", "about", "above", "after", "again", "against", "all", "am",
        "an", "and", "any", "are", "as", "at", "be", "because", "been",
        "before", "being", "below", "between", "both", "but", "by", "can",
        "did", "do", "does", "doing", "down", "during", "each", "few",
        "for", "from", "further", "had", "has", "have", "having", "he",
        "her", "here", "hers", "herself", "him", "himself", "his", "how",
        "i", "if", "in", "into", "is", "it", "its", "itself", "just",
        "me", "more", "most", "my", "myself", "no", "nor", "not", "now",
        "of", "off", "on", "once", "only", "or", "other", "our", "ours",
        "ourselves", "out", "over", "own", "same", "she", "should", "so",
        "some", "such", "than", "that", "the", "their", "theirs", "them",
        "themselves", "then", "there", "these", "they", "this", "those",
        "through", "to", "too", "under", "until", "up", "very", "was",
        "we", "were", "what", "when", "where", "which", "while", "who",
        "whom", "why", "will", "with", "you", "your", "yours", "yourself",
        "yourselves",
        // Corpus noise
        "category", "references", "also", "external", "links", "may",
        "first", "see", "history", "people", "one", "two", "part",
        "thumb", "including", "second", "following", "many", "however",
        "would", "became",
    ]
    .into_iter()
    .collect();
}

/// Case-folding, word-pattern tokenizer with stopword removal.
///
/// Stemming is deliberately not applied here; pipelines that stem wrap
/// this analyzer.
#[derive(Debug, Clone, Default)]
pub struct StandardAnalyzer;

impl StandardAnalyzer {
    /// Create a new standard analyzer.
    pub fn new() -> Self {
        StandardAnalyzer
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        RE_WORD
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|token| !STOPWORDS.contains(token))
            .map(|token| token.to_string())
            .collect()
    }
}

/// Whitespace-splitting passthrough for already-normalized input.
#[derive(Debug, Clone, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    /// Create a new keyword analyzer.
    pub fn new() -> Self {
        KeywordAnalyzer
    }
}

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(|t| t.to_string()).collect()
    }
}
