//! BM25 lexical index.
//!
//! Wraps the [`bm25`](https://crates.io/crates/bm25) crate. Because BM25's
//! inverse-document-frequency terms depend on corpus-wide statistics, the
//! index is rebuilt from the full document list on every mutation rather
//! than patched incrementally; [`KeywordIndex::build`] is the only
//! constructor that sees documents.

use bm25::{Document as Bm25Document, Language, SearchEngineBuilder};
use tracing::instrument;

/// Term-frequency ranker over the corpus.
///
/// Entries are identified by corpus position, matching
/// [`VectorIndex`](super::vector::VectorIndex). Not thread-safe on its own;
/// the owning handle serializes access.
pub struct KeywordIndex {
    engine: bm25::SearchEngine<u64>,
    len: usize,
}

impl KeywordIndex {
    /// Creates an index over an empty corpus.
    pub fn new() -> Self {
        Self::build(std::iter::empty())
    }

    /// Builds a fresh index from the full corpus, in position order.
    ///
    /// Corpus-wide term statistics (IDF, average length) are computed here,
    /// which is why mutation means rebuild.
    #[instrument(skip_all)]
    pub fn build<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let docs: Vec<Bm25Document<u64>> = texts
            .into_iter()
            .enumerate()
            .map(|(position, text)| Bm25Document {
                id: position as u64,
                contents: text.to_string(),
            })
            .collect();
        let len = docs.len();
        let engine = SearchEngineBuilder::<u64>::with_documents(Language::English, docs).build();

        Self { engine, len }
    }

    /// Returns up to `k` matches as `(position, score)` pairs, best first.
    ///
    /// Zero-relevance candidates are discarded: a document with no query
    /// term overlap never appears, so fusion only sees genuine lexical
    /// evidence. Empty queries and empty corpora yield empty results.
    pub fn search(&self, query: &str, k: usize) -> Vec<(u64, f32)> {
        self.engine
            .search(query, k)
            .into_iter()
            .filter(|result| result.score > 0.0)
            .map(|result| (result.document.id, result.score))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for KeywordIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(texts: &[&str]) -> KeywordIndex {
        KeywordIndex::build(texts.iter().copied())
    }

    #[test]
    fn empty_index_returns_no_results() {
        let index = KeywordIndex::new();
        assert!(index.is_empty());
        assert!(index.search("anything", 10).is_empty());
    }

    #[test]
    fn exact_term_match_ranks_first() {
        let index = corpus(&[
            "the rust programming language",
            "python scripting for data analysis",
            "garden soil and compost",
        ]);
        let results = index.search("rust programming", 10);
        assert!(!results.is_empty());
        assert_eq!(results[0].0, 0);
    }

    #[test]
    fn unrelated_query_returns_empty() {
        let index = corpus(&["apples and oranges", "bread and butter"]);
        let results = index.search("submarine", 10);
        assert!(results.is_empty());
    }

    #[test]
    fn zero_score_candidates_are_discarded() {
        let index = corpus(&["rust rust rust", "completely different topic"]);
        let results = index.search("rust", 10);
        assert!(results.iter().all(|(_, score)| *score > 0.0));
        assert!(results.iter().all(|(position, _)| *position == 0));
    }

    #[test]
    fn search_is_case_insensitive() {
        let index = corpus(&["Rust Programming"]);
        assert!(!index.search("rust", 10).is_empty());
        assert!(!index.search("RUST", 10).is_empty());
    }

    #[test]
    fn respects_result_limit() {
        let index = corpus(&["rust one", "rust two", "rust three", "rust four"]);
        let results = index.search("rust", 2);
        assert!(results.len() <= 2);
    }

    #[test]
    fn rebuild_reflects_new_corpus() {
        let index = corpus(&["only document"]);
        assert_eq!(index.len(), 1);

        let index = corpus(&["only document", "a second document about rust"]);
        assert_eq!(index.len(), 2);
        let results = index.search("rust", 10);
        assert_eq!(results[0].0, 1);
    }
}
