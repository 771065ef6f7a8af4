//! Core types shared across the search stack.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ordered document metadata. Insertion order is preserved through
/// serialization so persisted documents round-trip byte-identically.
pub type Metadata = IndexMap<String, serde_json::Value>;

/// A single document in a tenant's corpus.
///
/// Documents are immutable once stored: a re-ingested id replaces the record
/// wholesale, there are no in-place edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within one tenant's corpus.
    #[serde(rename = "doc_id")]
    pub id: String,
    /// Raw text, the input for both embedding and lexical indexing.
    pub text: String,
    /// Arbitrary caller-supplied fields, order-preserving.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A fused search hit.
///
/// `score` is the RRF-fused score used for ranking. The per-source scores
/// are kept for observability: `None` means the document was absent from
/// that source's candidate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub doc_id: String,
    /// Fused RRF score, descending across a result list.
    pub score: f32,
    /// Cosine similarity from the semantic index, if present there.
    pub vector_score: Option<f32>,
    /// BM25 score from the lexical index, if present there.
    pub keyword_score: Option<f32>,
    pub text: String,
    pub metadata: Metadata,
}

/// Errors from index operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// An embedding's dimensionality disagrees with the index's configured
    /// dimension. Fatal: the mutation is rejected before any state changes.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The query is unusable (empty text, zero result count).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Document and embedding counts disagree in a batch operation.
    #[error("{documents} documents paired with {embeddings} embeddings")]
    CountMismatch { documents: usize, embeddings: usize },
}

/// Checks an embedding length against the configured dimension.
///
/// Call before any index mutation so a mismatch leaves the corpus unchanged.
pub fn validate_dimension(expected: usize, actual: usize) -> Result<(), SearchError> {
    if expected != actual {
        return Err(SearchError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_dimension_accepts_match() {
        assert!(validate_dimension(128, 128).is_ok());
    }

    #[test]
    fn validate_dimension_rejects_mismatch() {
        let err = validate_dimension(128, 64).unwrap_err();
        match err {
            SearchError::DimensionMismatch { expected, actual } => {
                assert_eq!(expected, 128);
                assert_eq!(actual, 64);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn document_serializes_with_doc_id_field() {
        let doc = Document::new("d1", "hello").with_metadata("source", "test".into());
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"doc_id\":\"d1\""));
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn metadata_preserves_insertion_order() {
        let doc = Document::new("d1", "t")
            .with_metadata("z", 1.into())
            .with_metadata("a", 2.into());
        let keys: Vec<&String> = doc.metadata.keys().collect();
        assert_eq!(keys, ["z", "a"]);
    }
}
