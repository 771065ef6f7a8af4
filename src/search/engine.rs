//! The per-tenant hybrid retrieval engine.

use super::fusion::reciprocal_rank_fusion;
use super::keyword::KeywordIndex;
use super::types::{validate_dimension, Document, SearchError, SearchResult};
use super::vector::VectorIndex;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// One tenant's live corpus with both indexes.
///
/// Owns the document list, the embedding list aligned position-for-position
/// with it, the incremental HNSW index, and the rebuilt-per-mutation BM25
/// index. Not internally synchronized; the service wraps each handle in a
/// `Mutex` so mutation and search on one tenant are serialized.
///
/// The document list is append-only. Re-ingesting an existing `doc_id`
/// appends a new record and retires the old position, so a wholesale
/// replacement never edits stored state in place and search only ever
/// surfaces the newest version of an id.
pub struct HybridIndex {
    documents: Vec<Document>,
    /// Embedding for `documents[i]` lives at `embeddings[i]`.
    embeddings: Vec<Vec<f32>>,
    /// Current (newest) position for each doc id.
    positions_by_id: HashMap<String, usize>,
    vector: VectorIndex,
    keyword: KeywordIndex,
    dimension: usize,
    rrf_k: usize,
    search_multiplier: usize,
}

impl std::fmt::Debug for HybridIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridIndex")
            .field("documents", &self.documents.len())
            .field("dimension", &self.dimension)
            .field("rrf_k", &self.rrf_k)
            .field("search_multiplier", &self.search_multiplier)
            .finish_non_exhaustive()
    }
}

impl HybridIndex {
    /// Creates an empty index for one tenant.
    pub fn new(dimension: usize, rrf_k: usize, search_multiplier: usize) -> Self {
        Self {
            documents: Vec::new(),
            embeddings: Vec::new(),
            positions_by_id: HashMap::new(),
            vector: VectorIndex::new(dimension),
            keyword: KeywordIndex::new(),
            dimension,
            rrf_k,
            search_multiplier,
        }
    }

    /// Reconstructs an index from persisted documents and embeddings.
    ///
    /// Both sub-indexes are rebuilt from scratch; the inputs must be aligned
    /// and every embedding must match `dimension`.
    pub fn from_parts(
        documents: Vec<Document>,
        embeddings: Vec<Vec<f32>>,
        dimension: usize,
        rrf_k: usize,
        search_multiplier: usize,
    ) -> Result<Self, SearchError> {
        if documents.len() != embeddings.len() {
            return Err(SearchError::CountMismatch {
                documents: documents.len(),
                embeddings: embeddings.len(),
            });
        }
        for embedding in &embeddings {
            validate_dimension(dimension, embedding.len())?;
        }

        let mut vector = VectorIndex::new(dimension);
        for embedding in &embeddings {
            vector.insert(embedding.clone())?;
        }
        let keyword = KeywordIndex::build(documents.iter().map(|d| d.text.as_str()));
        let positions_by_id = documents
            .iter()
            .enumerate()
            .map(|(position, doc)| (doc.id.clone(), position))
            .collect();

        Ok(Self {
            documents,
            embeddings,
            positions_by_id,
            vector,
            keyword,
            dimension,
            rrf_k,
            search_multiplier,
        })
    }

    /// Appends a batch of documents with their embeddings.
    ///
    /// Every embedding is validated against the configured dimension before
    /// any state changes; a mismatch fails with
    /// [`SearchError::DimensionMismatch`] and leaves the corpus exactly as
    /// it was. On success the documents are appended, vectors inserted
    /// incrementally, and a lexical index freshly built over the full
    /// updated corpus is swapped in, so readers never observe a
    /// half-rebuilt state.
    ///
    /// Returns the number of documents added.
    #[instrument(skip_all, fields(batch = documents.len(), corpus = self.documents.len()))]
    pub fn add_documents(
        &mut self,
        documents: Vec<Document>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize, SearchError> {
        if documents.len() != embeddings.len() {
            return Err(SearchError::CountMismatch {
                documents: documents.len(),
                embeddings: embeddings.len(),
            });
        }
        for embedding in &embeddings {
            validate_dimension(self.dimension, embedding.len())?;
        }

        // Build the replacement lexical index before touching any state, so
        // the commit below is a straight swap.
        let keyword = KeywordIndex::build(
            self.documents
                .iter()
                .map(|d| d.text.as_str())
                .chain(documents.iter().map(|d| d.text.as_str())),
        );

        let added = documents.len();
        for (document, embedding) in documents.into_iter().zip(embeddings) {
            let position = self.documents.len();
            // Validated above; insertion cannot fail now.
            self.vector.insert(embedding.clone())?;
            self.positions_by_id.insert(document.id.clone(), position);
            self.documents.push(document);
            self.embeddings.push(embedding);
        }
        self.keyword = keyword;

        debug!(corpus = self.documents.len(), "corpus updated");
        Ok(added)
    }

    /// Runs a fused query and returns at most `top_k` results, best first.
    ///
    /// An empty corpus yields an empty list, never an error. Each sub-index
    /// is asked for `top_k * search_multiplier` candidates; zero-score
    /// lexical candidates were already dropped by the keyword index.
    #[instrument(skip_all, fields(top_k, corpus = self.documents.len()))]
    pub fn search(
        &mut self,
        query_text: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if query_text.trim().is_empty() {
            return Err(SearchError::InvalidQuery("empty query".to_string()));
        }
        if top_k == 0 {
            return Err(SearchError::InvalidQuery("top_k must be positive".to_string()));
        }
        if self.documents.is_empty() {
            return Ok(Vec::new());
        }

        let fetch = top_k * self.search_multiplier;
        let semantic = self.vector.search(query_embedding, fetch)?;
        let lexical = self.keyword.search(query_text, fetch);
        debug!(
            semantic = semantic.len(),
            lexical = lexical.len(),
            "candidate lists ready"
        );

        let fused = reciprocal_rank_fusion(&semantic, &lexical, self.rrf_k);

        let results = fused
            .into_iter()
            .filter_map(|hit| {
                let position = hit.position as usize;
                let document = self.documents.get(position)?;
                // Retired versions of a re-ingested id are skipped.
                if self.positions_by_id.get(&document.id) != Some(&position) {
                    return None;
                }
                Some(SearchResult {
                    doc_id: document.id.clone(),
                    score: hit.score,
                    vector_score: hit.vector_score,
                    keyword_score: hit.keyword_score,
                    text: document.text.clone(),
                    metadata: document.metadata.clone(),
                })
            })
            .take(top_k)
            .collect();
        Ok(results)
    }

    /// Number of stored document records, retired versions included.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Full document list in storage order, for persistence.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Embedding list aligned with [`documents`](Self::documents).
    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }
}
