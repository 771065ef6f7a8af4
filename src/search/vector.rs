//! HNSW semantic index over document embeddings.

use super::types::{validate_dimension, SearchError};
use hnsw::{Hnsw, Searcher};
use space::{Metric, Neighbor};
use tracing::instrument;

/// Floor for the HNSW `ef_search` parameter. The effective value is
/// `max(k * 2, MIN_EF_SEARCH)` so recall stays good for small k.
const MIN_EF_SEARCH: usize = 50;

/// Cosine distance over embedding vectors, scaled into `u32` as the
/// `space::Metric` contract requires. Distance is `1 - cosine_similarity`,
/// mapped from `[0, 2]` onto the full `u32` range.
struct CosineDistance;

impl Metric<Box<[f32]>> for CosineDistance {
    type Unit = u32;

    fn distance(&self, a: &Box<[f32]>, b: &Box<[f32]>) -> u32 {
        let a: &[f32] = a;
        let b: &[f32] = b;

        let dot: f32 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
        let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();

        if mag_a == 0.0 || mag_b == 0.0 {
            // Zero vectors are maximally distant from everything.
            return u32::MAX;
        }

        let distance = 1.0 - dot / (mag_a * mag_b);
        (distance * (u32::MAX as f32 / 2.0)) as u32
    }
}

/// Incremental nearest-neighbor index over embeddings.
///
/// Entries are identified by their insertion position, which the owning
/// [`HybridIndex`](super::engine::HybridIndex) keeps aligned with its
/// document list. The corpus is append-only, so positions are stable for
/// the life of the index.
///
/// HNSW parameters: M=16 bidirectional links per node, M0=32 at layer 0,
/// the standard balanced configuration from Malkov & Yashunin (2018).
pub struct VectorIndex {
    index: Hnsw<CosineDistance, Box<[f32]>, rand::rngs::StdRng, 16, 32>,
    /// Query scratch state, mutated during search.
    searcher: Searcher<u32>,
    /// Number of inserted vectors. Doubles as the next insertion position.
    len: usize,
    /// Required dimensionality for every vector.
    dimension: usize,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            index: Hnsw::new(CosineDistance),
            searcher: Searcher::default(),
            len: 0,
            dimension,
        }
    }

    /// Inserts an embedding, returning its position.
    ///
    /// Insertion is incremental; no rebuild is needed. Fails with
    /// [`SearchError::DimensionMismatch`] on a wrong-sized vector, leaving
    /// the index untouched.
    pub fn insert(&mut self, embedding: Vec<f32>) -> Result<u64, SearchError> {
        validate_dimension(self.dimension, embedding.len())?;
        let position = self.len as u64;
        self.index
            .insert(embedding.into_boxed_slice(), &mut self.searcher);
        self.len += 1;
        Ok(position)
    }

    /// Returns up to `k` nearest entries as `(position, similarity)` pairs,
    /// most similar first. Similarity is cosine similarity clamped to
    /// `[0, 1]`. An empty index yields an empty result.
    #[instrument(skip_all, fields(k, index_len = self.len))]
    pub fn search(&mut self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>, SearchError> {
        validate_dimension(self.dimension, query.len())?;

        if self.len == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let capacity = k.min(self.len);
        let mut neighbors = vec![
            Neighbor {
                index: !0,
                distance: !0
            };
            capacity
        ];
        let ef_search = (k * 2).max(MIN_EF_SEARCH);
        let query = query.to_vec().into_boxed_slice();

        self.index
            .nearest(&query, ef_search, &mut self.searcher, &mut neighbors);

        let results = neighbors
            .into_iter()
            .filter(|n| n.index != !0)
            .map(|n| {
                let distance = (n.distance as f32) / (u32::MAX as f32 / 2.0);
                let similarity = (1.0 - distance).clamp(0.0, 1.0);
                (n.index as u64, similarity)
            })
            .collect();
        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}
