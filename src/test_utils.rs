//! Shared helpers for unit tests.
//!
//! Only compiled for tests. The embedder here is a stand-in for a real
//! model: fully deterministic, offline, and cheap, so index round-trips and
//! ranking assertions are reproducible.

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::search::Document;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic bag-of-words embedder.
///
/// Each token hashes to one dimension; the resulting count vector is
/// L2-normalized. Texts sharing tokens get high cosine similarity, which is
/// enough signal for ranking tests.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let slot = (hasher.finish() as usize) % self.dimension;
            vector[slot] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// An embedder that always fails, for error-path tests.
pub struct FailingEmbedder {
    pub dimension: usize,
}

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, _: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Provider("provider offline".to_string()))
    }

    fn embed_query(&self, _: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Provider("provider offline".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Builds a small themed corpus keyed by id.
pub fn sample_documents() -> Vec<Document> {
    vec![
        Document::new("rust-1", "rust ownership and borrowing"),
        Document::new("rust-2", "async rust network services"),
        Document::new("cook-1", "slow roasted tomato sauce"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embedder_is_deterministic() {
        let e = HashEmbedder::new(16);
        assert_eq!(
            e.embed_query("same text").unwrap(),
            e.embed_query("same text").unwrap()
        );
    }

    #[test]
    fn shared_tokens_mean_higher_similarity() {
        let e = HashEmbedder::new(64);
        let cosine = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b).map(|(x, y)| x * y).sum()
        };
        let rust_a = e.embed_query("rust ownership").unwrap();
        let rust_b = e.embed_query("rust borrowing").unwrap();
        let other = e.embed_query("tomato sauce").unwrap();
        assert!(cosine(&rust_a, &rust_b) > cosine(&rust_a, &other));
    }

    #[test]
    fn vectors_are_normalized() {
        let e = HashEmbedder::new(32);
        let v = e.embed_query("a few words here").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
