//! Reciprocal Rank Fusion.
//!
//! Merges the semantic and lexical candidate lists by summing
//! `1 / (k + rank + 1)` per list appearance (rank 0-based). RRF only looks
//! at ranks, so the incomparable score scales of cosine similarity and BM25
//! never need normalizing against each other.

use indexmap::IndexMap;
use std::cmp::Ordering;

/// One fused candidate. `position` indexes the owning corpus; the optional
/// per-source scores record where the candidate was found.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub position: u64,
    /// Accumulated RRF score across both lists.
    pub score: f32,
    pub vector_score: Option<f32>,
    pub keyword_score: Option<f32>,
}

/// Fuses two ranked candidate lists into a single ranking, best first.
///
/// A candidate in both lists accumulates both rank contributions, so
/// agreement between retrievers can only raise its fused score. Duplicates
/// are collapsed at insertion into the score map. Ties are broken by
/// first-seen order, with the semantic list folded in before the lexical
/// list, so the output is deterministic. Either list may be empty; fusion
/// degrades to the single remaining ranking.
pub fn reciprocal_rank_fusion(
    semantic: &[(u64, f32)],
    lexical: &[(u64, f32)],
    rrf_k: usize,
) -> Vec<FusedHit> {
    // IndexMap keeps first-seen order for the tie-break below.
    let mut fused: IndexMap<u64, FusedHit> = IndexMap::new();

    for (rank, &(position, similarity)) in semantic.iter().enumerate() {
        let contribution = rrf_contribution(rrf_k, rank);
        let hit = fused.entry(position).or_insert(FusedHit {
            position,
            score: 0.0,
            vector_score: None,
            keyword_score: None,
        });
        hit.score += contribution;
        hit.vector_score.get_or_insert(similarity);
    }

    for (rank, &(position, bm25_score)) in lexical.iter().enumerate() {
        let contribution = rrf_contribution(rrf_k, rank);
        let hit = fused.entry(position).or_insert(FusedHit {
            position,
            score: 0.0,
            vector_score: None,
            keyword_score: None,
        });
        hit.score += contribution;
        hit.keyword_score.get_or_insert(bm25_score);
    }

    let mut ranked: Vec<FusedHit> = fused.into_values().collect();
    // Stable sort: equal scores keep insertion (first-seen) order.
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked
}

fn rrf_contribution(rrf_k: usize, rank: usize) -> f32 {
    1.0 / (rrf_k + rank + 1) as f32
}
