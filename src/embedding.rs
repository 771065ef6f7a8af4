//! Embedding provider seam.
//!
//! The engine never talks to a model directly. Callers inject anything that
//! implements [`EmbeddingProvider`]; the engine only cares that every vector
//! it receives has the advertised [`dimension`](EmbeddingProvider::dimension).

use thiserror::Error;

/// Errors from an embedding provider.
///
/// Provider failures are surfaced to the caller unchanged. This layer never
/// retries embedding calls; retry policy belongs to the provider or the
/// application wrapping it.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The provider failed to produce embeddings.
    #[error("embedding provider error: {0}")]
    Provider(String),

    /// The provider returned a different number of vectors than texts.
    #[error("provider returned {actual} embeddings for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },
}

/// Produces dense vector embeddings for text.
///
/// Implementations must be thread-safe; the service shares one provider
/// across all tenants.
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of document texts, one vector per input, in order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embeds a single query string.
    ///
    /// Kept separate from [`embed`](Self::embed) because some providers use
    /// distinct query/document instructions.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Dimensionality of every vector this provider produces.
    fn dimension(&self) -> usize;
}
