//! Hybrid search: semantic (HNSW) + lexical (BM25) indexes fused with
//! Reciprocal Rank Fusion.

pub mod engine;
pub mod fusion;
pub mod keyword;
pub mod types;
pub mod vector;

pub use engine::HybridIndex;
pub use fusion::reciprocal_rank_fusion;
pub use keyword::KeywordIndex;
pub use types::{validate_dimension, Document, Metadata, SearchError, SearchResult};
pub use vector::VectorIndex;
