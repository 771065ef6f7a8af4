//! # Archivist
//!
//! Tenant-isolated hybrid retrieval engine with bounded resource pooling.
//!
//! Each tenant owns an independent corpus indexed two ways: a semantic
//! (HNSW nearest-neighbor) index over dense embeddings and a lexical (BM25)
//! index over raw text. Queries run against both and the ranked lists are
//! merged with Reciprocal Rank Fusion. Live tenant indexes are held in a
//! bounded LRU+TTL [`pool::ResourcePool`] and persisted through a pluggable,
//! optionally encrypted [`storage::StorageProvider`].
//!
//! ## Architecture
//!
//! ```text
//! TenantSearchService
//!   ├── TenantNamespaceResolver   tenant id -> storage prefix
//!   ├── ResourcePool              bounded cache of live tenant handles
//!   ├── PersistenceAdapter        load/save indexes via StorageProvider
//!   │     └── StorageProvider    local fs / in-memory / encrypted wrapper
//!   └── HybridIndex (per tenant)
//!         ├── VectorIndex        HNSW over embeddings
//!         ├── KeywordIndex       BM25 over text
//!         └── RRF fusion         merged ranking
//! ```
//!
//! Embedding generation is an external collaborator behind the
//! [`embedding::EmbeddingProvider`] trait; the engine never calls a model
//! directly.

pub mod config;
pub mod embedding;
pub mod persist;
pub mod pool;
pub mod search;
pub mod service;
pub mod storage;
pub mod tenant;

#[cfg(test)]
pub mod test_utils;

pub use config::EngineConfig;
pub use embedding::{EmbeddingError, EmbeddingProvider};
pub use persist::{PersistError, PersistenceAdapter};
pub use pool::{EvictionReason, PoolStats, ResourcePool};
pub use search::{Document, HybridIndex, SearchError, SearchResult};
pub use service::{ServiceError, TenantHandle, TenantSearchService};
pub use storage::{StorageError, StorageProvider};
pub use tenant::{TenantError, TenantNamespace, TenantNamespaceResolver};
