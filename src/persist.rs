//! Persistence adapter: tenant index <-> storage provider.
//!
//! Layout per tenant (see [`crate::tenant::TenantNamespace`]): `docs.jsonl`
//! is the append-only, authoritative document log, one JSON object per
//! line; `vector_store/embeddings.bin` is a derived blob that can always be
//! rebuilt from the log. That asymmetry drives the error policy: load-side
//! corruption is absorbed and repaired, save-side failure is always
//! surfaced.

use crate::config::EngineConfig;
use crate::embedding::EmbeddingProvider;
use crate::search::{Document, HybridIndex};
use crate::storage::{with_retry, RetryPolicy, StorageError, StorageProvider};
use crate::tenant::TenantNamespace;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum PersistError {
    /// A persisted index could not be written. Never absorbed: a lost save
    /// must not look like success.
    #[error("failed to save index for tenant {tenant}: {source}")]
    SaveFailure {
        tenant: String,
        source: StorageError,
    },

    /// Storage failed on the load path after retries (transient class
    /// exhausted). Distinct from corruption, which is absorbed.
    #[error("storage error while loading index: {0}")]
    Storage(#[from] StorageError),
}

/// Little-endian embedding blob: `count: u32`, `dim: u32`, then
/// `count * dim` `f32` values.
const EMBEDDING_HEADER_LEN: usize = 8;

/// Loads and saves tenant indexes through a storage provider.
pub struct PersistenceAdapter {
    storage: Arc<dyn StorageProvider>,
    retry: RetryPolicy,
    config: EngineConfig,
}

impl PersistenceAdapter {
    pub fn new(storage: Arc<dyn StorageProvider>, retry: RetryPolicy, config: EngineConfig) -> Self {
        Self {
            storage,
            retry,
            config,
        }
    }

    /// Loads a tenant's index, or initializes an empty one.
    ///
    /// Cold start (no `docs.jsonl`) is a normal branch, not an error. A
    /// corrupt or truncated log keeps its parseable prefix. A missing,
    /// corrupt, or misaligned embedding blob is repaired by re-embedding
    /// the surviving documents through `embedder`; if that also fails the
    /// tenant starts empty. Only exhausted transient storage errors
    /// surface.
    #[instrument(skip_all, fields(tenant = namespace.tenant_id()))]
    pub fn load(
        &self,
        namespace: &TenantNamespace,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<HybridIndex, PersistError> {
        let docs_path = namespace.docs_path();
        let raw_docs = match with_retry(&self.retry, "download docs", || {
            self.storage.download_bytes(&docs_path)
        }) {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => {
                info!("no persisted corpus, cold start");
                return Ok(self.empty_index());
            }
            Err(e) => return Err(e.into()),
        };

        let documents = parse_docs_log(&raw_docs);
        if documents.is_empty() {
            return Ok(self.empty_index());
        }

        let embeddings = match self.load_embeddings(namespace, documents.len()) {
            Some(embeddings) => embeddings,
            None => {
                warn!("embedding blob unusable, re-embedding document log");
                let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
                match embedder.embed(&texts) {
                    Ok(embeddings) => embeddings,
                    Err(e) => {
                        warn!(error = %e, "re-embedding failed, starting tenant empty");
                        return Ok(self.empty_index());
                    }
                }
            }
        };

        match HybridIndex::from_parts(
            documents,
            embeddings,
            self.config.embedding_dimension,
            self.config.rrf_k,
            self.config.search_multiplier,
        ) {
            Ok(index) => {
                info!(corpus = index.len(), "tenant index loaded");
                Ok(index)
            }
            Err(e) => {
                warn!(error = %e, "persisted state inconsistent, starting tenant empty");
                Ok(self.empty_index())
            }
        }
    }

    /// Persists a tenant's documents and embedding blob.
    ///
    /// Any write failure, after retries for the transient class, surfaces
    /// as [`PersistError::SaveFailure`].
    #[instrument(skip_all, fields(tenant = namespace.tenant_id(), corpus = index.len()))]
    pub fn save(
        &self,
        namespace: &TenantNamespace,
        index: &HybridIndex,
    ) -> Result<(), PersistError> {
        let save_err = |source: StorageError| PersistError::SaveFailure {
            tenant: namespace.tenant_id().to_string(),
            source,
        };

        let docs = encode_docs_log(index.documents()).map_err(save_err)?;
        with_retry(&self.retry, "upload docs", || {
            self.storage.upload_bytes(&docs, &namespace.docs_path())
        })
        .map_err(save_err)?;

        let blob = encode_embeddings(index.embeddings(), index.dimension());
        with_retry(&self.retry, "upload embeddings", || {
            self.storage.upload_bytes(&blob, &namespace.embeddings_path())
        })
        .map_err(save_err)?;

        info!("tenant index saved");
        Ok(())
    }

    fn empty_index(&self) -> HybridIndex {
        HybridIndex::new(
            self.config.embedding_dimension,
            self.config.rrf_k,
            self.config.search_multiplier,
        )
    }

    /// Returns `None` for any condition the rebuild path should repair:
    /// missing blob, undecodable blob, wrong dimension, or a count that
    /// disagrees with the document log.
    fn load_embeddings(
        &self,
        namespace: &TenantNamespace,
        expected_count: usize,
    ) -> Option<Vec<Vec<f32>>> {
        let blob = self
            .storage
            .download_bytes(&namespace.embeddings_path())
            .ok()?;
        let embeddings = decode_embeddings(&blob)
            .map_err(|e| warn!(error = %e, "corrupt embedding blob"))
            .ok()?;
        if embeddings.len() != expected_count {
            warn!(
                blob = embeddings.len(),
                log = expected_count,
                "embedding blob out of sync with document log"
            );
            return None;
        }
        if embeddings
            .iter()
            .any(|e| e.len() != self.config.embedding_dimension)
        {
            return None;
        }
        Some(embeddings)
    }
}

/// Parses the document log, keeping the parseable prefix.
///
/// A bad line ends parsing: anything after it is either a truncated tail
/// from an interrupted write or follows one, and the log is append-only so
/// the prefix is self-consistent.
fn parse_docs_log(raw: &[u8]) -> Vec<Document> {
    let text = String::from_utf8_lossy(raw);
    let mut documents = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Document>(line) {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                warn!(
                    line = line_no + 1,
                    error = %e,
                    kept = documents.len(),
                    "document log corrupt, keeping parsed prefix"
                );
                break;
            }
        }
    }
    documents
}

fn encode_docs_log(documents: &[Document]) -> Result<Vec<u8>, StorageError> {
    let mut out = Vec::new();
    for doc in documents {
        let line = serde_json::to_vec(doc)
            .map_err(|e| StorageError::Io(format!("serialize document {}: {e}", doc.id)))?;
        out.extend_from_slice(&line);
        out.push(b'\n');
    }
    Ok(out)
}

fn encode_embeddings(embeddings: &[Vec<f32>], dimension: usize) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(EMBEDDING_HEADER_LEN + embeddings.len() * dimension * 4);
    out.extend_from_slice(&(embeddings.len() as u32).to_le_bytes());
    out.extend_from_slice(&(dimension as u32).to_le_bytes());
    for embedding in embeddings {
        for value in embedding {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}

fn decode_embeddings(blob: &[u8]) -> Result<Vec<Vec<f32>>, String> {
    if blob.len() < EMBEDDING_HEADER_LEN {
        return Err("blob shorter than header".to_string());
    }
    let count = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
    let dimension = u32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]) as usize;
    let expected_len = EMBEDDING_HEADER_LEN + count.checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| "header overflow".to_string())?;
    if blob.len() != expected_len {
        return Err(format!(
            "blob length {} does not match header ({count} x {dimension})",
            blob.len()
        ));
    }

    let mut embeddings = Vec::with_capacity(count);
    let mut offset = EMBEDDING_HEADER_LEN;
    for _ in 0..count {
        let mut embedding = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            let bytes = [
                blob[offset],
                blob[offset + 1],
                blob[offset + 2],
                blob[offset + 3],
            ];
            embedding.push(f32::from_le_bytes(bytes));
            offset += 4;
        }
        embeddings.push(embedding);
    }
    Ok(embeddings)
}
