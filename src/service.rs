//! Composition root: tenant-scoped search over pooled indexes.
//!
//! [`TenantSearchService`] owns the resolver, the pool, the persistence
//! adapter, and the shared embedding provider. All tenant operations enter
//! here. The pool only guards its own bookkeeping; each tenant's index sits
//! behind its own mutex inside [`TenantHandle`], so concurrent mutation of
//! one tenant is serialized while different tenants proceed in parallel.

use crate::config::EngineConfig;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::persist::{PersistError, PersistenceAdapter};
use crate::pool::{PoolStats, ResourceInfo, ResourcePool};
use crate::search::{Document, HybridIndex, SearchError, SearchResult};
use crate::storage::{RetryPolicy, StorageProvider};
use crate::tenant::{TenantError, TenantNamespace, TenantNamespaceResolver};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors at the service boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// One tenant's pooled resource: its namespace plus the locked index.
pub struct TenantHandle {
    namespace: TenantNamespace,
    index: Mutex<HybridIndex>,
}

impl TenantHandle {
    pub fn namespace(&self) -> &TenantNamespace {
        &self.namespace
    }

    fn lock(&self) -> MutexGuard<'_, HybridIndex> {
        match self.index.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Multi-tenant hybrid search facade.
pub struct TenantSearchService {
    resolver: TenantNamespaceResolver,
    pool: ResourcePool<Arc<TenantHandle>>,
    adapter: PersistenceAdapter,
    storage: Arc<dyn StorageProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: EngineConfig,
}

impl TenantSearchService {
    /// Wires the service from its collaborators.
    ///
    /// The pool's eviction callback only logs: durable state is written on
    /// every successful mutation, so an evicted handle never holds unsaved
    /// changes and eviction never touches storage.
    pub fn new(
        storage: Arc<dyn StorageProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> Self {
        let resolver =
            TenantNamespaceResolver::new(config.data_root.clone(), config.docs_filename.clone());
        let pool = ResourcePool::new(
            config.pool_max_size,
            config.cache_ttl_seconds.map(Duration::from_secs),
        )
        .with_eviction_callback(Box::new(|key: &str, _: &Arc<TenantHandle>, reason| {
            info!(tenant = key, reason = %reason, "tenant index left the pool");
        }));
        let adapter =
            PersistenceAdapter::new(storage.clone(), RetryPolicy::default(), config.clone());

        Self {
            resolver,
            pool,
            adapter,
            storage,
            embedder,
            config,
        }
    }

    /// Embeds and indexes a batch of documents for a tenant, then persists.
    ///
    /// Every embedding is validated before any index state changes; a
    /// dimension mismatch from a misbehaving provider rejects the whole
    /// batch. A persistence failure surfaces after the in-memory index has
    /// already taken the batch, so the caller can retry the save by
    /// re-adding or calling [`save_tenant`](Self::save_tenant).
    #[instrument(skip_all, fields(tenant = tenant_id, batch = documents.len()))]
    pub fn add_documents(
        &self,
        tenant_id: &str,
        documents: Vec<Document>,
    ) -> Result<usize, ServiceError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let handle = self.handle_for(tenant_id)?;

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts)?;
        if embeddings.len() != documents.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: documents.len(),
                actual: embeddings.len(),
            }
            .into());
        }

        let mut index = handle.lock();
        let added = index.add_documents(documents, embeddings)?;
        self.adapter.save(handle.namespace(), &index)?;
        debug!(added, corpus = index.len(), "documents indexed and saved");
        Ok(added)
    }

    /// Fused search over one tenant's corpus. An unknown or empty tenant
    /// yields an empty result list.
    #[instrument(skip_all, fields(tenant = tenant_id, top_k))]
    pub fn search(
        &self,
        tenant_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, ServiceError> {
        let handle = self.handle_for(tenant_id)?;
        let query_embedding = self.embedder.embed_query(query)?;
        let mut index = handle.lock();
        Ok(index.search(query, &query_embedding, top_k)?)
    }

    /// Search with the configured default result count.
    pub fn search_default(
        &self,
        tenant_id: &str,
        query: &str,
    ) -> Result<Vec<SearchResult>, ServiceError> {
        self.search(tenant_id, query, self.config.default_top_k)
    }

    /// Explicitly persists a tenant's current in-memory index.
    pub fn save_tenant(&self, tenant_id: &str) -> Result<(), ServiceError> {
        let handle = self.handle_for(tenant_id)?;
        let index = handle.lock();
        self.adapter.save(handle.namespace(), &index)?;
        Ok(())
    }

    /// Drops a tenant's in-memory index. Durable state is untouched; the
    /// next access reloads from storage.
    pub fn evict_tenant(&self, tenant_id: &str) -> Result<bool, ServiceError> {
        let namespace = self.resolver.resolve(tenant_id)?;
        Ok(self.pool.remove(namespace.root()).is_some())
    }

    /// Evicts every resident index.
    pub fn clear_pool(&self) {
        self.pool.clear();
    }

    /// Evicts TTL-expired indexes; returns the count removed.
    pub fn cleanup_expired(&self) -> usize {
        self.pool.cleanup_expired()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn pool_resource_info(&self) -> Vec<ResourceInfo> {
        self.pool.resource_info()
    }

    /// Fetches the tenant's handle from the pool, loading it on a miss.
    ///
    /// Load and save happen outside the pool lock. Two threads racing on
    /// the same cold tenant may both load; `put` is last-write-wins, which
    /// is safe because a freshly loaded index is a pure function of durable
    /// state.
    fn handle_for(&self, tenant_id: &str) -> Result<Arc<TenantHandle>, ServiceError> {
        let namespace = self
            .resolver
            .resolve_and_prepare(tenant_id, self.storage.as_ref())?;
        let key = namespace.root().to_string();

        if let Some(handle) = self.pool.get(&key) {
            return Ok(handle);
        }

        let index = self.adapter.load(&namespace, self.embedder.as_ref())?;
        let handle = Arc::new(TenantHandle {
            namespace,
            index: Mutex::new(index),
        });
        self.pool.put(&key, handle.clone());
        Ok(handle)
    }
}
