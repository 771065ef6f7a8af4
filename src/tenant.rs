//! Tenant namespace resolution.
//!
//! Every tenant's durable state lives under a deterministic storage prefix
//! derived from its id. Resolution is pure: the same id always yields the
//! same prefix, and distinct ids can never collide because the id becomes
//! exactly one path component and the allowed alphabet excludes separators
//! and relative components.

use crate::storage::{StorageError, StorageProvider};
use thiserror::Error;
use tracing::debug;

/// Maximum accepted tenant id length.
const MAX_TENANT_ID_LEN: usize = 128;

/// Filename of the serialized embedding blob inside `vector_store/`.
pub const EMBEDDINGS_FILENAME: &str = "embeddings.bin";

/// Subdirectory holding the derived semantic index blob.
pub const VECTOR_STORE_DIR: &str = "vector_store";

#[derive(Debug, Error)]
pub enum TenantError {
    /// The tenant id would produce an unsafe or ambiguous storage path.
    /// Fatal: resolution is rejected outright.
    #[error("tenant id {tenant_id:?} rejected: {reason}")]
    PathViolation { tenant_id: String, reason: String },

    /// The storage provider failed while ensuring the namespace prefix.
    #[error("failed to prepare tenant namespace: {0}")]
    Storage(#[from] StorageError),
}

/// A resolved tenant's storage layout.
///
/// ```text
/// {data_root}/{tenant_id}/
///   vector_store/embeddings.bin   derived, rebuildable
///   docs.jsonl                    append-only, authoritative
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantNamespace {
    tenant_id: String,
    root: String,
    docs_filename: String,
}

impl TenantNamespace {
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Storage prefix owning everything for this tenant.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn vector_store_prefix(&self) -> String {
        format!("{}/{}", self.root, VECTOR_STORE_DIR)
    }

    /// Path of the authoritative document log.
    pub fn docs_path(&self) -> String {
        format!("{}/{}", self.root, self.docs_filename)
    }

    /// Path of the serialized embedding blob.
    pub fn embeddings_path(&self) -> String {
        format!("{}/{}/{}", self.root, VECTOR_STORE_DIR, EMBEDDINGS_FILENAME)
    }
}

/// Maps tenant ids to storage namespaces.
#[derive(Debug, Clone)]
pub struct TenantNamespaceResolver {
    data_root: String,
    docs_filename: String,
}

impl TenantNamespaceResolver {
    pub fn new(data_root: impl Into<String>, docs_filename: impl Into<String>) -> Self {
        Self {
            data_root: data_root.into(),
            docs_filename: docs_filename.into(),
        }
    }

    /// Resolves a tenant id to its namespace. Pure and deterministic.
    ///
    /// Rejects ids that are empty, overlong, contain separators or
    /// whitespace, are relative components (`.`, `..`), or use characters
    /// outside `[A-Za-z0-9._-]`.
    pub fn resolve(&self, tenant_id: &str) -> Result<TenantNamespace, TenantError> {
        validate_tenant_id(tenant_id)?;
        Ok(TenantNamespace {
            tenant_id: tenant_id.to_string(),
            root: format!("{}/{}", self.data_root.trim_end_matches('/'), tenant_id),
            docs_filename: self.docs_filename.clone(),
        })
    }

    /// Resolves and idempotently creates the namespace prefixes.
    pub fn resolve_and_prepare(
        &self,
        tenant_id: &str,
        storage: &dyn StorageProvider,
    ) -> Result<TenantNamespace, TenantError> {
        let namespace = self.resolve(tenant_id)?;
        storage.create_prefix(namespace.root())?;
        storage.create_prefix(&namespace.vector_store_prefix())?;
        debug!(tenant = tenant_id, root = %namespace.root(), "tenant namespace ready");
        Ok(namespace)
    }
}

fn validate_tenant_id(tenant_id: &str) -> Result<(), TenantError> {
    let reject = |reason: &str| {
        Err(TenantError::PathViolation {
            tenant_id: tenant_id.to_string(),
            reason: reason.to_string(),
        })
    };

    if tenant_id.is_empty() {
        return reject("empty id");
    }
    if tenant_id.len() > MAX_TENANT_ID_LEN {
        return reject("id too long");
    }
    if tenant_id == "." || tenant_id == ".." {
        return reject("relative path component");
    }
    if let Some(bad) = tenant_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return reject(&format!("disallowed character {bad:?}"));
    }
    Ok(())
}
