//! Engine configuration.
//!
//! All tunables live in [`EngineConfig`], constructed with defaults and
//! optionally overridden from environment variables. The struct is injected
//! into the composition root ([`crate::service::TenantSearchService`]) rather
//! than read from a global.

use std::env;

// ============================================================================
// Defaults
// ============================================================================

/// Default embedding dimensionality.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 3072;

/// Default number of results returned by a search.
pub const DEFAULT_TOP_K: usize = 5;

/// RRF rank-smoothing constant. Higher values flatten the contribution of
/// early ranks.
pub const DEFAULT_RRF_K: usize = 60;

/// Over-fetch factor: each sub-index is asked for `top_k * search_multiplier`
/// candidates before fusion.
pub const DEFAULT_SEARCH_MULTIPLIER: usize = 2;

/// Default maximum number of resident tenant indexes.
pub const DEFAULT_POOL_MAX_SIZE: usize = 8;

/// Default TTL for pooled tenant indexes, in seconds (1 hour).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

/// Default root prefix for all tenant data.
pub const DEFAULT_DATA_ROOT: &str = "user_data";

/// Default filename for the append-only document log.
pub const DEFAULT_DOCS_FILENAME: &str = "docs.jsonl";

// ============================================================================
// Config
// ============================================================================

/// Runtime configuration for the retrieval engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Dimensionality every embedding must have.
    pub embedding_dimension: usize,
    /// Result count when the caller does not specify one.
    pub default_top_k: usize,
    /// RRF smoothing constant.
    pub rrf_k: usize,
    /// Candidate over-fetch factor before fusion.
    pub search_multiplier: usize,
    /// Maximum resident tenant indexes in the pool.
    pub pool_max_size: usize,
    /// TTL for pooled indexes; `None` disables expiry.
    pub cache_ttl_seconds: Option<u64>,
    /// Storage prefix under which all tenant namespaces live.
    pub data_root: String,
    /// Filename of the per-tenant document log.
    pub docs_filename: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            default_top_k: DEFAULT_TOP_K,
            rrf_k: DEFAULT_RRF_K,
            search_multiplier: DEFAULT_SEARCH_MULTIPLIER,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            cache_ttl_seconds: Some(DEFAULT_CACHE_TTL_SECONDS),
            data_root: DEFAULT_DATA_ROOT.to_string(),
            docs_filename: DEFAULT_DOCS_FILENAME.to_string(),
        }
    }
}

impl EngineConfig {
    /// Builds a config from defaults with environment-variable overrides.
    ///
    /// Recognized variables: `EMBEDDING_DIMENSION`, `DEFAULT_TOP_K`, `RRF_K`,
    /// `SEARCH_MULTIPLIER`, `POOL_MAX_SIZE`, `CACHE_TTL_SECONDS` (0 disables
    /// expiry), `DATA_ROOT`, `DOCS_FILE`. Unparseable values fall back to the
    /// default.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_parse("EMBEDDING_DIMENSION") {
            cfg.embedding_dimension = v;
        }
        if let Some(v) = env_parse("DEFAULT_TOP_K") {
            cfg.default_top_k = v;
        }
        if let Some(v) = env_parse("RRF_K") {
            cfg.rrf_k = v;
        }
        if let Some(v) = env_parse("SEARCH_MULTIPLIER") {
            cfg.search_multiplier = v;
        }
        if let Some(v) = env_parse("POOL_MAX_SIZE") {
            cfg.pool_max_size = v;
        }
        if let Some(v) = env_parse::<u64>("CACHE_TTL_SECONDS") {
            cfg.cache_ttl_seconds = if v == 0 { None } else { Some(v) };
        }
        if let Ok(v) = env::var("DATA_ROOT") {
            if !v.is_empty() {
                cfg.data_root = v;
            }
        }
        if let Ok(v) = env::var("DOCS_FILE") {
            if !v.is_empty() {
                cfg.docs_filename = v;
            }
        }
        cfg
    }

    /// Validates invariants that the rest of the engine assumes.
    pub fn validate(&self) -> Result<(), String> {
        if self.embedding_dimension == 0 {
            return Err("embedding_dimension must be positive".to_string());
        }
        if self.default_top_k == 0 {
            return Err("default_top_k must be positive".to_string());
        }
        if self.search_multiplier == 0 {
            return Err("search_multiplier must be positive".to_string());
        }
        if self.pool_max_size == 0 {
            return Err("pool_max_size must be positive".to_string());
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
