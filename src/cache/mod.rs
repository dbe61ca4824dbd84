//! Explanation cache.
//!
//! Completions are stored under a content hash of the masked prompt, so keys
//! never carry sensitive literals. The backing store is chosen by
//! configuration; callers only see [`ExplanationCache::get`] and
//! [`ExplanationCache::put`]. Store failures never fail a run: they are
//! logged and treated as a miss.

pub mod file;
pub mod s3;

use crate::config::types::CacheBackendConfig;
use crate::error::CacheError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use file::FileStore;
pub use s3::S3Store;

/// Every cache backend name, for `cache list`.
pub const CACHE_PROVIDERS: &[&str] = &["file", "s3"];

/// One stored completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    /// Base64 of the masked completion
    pub value: String,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, completion: &str) -> Self {
        Self {
            key: key.into(),
            value: STANDARD.encode(completion),
            stored_at: Utc::now(),
        }
    }

    /// Decode the stored completion.
    pub fn completion(&self) -> Result<String, CacheError> {
        let bytes = STANDARD
            .decode(&self.value)
            .map_err(|e| CacheError::Corrupt(format!("entry {}: {}", self.key, e)))?;
        String::from_utf8(bytes).map_err(|e| CacheError::Corrupt(format!("entry {}: {}", self.key, e)))
    }
}

/// A durable key/value store for cache entries.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name, one of [`CACHE_PROVIDERS`].
    fn name(&self) -> &'static str;

    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    async fn save(&self, entry: &CacheEntry) -> Result<(), CacheError>;
}

/// Cache key for a masked prompt sent to `provider` in `language`.
pub fn cache_key(provider: &str, language: &str, masked_prompt: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in [provider, language, masked_prompt] {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Backend name of a cache configuration.
pub fn backend_name(config: &CacheBackendConfig) -> &'static str {
    match config {
        CacheBackendConfig::File { .. } => "file",
        CacheBackendConfig::S3 { .. } => "s3",
    }
}

/// Build the configured store.
pub async fn store_from_config(config: &CacheBackendConfig) -> Arc<dyn CacheStore> {
    match config {
        CacheBackendConfig::File { path } => {
            let path = path.clone().unwrap_or_else(file::default_path);
            Arc::new(FileStore::new(path))
        }
        CacheBackendConfig::S3 {
            bucket,
            region,
            endpoint,
        } => Arc::new(S3Store::connect(bucket, region, endpoint.as_deref()).await),
    }
}

/// The two-operation cache used by the explanation stage.
pub struct ExplanationCache {
    store: Arc<dyn CacheStore>,
    no_cache: bool,
}

impl ExplanationCache {
    /// `no_cache` skips lookups; completions are still stored.
    pub fn new(store: Arc<dyn CacheStore>, no_cache: bool) -> Self {
        Self { store, no_cache }
    }

    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if self.no_cache {
            return None;
        }

        match self.store.load(key).await.and_then(|hit| hit.map(|e| e.completion()).transpose()) {
            Ok(Some(completion)) => {
                log::debug!("Cache hit for {}", key);
                Some(completion)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("{} cache unavailable, treating as miss: {}", self.store.name(), e);
                None
            }
        }
    }

    pub async fn put(&self, key: &str, completion: &str) {
        let entry = CacheEntry::new(key, completion);
        if let Err(e) = self.store.save(&entry).await {
            log::warn!("Failed to store explanation in {} cache: {}", self.store.name(), e);
        }
    }
}
