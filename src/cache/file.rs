//! Local cache: one JSON map file keyed by cache key.

use super::{CacheEntry, CacheStore};
use crate::error::CacheError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

type Entries = BTreeMap<String, CacheEntry>;

/// Default cache file under the user cache directory.
pub fn default_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kubesage")
        .join("explanations.json")
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Entries, CacheError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Entries::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| CacheError::Corrupt(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Replace `path` with `content` via a temp file in the same directory.
fn write_atomically(path: &Path, content: &[u8]) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut staging = NamedTempFile::new_in(dir)?;
    staging.write_all(content)?;
    staging.as_file().sync_all()?;
    staging.persist(path).map_err(|e| CacheError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl CacheStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.read_entries().await?.remove(key))
    }

    async fn save(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let mut entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(CacheError::Corrupt(reason)) => {
                log::warn!("Discarding corrupt cache file: {}", reason);
                Entries::new()
            }
            Err(e) => return Err(e),
        };
        entries.insert(entry.key.clone(), entry.clone());

        let content = serde_json::to_vec_pretty(&entries)
            .map_err(|e| CacheError::Corrupt(e.to_string()))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &content))
            .await
            .map_err(|e| CacheError::Io(std::io::Error::other(e)))?
    }
}
