//! Key-value backends.
//!
//! Keys are always user-scoped (`<collection>:<user_id>`), so every backend
//! only needs per-key atomicity.  Reads of missing keys return `None`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use wl_domain::config::{StoreBackend, StoreConfig};
use wl_domain::error::{Error, Result};

/// Minimal async key-value interface every session backend implements.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: String) -> Result<()>;
    async fn remove_item(&self, key: &str) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-local store.  Everything is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.items.write().insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().remove(key);
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Store backed by `<dir>/store.json`, written through on every change.
pub struct JsonFileStore {
    path: PathBuf,
    items: RwLock<HashMap<String, String>>,
    /// Serializes flushes so two writers never share the temp file.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    /// Load or create the store at `dir/store.json`.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(Error::Io)?;

        let path = dir.join("store.json");
        let items: HashMap<String, String> = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            match serde_json::from_str(&raw) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "store file is corrupt, starting empty"
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        tracing::info!(
            keys = items.len(),
            path = %path.display(),
            "session store loaded"
        );

        Ok(Self {
            path,
            items: RwLock::new(items),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the current contents to disk.
    ///
    /// Writes to a sibling temp file and renames it over the old one so a
    /// crash mid-write never leaves a truncated store behind.
    async fn flush(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let json = {
            let items = self.items.read();
            serde_json::to_string_pretty(&*items)
                .map_err(|e| Error::Store(format!("serializing store: {e}")))?
        };
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(Error::Io)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(Error::Io)?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.items.write().insert(key.to_owned(), value);
        self.flush().await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let removed = self.items.write().remove(key).is_some();
        if removed {
            self.flush().await?;
        }
        Ok(())
    }
}

/// Build the configured backend.
pub fn open_store(cfg: &StoreConfig) -> Result<Arc<dyn KvStore>> {
    match cfg.backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory session store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::File => {
            let dir = cfg
                .path
                .as_deref()
                .ok_or_else(|| Error::Config("store.path is required for the file backend".into()))?;
            Ok(Arc::new(JsonFileStore::new(dir)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item("nope").await.unwrap(), None);
        // Removing a missing key is not an error.
        store.remove_item("nope").await.unwrap();
    }

    #[tokio::test]
    async fn memory_set_get_remove() {
        let store = MemoryStore::new();
        store.set_item("a:1", "x".into()).await.unwrap();
        assert_eq!(store.get_item("a:1").await.unwrap().as_deref(), Some("x"));
        store.set_item("a:1", "y".into()).await.unwrap();
        assert_eq!(store.get_item("a:1").await.unwrap().as_deref(), Some("y"));
        assert_eq!(store.len(), 1);
        store.remove_item("a:1").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::new(dir.path()).unwrap();
            store.set_item("session:42", "{}".into()).await.unwrap();
            store.set_item("session:43", "{}".into()).await.unwrap();
            store.remove_item("session:43").await.unwrap();
        }
        let store = JsonFileStore::new(dir.path()).unwrap();
        assert_eq!(
            store.get_item("session:42").await.unwrap().as_deref(),
            Some("{}")
        );
        assert_eq!(store.get_item("session:43").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("store.json"), "not json").unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        assert_eq!(store.get_item("anything").await.unwrap(), None);
    }

    #[test]
    fn open_file_store_requires_path() {
        let cfg = StoreConfig {
            backend: StoreBackend::File,
            path: None,
        };
        assert!(matches!(open_store(&cfg), Err(Error::Config(_))));
    }
}
