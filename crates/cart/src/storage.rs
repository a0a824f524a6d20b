//! Device-local key/value storage used by anonymous carts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CartError;

/// Persistent storage on the shopper's device.
#[async_trait]
pub trait DeviceStorage: Send + Sync {
    /// Reads the value under `key`, or `None` if nothing is stored.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CartError>;

    /// Replaces the value under `key`.
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), CartError>;

    /// Deletes `key`. Deleting a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), CartError>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl DeviceStorage for FileStorage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CartError> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), CartError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(key);
        // Replaced atomically via rename.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CartError> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryStorageState {
    entries: HashMap<String, Vec<u8>>,
    fail_on_write: bool,
}

/// In-memory device storage for testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryStorageState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail.
    pub async fn set_fail_on_write(&self, fail: bool) {
        self.state.write().await.fail_on_write = fail;
    }

    /// Returns true if a value is stored under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.state.read().await.entries.contains_key(key)
    }
}

#[async_trait]
impl DeviceStorage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CartError> {
        Ok(self.state.read().await.entries.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), CartError> {
        let mut state = self.state.write().await;
        if state.fail_on_write {
            return Err(CartError::Storage("device storage is full".to_string()));
        }
        state.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CartError> {
        self.state.write().await.entries.remove(key);
        Ok(())
    }
}
