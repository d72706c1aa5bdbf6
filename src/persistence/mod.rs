//! Persistence layer for termcore.
//!
//! The engine stores its data (command history, named state stores, installed
//! plugin metadata) through a [`PersistenceBackend`] supplied by the host.
//! Two backends ship with the crate: an in-memory map and a JSON file on disk.

mod history;
mod plugins;
mod state;

pub use history::{CommandHistory, HISTORY_KEY};
pub use plugins::{
    load_installed, save_installed, InstalledPlugin, Plugin, INSTALLED_PLUGINS_KEY,
};
pub use state::{store_key, StateStore, StateStoreManager};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

/// Key/value storage for engine data.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Reads `key` and deserializes it, treating a missing key as `None`.
pub async fn load<T: DeserializeOwned>(
    backend: &dyn PersistenceBackend,
    key: &str,
) -> Result<Option<T>> {
    match backend.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| EngineError::persistence(format!("Malformed value for '{key}': {e}"))),
        None => Ok(None),
    }
}

/// Serializes `value` and writes it under `key`.
pub async fn save<T: Serialize + ?Sized>(
    backend: &dyn PersistenceBackend,
    key: &str,
    value: &T,
) -> Result<()> {
    let value = serde_json::to_value(value)
        .map_err(|e| EngineError::persistence(format!("Failed to serialize '{key}': {e}")))?;
    backend.set(key, value).await
}

/// Volatile backend; contents live as long as the value.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        Ok(())
    }
}

/// Backend that keeps every key in one JSON object on disk.
///
/// The file is read on first access and rewritten after every mutation.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    cache: AsyncMutex<Option<Map<String, Value>>>,
}

impl FileBackend {
    /// Uses the storage file at `path`, creating it on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: AsyncMutex::new(None),
        }
    }

    /// Opens the storage file at the default platform path.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// Returns the default storage path for the current platform.
    ///
    /// - Linux: `~/.local/share/termcore/storage.json`
    /// - macOS: `~/Library/Application Support/termcore/storage.json`
    /// - Windows: `%APPDATA%\termcore\storage.json`
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| EngineError::persistence("Could not determine data directory"))?;
        Ok(data_dir.join("termcore").join("storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<Map<String, Value>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Storage file not found, starting empty");
                return Ok(Map::new());
            }
            Err(e) => {
                return Err(EngineError::persistence(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        match serde_json::from_str::<Map<String, Value>>(&contents) {
            Ok(map) => {
                info!(path = %self.path.display(), keys = map.len(), "Storage file loaded");
                Ok(map)
            }
            Err(e) => {
                warn!("Storage file is corrupt: {e}. Moving it aside and starting empty");
                self.backup_corrupt().await;
                Ok(Map::new())
            }
        }
    }

    async fn backup_corrupt(&self) {
        let backup = self.path.with_extension("json.bak");
        if let Err(e) = tokio::fs::rename(&self.path, &backup).await {
            warn!("Failed to back up corrupt storage file: {e}");
        } else {
            info!("Corrupt storage file backed up to {}", backup.display());
        }
    }

    async fn write_file(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                EngineError::persistence(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let text = serde_json::to_string_pretty(map)
            .map_err(|e| EngineError::persistence(format!("Failed to serialize storage: {e}")))?;
        tokio::fs::write(&self.path, text).await.map_err(|e| {
            EngineError::persistence(format!("Failed to write {}: {e}", self.path.display()))
        })
    }

    /// Applies `f` to the cached map (loading it first) and writes it back.
    async fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>) + Send,
    {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        let map = cache.get_or_insert_with(Map::new);
        f(map);
        self.write_file(map).await
    }
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        Ok(cache.as_ref().and_then(|map| map.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let key = key.to_string();
        self.mutate(move |map| {
            map.insert(key, value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.mutate(|map| {
            map.remove(key);
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.mutate(|map| map.clear()).await
    }
}
