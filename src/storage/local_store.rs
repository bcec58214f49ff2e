use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::services::sync_service::{ChangeFeed, PortalEvent};

/// Persistent key-value store standing in for browser cookies and local
/// storage.
///
/// Every write that changes a value is flushed to disk and announced on the
/// [`ChangeFeed`]. Memory only changes once the disk write went through. A
/// store opened without a path keeps everything in memory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: Option<PathBuf>,
    entries: Arc<RwLock<BTreeMap<String, JsonValue>>>,
    feed: ChangeFeed,
}

impl LocalStore {
    pub fn in_memory(feed: ChangeFeed) -> Self {
        Self {
            path: None,
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            feed,
        }
    }

    /// Loads `path` if it exists. A corrupt file is logged and replaced on
    /// the next write rather than failing startup.
    pub async fn open(path: impl AsRef<Path>, feed: ChangeFeed) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Ok(Self::in_memory(feed));
        }

        let entries = match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, JsonValue>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable store file");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = entries.len(), "opened local store");

        Ok(Self {
            path: Some(path.to_path_buf()),
            entries: Arc::new(RwLock::new(entries)),
            feed,
        })
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub async fn get(&self, key: &str) -> Option<JsonValue> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key).await? {
            JsonValue::String(s) => Some(s),
            JsonValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Reads a typed value; a value that no longer matches `T` reads as
    /// missing.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(key, error = %e, "stored value has an unexpected shape");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut entries = self.entries.write().await;
        if entries.get(key) == Some(&value) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        self.persist(&next).await?;
        *entries = next;
        drop(entries);

        self.feed.publish(PortalEvent::StoreChanged { key: key.to_string() });
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next).await?;
        *entries = next;
        drop(entries);

        self.feed.publish(PortalEvent::StoreChanged { key: key.to_string() });
        Ok(true)
    }

    pub async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().await;
        self.persist(&BTreeMap::new()).await?;
        entries.clear();
        drop(entries);

        self.feed.publish(PortalEvent::StoreCleared);
        Ok(())
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    // Write-then-rename so a crash never leaves a half-written file.
    async fn persist(&self, entries: &BTreeMap<String, JsonValue>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(entries)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
