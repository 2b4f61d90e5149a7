//! Key-value persistence used for chart records and the house cache.
//!
//! Items are JSON documents addressed by a partition key and a sort key. A
//! put may carry a time-to-live; backends report expired items as absent.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store item is not valid json: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store {operation} timed out after {timeout_ms} ms")]
    Timeout { operation: &'static str, timeout_ms: u64 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, partition_key: &str, sort_key: &str) -> Result<Option<Value>, StoreError>;

    async fn put(
        &self,
        partition_key: &str,
        sort_key: &str,
        item: Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    item: Value,
}

impl StoredItem {
    fn new(item: Value, ttl: Option<Duration>) -> Self {
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
        StoredItem { expires_at, item }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    fn live(self, now: DateTime<Utc>) -> Option<Value> {
        if self.is_expired(now) {
            None
        } else {
            Some(self.item)
        }
    }
}

/// In-process store, shared by all requests of one process. Expired items are
/// dropped when read and swept on every write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<(String, String), StoredItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, partition_key: &str, sort_key: &str) -> Result<Option<Value>, StoreError> {
        let key = (partition_key.to_string(), sort_key.to_string());
        let now = Utc::now();
        {
            let items = self.items.read().await;
            match items.get(&key) {
                None => return Ok(None),
                Some(stored) if !stored.is_expired(now) => return Ok(Some(stored.item.clone())),
                Some(_) => {}
            }
        }
        let mut items = self.items.write().await;
        if items.get(&key).is_some_and(|stored| stored.is_expired(now)) {
            items.remove(&key);
        }
        Ok(None)
    }

    async fn put(
        &self,
        partition_key: &str,
        sort_key: &str,
        item: Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        let now = Utc::now();
        items.retain(|_, stored| !stored.is_expired(now));
        items.insert((partition_key.to_string(), sort_key.to_string()), StoredItem::new(item, ttl));
        Ok(())
    }
}

/// Longest hex-encoded key used verbatim as a path segment. Longer keys are
/// replaced by their SHA-256 so every file name stays under 255 bytes.
const MAX_SEGMENT_LEN: usize = 200;

/// One JSON file per item under `root/<partition>/<sort>.json`, both keys
/// hex-encoded so arbitrary identifiers map to safe file names.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(FileStore { root })
    }

    fn item_path(&self, partition_key: &str, sort_key: &str) -> PathBuf {
        self.root
            .join(path_segment(partition_key))
            .join(format!("{}.json", path_segment(sort_key)))
    }
}

fn path_segment(key: &str) -> String {
    let encoded = hex::encode(key);
    if encoded.len() <= MAX_SEGMENT_LEN {
        encoded
    } else {
        // hex never contains '-', so hashed names cannot collide with encoded ones
        format!("sha256-{}", hex::encode(Sha256::digest(key.as_bytes())))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, partition_key: &str, sort_key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.item_path(partition_key, sort_key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredItem = serde_json::from_slice(&bytes)?;
        let item = stored.live(Utc::now());
        if item.is_none() {
            debug!(path = %path.display(), "stored item expired");
        }
        Ok(item)
    }

    async fn put(
        &self,
        partition_key: &str,
        sort_key: &str,
        item: Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let path = self.item_path(partition_key, sort_key);
        let bytes = serde_json::to_vec(&StoredItem::new(item, ttl))?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Unavailable(format!("{} has no parent directory", path.display())))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("user-1", "NATAL_CHART").await.unwrap().is_none());

        store
            .put("user-1", "NATAL_CHART", json!({"chartType": "natal"}), None)
            .await
            .unwrap();
        let item = store.get("user-1", "NATAL_CHART").await.unwrap().unwrap();
        assert_eq!(item["chartType"], "natal");
        assert!(store.get("user-1", "HOUSES").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn memory_honours_ttl() {
        let store = MemoryStore::new();
        store.put("a", "b", json!(1), Some(Duration::ZERO)).await.unwrap();
        assert!(store.get("a", "b").await.unwrap().is_none());

        store.put("a", "b", json!(2), Some(Duration::from_secs(3600))).await.unwrap();
        assert_eq!(store.get("a", "b").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn memory_drops_expired_items() {
        let store = MemoryStore::new();
        store.put("a", "b", json!(1), Some(Duration::ZERO)).await.unwrap();
        assert!(store.get("a", "b").await.unwrap().is_none());
        assert!(store.is_empty().await);

        store.put("c", "d", json!(2), Some(Duration::ZERO)).await.unwrap();
        store.put("e", "f", json!(3), None).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("e", "f").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn file_long_keys_stay_within_name_limits() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let subject = "s".repeat(300);
        let other = format!("{}t", "s".repeat(299));

        store.put(&subject, "NATAL_CHART", json!({"n": 1}), None).await.unwrap();
        store.put(&other, "NATAL_CHART", json!({"n": 2}), None).await.unwrap();
        assert_eq!(store.get(&subject, "NATAL_CHART").await.unwrap(), Some(json!({"n": 1})));
        assert_eq!(store.get(&other, "NATAL_CHART").await.unwrap(), Some(json!({"n": 2})));

        let path = store.item_path(&subject, "NATAL_CHART");
        for part in path.strip_prefix(dir.path()).unwrap().components() {
            assert!(part.as_os_str().len() < 255);
        }
        assert_eq!(path_segment("CACHE#abc"), hex::encode("CACHE#abc"));
    }

    #[tokio::test]
    async fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let item = json!({"houses": {"status": "success"}, "subjectId": "a/b#c"});

        store.put("CACHE#abc", "HOUSES", item.clone(), None).await.unwrap();
        assert_eq!(store.get("CACHE#abc", "HOUSES").await.unwrap(), Some(item));
        assert!(store.get("CACHE#abd", "HOUSES").await.unwrap().is_none());

        // overwrite replaces in place
        store.put("CACHE#abc", "HOUSES", json!(7), None).await.unwrap();
        assert_eq!(store.get("CACHE#abc", "HOUSES").await.unwrap(), Some(json!(7)));
    }

    #[tokio::test]
    async fn file_expired_item_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.put("k", "s", json!(true), Some(Duration::ZERO)).await.unwrap();
        assert!(store.get("k", "s").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_corrupt_item_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let path = store.item_path("k", "s");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(store.get("k", "s").await, Err(StoreError::Serialization(_))));
    }
}
