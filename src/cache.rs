use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use natal_ephemeris::HouseSystem;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::houses::HouseComputationResult;
use crate::store::{KeyValueStore, StoreError};
use crate::time::BirthParameters;

pub const CACHE_SORT_KEY: &str = "HOUSES";
const CACHE_PARTITION_PREFIX: &str = "CACHE#";

/// Content hash of everything that determines a house computation. The time
/// zone is not part of it; two zones that give the same local date and time
/// share a key.
pub fn cache_key(params: &BirthParameters, system: HouseSystem, algo_version: &str) -> String {
    // adding 0.0 folds -0.0 into 0.0 so both print the same
    let canonical = format!(
        "{}|{}|{}|{}|{}|{}",
        params.birth_date.format("%Y-%m-%d"),
        params.birth_time.format("%H:%M:%S"),
        params.latitude + 0.0,
        params.longitude + 0.0,
        system.code(),
        algo_version,
    );
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub value: HouseComputationResult,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

/// Advisory cache for house results. Every failure is logged and absorbed.
#[derive(Clone)]
pub struct HouseCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    timeout: Duration,
    enabled: bool,
}

impl HouseCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration, timeout: Duration) -> Self {
        HouseCache {
            store,
            ttl,
            timeout,
            enabled: true,
        }
    }

    pub fn disabled(store: Arc<dyn KeyValueStore>) -> Self {
        HouseCache {
            store,
            ttl: Duration::ZERO,
            timeout: Duration::ZERO,
            enabled: false,
        }
    }

    fn partition(key: &str) -> String {
        format!("{}{}", CACHE_PARTITION_PREFIX, key)
    }

    /// Cached result for `key`. Store errors, timeouts and unreadable or
    /// mismatched entries all count as a miss.
    pub async fn get(&self, key: &str) -> Option<HouseComputationResult> {
        if !self.enabled {
            return None;
        }
        let partition = Self::partition(key);
        let read = match tokio::time::timeout(self.timeout, self.store.get(&partition, CACHE_SORT_KEY)).await {
            Ok(read) => read,
            Err(_) => Err(StoreError::Timeout {
                operation: "get",
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };
        let item = match read {
            Ok(Some(item)) => item,
            Ok(None) => {
                debug!(cache_key = key, "house cache miss");
                return None;
            }
            Err(e) => {
                warn!(cache_key = key, error = %e, "house cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_value::<CacheEntry>(item) {
            Ok(entry) if entry.key == key => {
                debug!(cache_key = key, "house cache hit");
                Some(entry.value)
            }
            Ok(entry) => {
                warn!(cache_key = key, stored_key = %entry.key, "house cache entry key mismatch, treating as miss");
                None
            }
            Err(e) => {
                warn!(cache_key = key, error = %e, "house cache entry unreadable, treating as miss");
                None
            }
        }
    }

    /// Stores `value` under `key`. Returns whether the write landed.
    pub async fn put(&self, key: &str, value: &HouseComputationResult) -> bool {
        if !self.enabled {
            return false;
        }
        let entry = CacheEntry {
            key: key.to_string(),
            value: value.clone(),
            created_at: Utc::now(),
            ttl_seconds: self.ttl.as_secs(),
        };
        let item = match serde_json::to_value(&entry) {
            Ok(item) => item,
            Err(e) => {
                warn!(cache_key = key, error = %e, "house cache entry not serializable");
                return false;
            }
        };
        let partition = Self::partition(key);
        let write = self.store.put(&partition, CACHE_SORT_KEY, item, Some(self.ttl));
        match tokio::time::timeout(self.timeout, write).await {
            Ok(Ok(())) => {
                debug!(cache_key = key, "house cache written");
                true
            }
            Ok(Err(e)) => {
                warn!(cache_key = key, error = %e, "house cache write failed");
                false
            }
            Err(_) => {
                warn!(cache_key = key, timeout_ms = self.timeout.as_millis() as u64, "house cache write timed out");
                false
            }
        }
    }
}
