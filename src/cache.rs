//! TTL cache over a persistent key/value store.
//!
//! Values are wrapped in a JSON envelope carrying the write time. Absent,
//! expired and corrupt entries all read as a miss, and the latter two are
//! evicted on the read that finds them. Writes never fail the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const ENVELOPE_VERSION: &str = "1.0";

pub const NEWS_CACHE: &str = "news_cache";
pub const NEWS_BACKUP_CACHE: &str = "news_cache_backup";
pub const TOOLS_CACHE: &str = "tools_cache";
pub const PRODUCTS_CACHE: &str = "products_cache";
pub const LEARNING_CACHE: &str = "learning_cache";
pub const TOPICS_CACHE: &str = "topics_cache";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage quota exceeded")]
    QuotaExceeded,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Raw string storage behind the cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn save(&self, key: &str, envelope: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Envelope persisted for every cached value.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    /// Write time in milliseconds since the Unix epoch
    pub timestamp: i64,
    pub version: String,
}

/// In-process store, optionally limited to a total number of bytes.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn save(&self, key: &str, envelope: &str) -> Result<(), StorageError> {
        let mut entries = self.entries();
        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if others + envelope.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), envelope.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}

#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl CacheManager {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now()).await
    }

    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) {
        self.set_at(key, value, Utc::now()).await
    }

    pub async fn get_at<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let raw = match self.store.load(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, "Cache read failed: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(entry) if entry.version != ENVELOPE_VERSION => {
                warn!(key, version = %entry.version, "Unknown cache envelope version, evicting");
            }
            Ok(entry) if self.is_fresh(entry.timestamp, now) => {
                debug!(key, "Cache hit");
                return Some(entry.value);
            }
            Ok(_) => debug!(key, "Cache entry expired, evicting"),
            Err(e) => warn!(key, "Corrupt cache entry, evicting: {}", e),
        }

        self.invalidate(key).await;
        None
    }

    pub async fn set_at<T: Serialize + Sync>(&self, key: &str, value: &T, now: DateTime<Utc>) {
        let entry = CacheEntry {
            value,
            timestamp: now.timestamp_millis(),
            version: ENVELOPE_VERSION.to_string(),
        };

        let envelope = match serde_json::to_string(&entry) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key, "Could not serialize cache value: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.save(key, &envelope).await {
            warn!(key, "Cache write failed: {}", e);
            // An older entry must not outlive a failed refresh
            self.invalidate(key).await;
        }
    }

    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            warn!(key, "Cache eviction failed: {}", e);
        }
    }

    fn is_fresh(&self, timestamp_ms: i64, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() - timestamp_ms < self.ttl.num_milliseconds()
    }
}
