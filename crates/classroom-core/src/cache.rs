use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{AppError, AppResult};

/// Default lifetime of a memoized query result.
pub const DEFAULT_QUERY_TTL_SECS: i64 = 60;

/// Key/value cache with per-entry expiry.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    /// Set a value with expiration
    async fn set(&self, key: &str, value: &str, expires_in: Duration) -> AppResult<()>;

    /// Get a live value by key
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Clear all cached values
    async fn clear(&self) -> AppResult<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> AppResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| AppError::internal("cache state poisoned"))
}

/// In-memory cache adapter for testing and development
pub struct MemoryCacheAdapter {
    data: Mutex<HashMap<String, CacheEntry>>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl MemoryCacheAdapter {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Number of entries currently stored, expired ones included.
    pub fn len(&self) -> usize {
        self.data.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCacheAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheAdapter for MemoryCacheAdapter {
    async fn set(&self, key: &str, value: &str, expires_in: Duration) -> AppResult<()> {
        let now = Utc::now();
        let mut data = lock(&self.data)?;
        data.retain(|_, entry| entry.expires_at > now);
        data.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: now + expires_in,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let data = lock(&self.data)?;
        let now = Utc::now();
        Ok(data
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        lock(&self.data)?.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let data = lock(&self.data)?;
        let now = Utc::now();
        Ok(data.get(key).is_some_and(|entry| entry.expires_at > now))
    }

    async fn clear(&self) -> AppResult<()> {
        lock(&self.data)?.clear();
        Ok(())
    }
}

/// Memoizes read queries on top of a [`CacheAdapter`].
///
/// Values are stored as JSON. Each entry may carry tags so that a write can
/// drop every query that read the data it touched. Two callers missing the
/// same key at once both compute; the later store wins.
#[derive(Clone)]
pub struct QueryCache {
    adapter: Arc<dyn CacheAdapter>,
    default_ttl: Duration,
    tags: Arc<Mutex<HashMap<String, HashSet<String>>>>,
}

impl QueryCache {
    pub fn new(adapter: Arc<dyn CacheAdapter>) -> Self {
        Self {
            adapter,
            default_ttl: Duration::seconds(DEFAULT_QUERY_TTL_SECS),
            tags: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheAdapter::new()))
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the cached value for `key`, or run `compute` and store its
    /// result for the default TTL.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        tags: &[&str],
        compute: F,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.get_or_compute_with_ttl(key, tags, self.default_ttl, compute)
            .await
    }

    pub async fn get_or_compute_with_ttl<T, F, Fut>(
        &self,
        key: &str,
        tags: &[&str],
        ttl: Duration,
        compute: F,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        if let Some(raw) = self.adapter.get(key).await? {
            match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    tracing::trace!(key, "query cache hit");
                    return Ok(value);
                }
                Err(err) => tracing::warn!(key, error = %err, "discarding unreadable cache entry"),
            }
        }

        let value = compute().await?;
        let raw = serde_json::to_string(&value)?;
        self.adapter.set(key, &raw, ttl).await?;

        let mut index = lock(&self.tags)?;
        for tag in tags {
            index
                .entry((*tag).to_string())
                .or_default()
                .insert(key.to_string());
        }

        Ok(value)
    }

    pub async fn invalidate(&self, key: &str) -> AppResult<()> {
        self.adapter.delete(key).await
    }

    /// Drop every entry stored under `tag`.
    pub async fn invalidate_tag(&self, tag: &str) -> AppResult<()> {
        let keys = lock(&self.tags)?.remove(tag).unwrap_or_default();
        for key in &keys {
            self.adapter.delete(key).await?;
        }
        if !keys.is_empty() {
            tracing::debug!(tag, count = keys.len(), "query cache tag invalidated");
        }
        Ok(())
    }

    pub async fn clear(&self) -> AppResult<()> {
        lock(&self.tags)?.clear();
        self.adapter.clear().await
    }
}
