use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::store::Store;

/// Configuration for MokaStore.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MokaStoreConfig {
    /// Name reported by [`Store::name`].
    pub name: String,

    /// Maximum number of entries the cache can hold.
    pub max_capacity: u64,

    /// Time to idle: entries are expired if not accessed within this many milliseconds.
    /// `None` means entries don't expire based on idle time.
    pub time_to_idle_ms: Option<u64>,
}

impl Default for MokaStoreConfig {
    fn default() -> Self {
        MokaStoreConfig {
            name: "moka".to_string(),
            max_capacity: 10_000,
            time_to_idle_ms: None,
        }
    }
}

#[derive(Clone)]
struct Expiring {
    value: Value,
    ttl: Duration,
}

/// Expire each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Expiring> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Expiring,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Expiring,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// High-performance concurrent store using Moka.
///
/// MokaStore provides:
/// - Lock-free concurrent access for reads and writes
/// - Per-entry expiry taken from each `set`'s TTL
/// - Size-bounded eviction handled by Moka itself
///
/// Expired entries are indistinguishable from absent ones and surface as
/// [`CacheError::NotFound`].
pub struct MokaStore {
    name: String,
    cache: Cache<String, Expiring>,
    closed: AtomicBool,
}

impl MokaStore {
    /// Create a new MokaStore with the given configuration.
    ///
    /// # Example
    /// ```ignore
    /// let config = MokaStoreConfig {
    ///     max_capacity: 10_000,
    ///     time_to_idle_ms: Some(60_000),
    ///     ..Default::default()
    /// };
    /// let store = MokaStore::new(config);
    /// ```
    pub fn new(config: MokaStoreConfig) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl);

        if let Some(tti) = config.time_to_idle_ms {
            builder = builder.time_to_idle(Duration::from_millis(tti));
        }

        MokaStore {
            name: config.name,
            cache: builder.build(),
            closed: AtomicBool::new(false),
        }
    }

    /// Approximate number of live entries (for monitoring/debugging).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    fn ensure_open(&self, key: &str) -> Result<(), CacheError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::store(&self.name, key, "store is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MokaStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.ensure_open(key)?;
        self.cache
            .insert(key.to_string(), Expiring { value, ttl })
            .await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Value, CacheError> {
        self.ensure_open(key)?;
        match self.cache.get(key).await {
            Some(entry) => Ok(entry.value),
            None => Err(CacheError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.ensure_open(key)?;
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.ensure_open("")?;
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(CacheError::store(&self.name, "", "store already closed"));
        }
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}
