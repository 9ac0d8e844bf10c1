use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::CacheError;
use crate::store::Store;

/// Configuration for sweeping expired entries on set operations.
#[derive(Debug, Clone, Deserialize)]
pub struct EvictOnSetConfig {
    /// Provide a number between 0 and 1 to calculate whether the sweep should run on each set.
    ///
    /// - `1.0` -> sweep on every `set`
    /// - `0.5` -> sweep on every 2nd `set` (on average)
    /// - `0.0` -> disable the sweep
    pub frequency: f64,
}

impl Default for EvictOnSetConfig {
    fn default() -> Self {
        EvictOnSetConfig { frequency: 0.1 }
    }
}

/// Configuration for HashMapStore.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HashMapStoreConfig {
    /// Name reported by [`Store::name`], used to tell tiers apart in logs.
    pub name: String,

    /// Remove expired entries during `set`. `None` leaves them until a read finds them.
    pub evict_on_set: Option<EvictOnSetConfig>,
}

impl Default for HashMapStoreConfig {
    fn default() -> Self {
        HashMapStoreConfig {
            name: "memory".to_string(),
            evict_on_set: Some(EvictOnSetConfig::default()),
        }
    }
}

/// Internal stored value with expiration time.
struct StoredValue {
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
    value: Value,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Thread-safe in-memory store using HashMap with RwLock.
///
/// Expiry is fixed when the value is stored. An expired entry is dropped by the first
/// read that finds it, or by the sweep that `evict_on_set` runs during writes.
///
/// For high-concurrency scenarios, consider using `MokaStore` instead.
pub struct HashMapStore {
    name: String,
    state: RwLock<HashMap<String, StoredValue>>,
    evict_on_set: Option<EvictOnSetConfig>,
    closed: AtomicBool,
}

impl HashMapStore {
    /// Create a new HashMapStore with the given configuration.
    pub fn new(config: HashMapStoreConfig) -> Self {
        HashMapStore {
            name: config.name,
            state: RwLock::new(HashMap::new()),
            evict_on_set: config.evict_on_set,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of entries held, including expired ones not yet read.
    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn should_sweep(&self) -> bool {
        let Some(ref config) = self.evict_on_set else {
            return false;
        };

        if config.frequency <= 0.0 {
            false
        } else if config.frequency >= 1.0 {
            true
        } else {
            rand::random::<f64>() < config.frequency
        }
    }

    fn ensure_open(&self, key: &str) -> Result<(), CacheError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::store(&self.name, key, "store is closed"));
        }
        Ok(())
    }
}

impl Default for HashMapStore {
    fn default() -> Self {
        Self::new(HashMapStoreConfig::default())
    }
}

#[async_trait]
impl Store for HashMapStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.ensure_open(key)?;

        let now = Instant::now();
        let mut state = self.state.write().await;

        if self.should_sweep() {
            let before = state.len();
            state.retain(|_, stored| !stored.is_expired(now));
            tracing::trace!(tier = %self.name, removed = before - state.len(), "swept expired entries");
        }

        state.insert(
            key.to_string(),
            StoredValue {
                expires_at: now.checked_add(ttl),
                value,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Value, CacheError> {
        self.ensure_open(key)?;

        let state = self.state.read().await;
        let Some(stored) = state.get(key) else {
            return Err(CacheError::NotFound {
                key: key.to_string(),
            });
        };

        if !stored.is_expired(Instant::now()) {
            return Ok(stored.value.clone());
        }

        // Entry is expired, remove it
        drop(state);
        let mut state = self.state.write().await;
        if state
            .get(key)
            .is_some_and(|stored| stored.is_expired(Instant::now()))
        {
            state.remove(key);
        }

        Err(CacheError::Expired {
            tier: self.name.clone(),
            key: key.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.ensure_open(key)?;
        self.state.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.ensure_open("")?;
        self.state.write().await.clear();
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(CacheError::store(&self.name, "", "store already closed"));
        }
        self.state.write().await.clear();
        Ok(())
    }
}
