use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::builder::TieredCacheBuilder;
use crate::error::CacheError;
use crate::item::CacheItem;
use crate::keys::{KeyCodec, QueryKey};
use crate::store::Store;

/// One logical cache over an ordered list of stores.
///
/// Reads probe the tiers in order and the first tier holding the key wins. Writes,
/// deletes and clears go to every tier in order and stop at the first failure without
/// undoing the tiers already touched, so after an error the tiers may disagree; retrying
/// the whole operation is safe.
///
/// The tier list, default freshness window and key codec are fixed at construction.
pub struct TieredCache {
    tiers: Vec<Arc<dyn Store>>,
    default_freshness: Duration,
    key_codec: KeyCodec,
}

impl TieredCache {
    /// Create a tiered cache. Tiers are probed in the order given.
    pub fn new(default_freshness: Duration, tiers: Vec<Arc<dyn Store>>) -> Self {
        TieredCache {
            tiers,
            default_freshness,
            key_codec: KeyCodec::default(),
        }
    }

    /// Create a tiered cache with optional tiers.
    ///
    /// `None` members are dropped, which lets you assemble the tiers conditionally.
    ///
    /// # Example
    /// ```ignore
    /// TieredCache::with_optional_tiers(Duration::from_secs(60), vec![
    ///     Some(Arc::new(memory_store)),
    ///     if enable_redis { Some(Arc::new(redis_store)) } else { None },
    /// ])
    /// ```
    pub fn with_optional_tiers(
        default_freshness: Duration,
        tiers: Vec<Option<Arc<dyn Store>>>,
    ) -> Self {
        Self::new(default_freshness, tiers.into_iter().flatten().collect())
    }

    pub(crate) fn from_parts(
        tiers: Vec<Arc<dyn Store>>,
        default_freshness: Duration,
        key_codec: KeyCodec,
    ) -> Self {
        TieredCache {
            tiers,
            default_freshness,
            key_codec,
        }
    }

    pub fn builder() -> TieredCacheBuilder {
        TieredCacheBuilder::new()
    }

    pub fn tiers(&self) -> &[Arc<dyn Store>] {
        &self.tiers
    }

    /// Freshness window used when a query does not set its own.
    pub fn default_freshness(&self) -> Duration {
        self.default_freshness
    }

    pub fn key_codec(&self) -> KeyCodec {
        self.key_codec
    }

    /// The key each tier sees for `query_key`.
    pub fn canonical_key(&self, query_key: &QueryKey) -> Result<String, CacheError> {
        self.key_codec.derive(query_key)
    }

    /// Write `item` as a `{data, timestamp}` envelope to every tier.
    pub async fn set_item<V>(
        &self,
        key: &str,
        item: &CacheItem<V>,
        ttl: Duration,
    ) -> Result<(), CacheError>
    where
        V: Serialize,
    {
        let envelope = item.to_envelope()?;
        self.set(key, envelope, ttl).await
    }

    /// Read and decode the first live envelope for `key`.
    pub async fn get_item<V>(&self, key: &str) -> Result<CacheItem<V>, CacheError>
    where
        V: DeserializeOwned,
    {
        let payload = self.get(key).await?;
        CacheItem::from_envelope(payload)
    }
}

#[async_trait]
impl Store for TieredCache {
    fn name(&self) -> &str {
        "tiered"
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        for tier in &self.tiers {
            if let Err(e) = tier.set(key, value.clone(), ttl).await {
                tracing::warn!(tier = tier.name(), key, error = %e, "tier write failed");
                return Err(e);
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Value, CacheError> {
        for tier in &self.tiers {
            match tier.get(key).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_miss() => {
                    tracing::debug!(tier = tier.name(), key, "tier miss");
                }
                Err(e) => {
                    tracing::debug!(tier = tier.name(), key, error = %e, "tier read failed, trying next tier");
                }
            }
        }

        Err(CacheError::NotFound {
            key: key.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        for tier in &self.tiers {
            tier.delete(key).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        for tier in &self.tiers {
            tier.clear().await?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        for tier in &self.tiers {
            tier.close().await?;
        }
        Ok(())
    }
}
