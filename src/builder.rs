//! Builder API for assembling a [`TieredCache`].

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::keys::KeyCodec;
use crate::store::Store;
use crate::tiered::TieredCache;

/// Settings of a [`TieredCache`] that do not involve the stores themselves.
///
/// Deserializable so it can live in an application's config file:
///
/// ```toml
/// default_freshness_ms = 30000
/// key_codec = "sorted_hashed"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TieredCacheConfig {
    /// Freshness window for queries that do not set one, in milliseconds.
    pub default_freshness_ms: u64,

    /// How query keys are turned into tier keys.
    pub key_codec: KeyCodec,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        TieredCacheConfig {
            default_freshness_ms: 60_000,
            key_codec: KeyCodec::default(),
        }
    }
}

impl TieredCacheConfig {
    pub fn default_freshness(&self) -> Duration {
        Duration::from_millis(self.default_freshness_ms)
    }
}

/// Builder for [`TieredCache`].
///
/// # Example
///
/// ```ignore
/// let cache = TieredCache::builder()
///     .tier(Arc::new(MokaStore::new(MokaStoreConfig::default())))
///     .optional_tier(redis.map(|r| Arc::new(r) as Arc<dyn Store>))
///     .default_freshness(Duration::from_secs(30))
///     .build();
/// ```
#[derive(Default)]
pub struct TieredCacheBuilder {
    tiers: Vec<Arc<dyn Store>>,
    config: TieredCacheConfig,
    /// Set through [`Self::default_freshness`]; keeps sub-millisecond precision.
    default_freshness: Option<Duration>,
}

impl TieredCacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tier. Tiers are probed in the order they are added.
    pub fn tier(mut self, store: Arc<dyn Store>) -> Self {
        self.tiers.push(store);
        self
    }

    /// Append a tier if present.
    pub fn optional_tier(mut self, store: Option<Arc<dyn Store>>) -> Self {
        self.tiers.extend(store);
        self
    }

    pub fn default_freshness(mut self, freshness: Duration) -> Self {
        self.default_freshness = Some(freshness);
        self
    }

    pub fn key_codec(mut self, codec: KeyCodec) -> Self {
        self.config.key_codec = codec;
        self
    }

    /// Replace every non-tier setting at once.
    pub fn config(mut self, config: TieredCacheConfig) -> Self {
        self.config = config;
        self.default_freshness = None;
        self
    }

    pub fn build(self) -> TieredCache {
        let default_freshness = self
            .default_freshness
            .unwrap_or_else(|| self.config.default_freshness());
        TieredCache::from_parts(
            self.tiers,
            default_freshness,
            self.config.key_codec,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::{HashMapStore, HashMapStoreConfig};

    #[test]
    fn test_builder_keeps_tier_order_and_settings() {
        let l1: Arc<dyn Store> = Arc::new(HashMapStore::new(HashMapStoreConfig {
            name: "l1".into(),
            ..Default::default()
        }));
        let l2: Arc<dyn Store> = Arc::new(HashMapStore::new(HashMapStoreConfig {
            name: "l2".into(),
            ..Default::default()
        }));

        let cache = TieredCacheBuilder::new()
            .tier(l1)
            .optional_tier(None)
            .optional_tier(Some(l2))
            .default_freshness(Duration::from_secs(2))
            .key_codec(KeyCodec::Json)
            .build();

        let names: Vec<&str> = cache.tiers().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["l1", "l2"]);
        assert_eq!(cache.default_freshness(), Duration::from_secs(2));
        assert_eq!(cache.key_codec(), KeyCodec::Json);
    }

    #[test]
    fn test_sub_millisecond_freshness_is_kept() {
        let cache = TieredCacheBuilder::new()
            .default_freshness(Duration::from_micros(900))
            .build();
        assert_eq!(cache.default_freshness(), Duration::from_micros(900));

        let cache = TieredCacheBuilder::new()
            .default_freshness(Duration::MAX)
            .build();
        assert_eq!(cache.default_freshness(), Duration::MAX);
    }

    #[test]
    fn test_last_freshness_setting_wins() {
        let cache = TieredCacheBuilder::new()
            .default_freshness(Duration::from_secs(5))
            .config(TieredCacheConfig {
                default_freshness_ms: 1_500,
                key_codec: KeyCodec::Json,
            })
            .build();
        assert_eq!(cache.default_freshness(), Duration::from_millis(1_500));

        let cache = TieredCacheBuilder::new()
            .config(TieredCacheConfig::default())
            .default_freshness(Duration::from_millis(250))
            .build();
        assert_eq!(cache.default_freshness(), Duration::from_millis(250));
    }

    #[test]
    fn test_config_from_json() {
        let config: TieredCacheConfig =
            serde_json::from_str(r#"{ "default_freshness_ms": 1500, "key_codec": "hashed" }"#)
                .unwrap();
        assert_eq!(config.default_freshness(), Duration::from_millis(1500));
        assert_eq!(config.key_codec, KeyCodec::Hashed);

        let partial: TieredCacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(partial.default_freshness(), Duration::from_secs(60));
        assert_eq!(partial.key_codec, KeyCodec::SortedHashed);
    }
}
