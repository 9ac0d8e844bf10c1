//! Metrics middleware for cache stores.
//!
//! `MetricsStore` wraps any `Store` and reports every operation, with its latency, to a
//! user-provided sink. Wrapping individual tiers (rather than the whole tiered cache)
//! shows which tier served each read.
//!
//! # Example
//!
//! ```ignore
//! let sink = Arc::new(MyMetricsSink::new());
//! let moka = Arc::new(MokaStore::new(MokaStoreConfig::default()));
//! let l1: Arc<dyn Store> = Arc::new(MetricsStore::new(moka, sink.clone()));
//!
//! let cache = TieredCache::builder().tier(l1).tier(redis).build();
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::store::Store;

/// Metrics emitted by the MetricsStore wrapper.
#[derive(Debug, Clone)]
pub enum CacheMetric {
    /// Emitted on every read.
    Read {
        key: String,
        /// Whether the tier returned a value.
        hit: bool,
        /// The miss was an expired entry rather than an absent one.
        expired: bool,
        latency_ms: f64,
        /// Name of the wrapped tier (from Store::name()).
        tier: String,
    },
    /// Emitted on every write.
    Write {
        key: String,
        ttl: Duration,
        success: bool,
        latency_ms: f64,
        tier: String,
    },
    /// Emitted on every delete.
    Delete {
        key: String,
        success: bool,
        latency_ms: f64,
        tier: String,
    },
    /// Emitted on every clear.
    Clear {
        success: bool,
        latency_ms: f64,
        tier: String,
    },
}

/// Trait for receiving cache metrics.
///
/// `emit` runs synchronously in the hot path of every store call; buffer in memory and
/// ship from `flush`.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Emit a single metric.
    fn emit(&self, metric: CacheMetric);

    /// Flush any buffered metrics, typically at shutdown or on an interval.
    async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A store wrapper that emits metrics for all operations.
pub struct MetricsStore {
    inner: Arc<dyn Store>,
    sink: Arc<dyn MetricsSink>,
}

impl MetricsStore {
    /// Create a new MetricsStore wrapping the given store.
    pub fn new(inner: Arc<dyn Store>, sink: Arc<dyn MetricsSink>) -> Self {
        MetricsStore { inner, sink }
    }

    /// Get a reference to the metrics sink.
    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }

    fn elapsed_ms(start: Instant) -> f64 {
        start.elapsed().as_secs_f64() * 1000.0
    }

    fn tier(&self) -> String {
        self.inner.name().to_string()
    }
}

#[async_trait]
impl Store for MetricsStore {
    /// Reports the wrapped tier's name so logs and metrics agree.
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.inner.set(key, value, ttl).await;

        self.sink.emit(CacheMetric::Write {
            key: key.to_string(),
            ttl,
            success: result.is_ok(),
            latency_ms: Self::elapsed_ms(start),
            tier: self.tier(),
        });

        result
    }

    async fn get(&self, key: &str) -> Result<Value, CacheError> {
        let start = Instant::now();
        let result = self.inner.get(key).await;

        self.sink.emit(CacheMetric::Read {
            key: key.to_string(),
            hit: result.is_ok(),
            expired: matches!(result, Err(CacheError::Expired { .. })),
            latency_ms: Self::elapsed_ms(start),
            tier: self.tier(),
        });

        result
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.inner.delete(key).await;

        self.sink.emit(CacheMetric::Delete {
            key: key.to_string(),
            success: result.is_ok(),
            latency_ms: Self::elapsed_ms(start),
            tier: self.tier(),
        });

        result
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.inner.clear().await;

        self.sink.emit(CacheMetric::Clear {
            success: result.is_ok(),
            latency_ms: Self::elapsed_ms(start),
            tier: self.tier(),
        });

        result
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.inner.close().await
    }
}
