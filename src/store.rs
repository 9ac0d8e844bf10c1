use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::CacheError;

/// A store is one tier of a [`TieredCache`](crate::TieredCache).
///
/// Values are opaque JSON payloads; the store only has to hand back what it was given
/// until `ttl` runs out. How expiry is tracked (absolute timestamp at store time, native
/// backend TTL) is up to the implementation, but an expired entry must surface as an
/// error from `get`.
///
/// Implementations must be safe to call concurrently from callers and from background
/// refresh tasks.
#[async_trait]
pub trait Store: Send + Sync {
    /// A name for metrics/tracing.
    ///
    /// # Example
    /// - "memory"
    /// - "redis"
    /// - "tiered"
    fn name(&self) -> &str;

    /// Stores `value` under `key` for at most `ttl`.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Return the cached value.
    ///
    /// Misses are errors: [`CacheError::NotFound`] when the key is absent and
    /// [`CacheError::Expired`] when it outlived its TTL.
    async fn get(&self, key: &str) -> Result<Value, CacheError>;

    /// Removes the key from the store.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Removes every entry from the store.
    async fn clear(&self) -> Result<(), CacheError>;

    /// Releases connections or other resources held by the store.
    async fn close(&self) -> Result<(), CacheError>;
}
