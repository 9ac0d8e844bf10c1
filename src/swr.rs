use chrono::Utc;
use futures::future::{AbortRegistration, Abortable};
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;
use crate::item::{CacheItem, ItemStatus};
use crate::keys::QueryKey;
use crate::store::Store;
use crate::tiered::TieredCache;

/// Per-call settings for [`SwrCache::query`].
#[derive(Debug)]
pub struct QueryOptions {
    /// Maximum age at which a cached value is served without a refresh.
    /// `Duration::ZERO` means "use the cache's default".
    pub freshness: Duration,

    /// Lifetime handed to every tier on write. Keep it at or above `freshness`, otherwise
    /// entries expire before they ever go stale.
    pub ttl: Duration,

    /// Aborting the paired `AbortHandle` stops the synchronous part of the query at its
    /// next await point with [`CacheError::Cancelled`].
    pub cancel: Option<AbortRegistration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            freshness: Duration::ZERO,
            ttl: Duration::from_secs(300),
            cancel: None,
        }
    }
}

impl QueryOptions {
    pub fn new(freshness: Duration, ttl: Duration) -> Self {
        QueryOptions {
            freshness,
            ttl,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, registration: AbortRegistration) -> Self {
        self.cancel = Some(registration);
        self
    }
}

/// Read-through cache with stale-while-revalidate semantics on top of a [`TieredCache`].
///
/// - Miss: the recompute function runs on the caller's task, its result is stored and
///   returned.
/// - Fresh hit: the cached value is returned, nothing else happens.
/// - Stale hit: the cached value is returned and the recompute function runs in a
///   detached tokio task that overwrites the entry when it succeeds.
///
/// Refreshes are not de-duplicated: two callers hitting the same stale key each start
/// one.
#[derive(Clone)]
pub struct SwrCache {
    cache: Arc<TieredCache>,
}

impl SwrCache {
    pub fn new(cache: Arc<TieredCache>) -> Self {
        SwrCache { cache }
    }

    pub fn tiered(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Stale-while-revalidate: get the cached value or compute it.
    ///
    /// # Arguments
    /// * `query_key` - Identifies the computation; canonicalized with the cache's key codec
    /// * `recompute` - Produces the value on a miss or stale hit
    /// * `options` - Freshness window, TTL and optional cancellation
    ///
    /// # Example
    /// ```ignore
    /// let report = swr
    ///     .query(&query_key!["report", org_id, &filters]?, move || async move {
    ///         db.build_report(org_id, filters).await
    ///     }, QueryOptions::new(Duration::from_secs(2), Duration::from_secs(10)))
    ///     .await?;
    /// ```
    pub async fn query<V, F, Fut, E>(
        &self,
        query_key: &QueryKey,
        recompute: F,
        options: QueryOptions,
    ) -> Result<V, CacheError>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        let QueryOptions {
            freshness,
            ttl,
            cancel,
        } = options;

        let lookup = self.lookup(query_key, recompute, freshness, ttl);

        match cancel {
            Some(registration) => Abortable::new(lookup, registration)
                .await
                .unwrap_or(Err(CacheError::Cancelled)),
            None => lookup.await,
        }
    }

    /// Return the cached item without triggering any computation.
    ///
    /// The response will be `None` when no tier holds the key.
    pub async fn get<V>(&self, query_key: &QueryKey) -> Result<Option<CacheItem<V>>, CacheError>
    where
        V: DeserializeOwned,
    {
        let key = self.cache.canonical_key(query_key)?;
        match self.cache.get_item(&key).await {
            Ok(item) => Ok(Some(item)),
            Err(CacheError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Store a value computed now under `query_key` in every tier.
    pub async fn set<V>(&self, query_key: &QueryKey, value: V, ttl: Duration) -> Result<(), CacheError>
    where
        V: Serialize,
    {
        let key = self.cache.canonical_key(query_key)?;
        self.cache.set_item(&key, &CacheItem::new(value), ttl).await
    }

    /// Remove `query_key` from every tier.
    pub async fn invalidate(&self, query_key: &QueryKey) -> Result<(), CacheError> {
        let key = self.cache.canonical_key(query_key)?;
        self.cache.delete(&key).await
    }

    async fn lookup<V, F, Fut, E>(
        &self,
        query_key: &QueryKey,
        recompute: F,
        freshness: Duration,
        ttl: Duration,
    ) -> Result<V, CacheError>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        let key = self.cache.canonical_key(query_key)?;
        let freshness = if freshness.is_zero() {
            self.cache.default_freshness()
        } else {
            freshness
        };

        let payload = match self.cache.get(&key).await {
            Ok(payload) => payload,
            Err(CacheError::NotFound { .. }) => {
                tracing::debug!(key = %key, "cache miss, computing");
                return self.load(key, recompute, ttl).await;
            }
            Err(e) => return Err(e),
        };

        let item: CacheItem<V> = CacheItem::from_envelope(payload)?;

        match item.status(freshness, Utc::now()) {
            ItemStatus::Fresh => {
                tracing::debug!(key = %key, "serving fresh value");
            }
            ItemStatus::Stale => {
                tracing::debug!(
                    key = %key,
                    age_ms = item.age(Utc::now()).as_millis() as u64,
                    "serving stale value, refreshing in background"
                );
                self.spawn_refresh(key, recompute, ttl);
            }
        }

        Ok(item.data)
    }

    /// Compute on the caller's task and store the result.
    async fn load<V, F, Fut, E>(&self, key: String, recompute: F, ttl: Duration) -> Result<V, CacheError>
    where
        V: Serialize + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let data = recompute().await.map_err(CacheError::recompute)?;
        let item = CacheItem::new(data);

        match self.cache.set_item(&key, &item, ttl).await {
            Ok(()) => {}
            Err(e @ CacheError::Serialization(_)) => return Err(e),
            Err(e) => {
                // The value is good; a tier that refused it only costs a future miss.
                tracing::warn!(key = %key, error = %e, "failed to cache computed value");
            }
        }

        Ok(item.data)
    }

    /// Spawn a background refresh task. It is never joined or cancelled.
    fn spawn_refresh<V, F, Fut, E>(&self, key: String, recompute: F, ttl: Duration)
    where
        V: Serialize + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    {
        let cache = Arc::clone(&self.cache);

        tokio::spawn(async move {
            let data = match recompute().await {
                Ok(data) => data,
                Err(e) => {
                    let e = CacheError::recompute(e);
                    tracing::warn!(key = %key, error = %e, "background refresh failed");
                    return;
                }
            };

            let item = CacheItem::new(data);
            match cache.set_item(&key, &item, ttl).await {
                Ok(()) => tracing::debug!(key = %key, "background refresh stored"),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "failed to store refreshed value")
                }
            }
        });
    }
}
