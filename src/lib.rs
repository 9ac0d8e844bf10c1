//! tiered-swr - A multi-tier stale-while-revalidate (SWR) cache library for Rust
//!
//! This library provides:
//! - One logical cache over an ordered list of stores (e.g. in-process + Redis)
//! - Stale-while-revalidate reads with fire-and-forget background refresh
//! - Deterministic cache keys derived from argument lists and nested maps
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tiered_swr::{MokaStore, MokaStoreConfig, QueryOptions, SwrCache, TieredCache, query_key};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tiered_swr::CacheError> {
//!     let local = Arc::new(MokaStore::new(MokaStoreConfig::default()));
//!
//!     let cache = TieredCache::builder()
//!         .tier(local)
//!         .default_freshness(Duration::from_secs(2))
//!         .build();
//!     let swr = SwrCache::new(Arc::new(cache));
//!
//!     let key = query_key!["user", 123]?;
//!     let user: String = swr
//!         .query(&key, || async {
//!             // Load from database
//!             Ok::<_, std::io::Error>("User data for 123".to_string())
//!         }, QueryOptions::new(Duration::ZERO, Duration::from_secs(10)))
//!         .await?;
//!
//!     println!("{}", user);
//!     Ok(())
//! }
//! ```

mod builder;
mod error;
mod item;
pub mod keys;
mod store;
pub mod stores;
mod swr;
mod tiered;

// Re-export public API
pub use builder::{TieredCacheBuilder, TieredCacheConfig};
pub use error::{CacheError, RecomputeFailure};
pub use item::{CacheItem, ItemStatus};
pub use keys::{KeyCodec, QueryKey, canonical_serialize, sorted_stable_hash, stable_hash};
pub use store::Store;
pub use stores::memory::{EvictOnSetConfig, HashMapStore, HashMapStoreConfig};
pub use stores::metrics::{CacheMetric, MetricsSink, MetricsStore};
pub use stores::moka::{MokaStore, MokaStoreConfig};
pub use stores::redis::{RedisStore, RedisStoreConfig};
pub use swr::{QueryOptions, SwrCache};
pub use tiered::TieredCache;
