//! Store implementations usable as cache tiers.

pub mod memory;
pub mod metrics;
pub mod moka;
pub mod redis;

pub use self::memory::{EvictOnSetConfig, HashMapStore, HashMapStoreConfig};
pub use self::metrics::{CacheMetric, MetricsSink, MetricsStore};
pub use self::moka::{MokaStore, MokaStoreConfig};
pub use self::redis::{RedisStore, RedisStoreConfig};
