use std::sync::Arc;

/// Boxed error returned by a caller-supplied recompute function.
pub type RecomputeFailure = Arc<dyn std::error::Error + Send + Sync>;

/// Error type for cache operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// A query key or cache value could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No tier holds a live entry for the key.
    #[error("key '{key}' not found in any tier")]
    NotFound { key: String },

    /// A tier held the key but its TTL has passed.
    #[error("[{tier}] key '{key}' expired")]
    Expired { tier: String, key: String },

    /// A tier returned a payload that is not a `{data, timestamp}` envelope.
    #[error("invalid cache item format: {0}")]
    InvalidCacheFormat(String),

    /// The cached data does not decode into the type the caller asked for.
    #[error("cached data is not a valid {expected}: {message}")]
    TypeMismatch {
        expected: &'static str,
        message: String,
    },

    /// A backend operation failed.
    #[error("[{tier}] cache error for key '{key}': {message}")]
    Store {
        tier: String,
        key: String,
        message: String,
    },

    /// The recompute function failed.
    #[error("recompute failed: {0}")]
    Recompute(RecomputeFailure),

    /// The caller aborted the query before it completed.
    #[error("query cancelled")]
    Cancelled,
}

impl CacheError {
    /// Create a new store error.
    pub fn store(
        tier: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CacheError::Store {
            tier: tier.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wrap a recompute function's error.
    pub fn recompute<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        CacheError::Recompute(Arc::from(err.into()))
    }

    /// True for the errors a tier reports when it simply does not have the key.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::NotFound { .. } | CacheError::Expired { .. })
    }
}
