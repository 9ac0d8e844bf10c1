use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::CacheError;

const DATA_FIELD: &str = "data";
const TIMESTAMP_FIELD: &str = "timestamp";

/// A computed value together with the instant it was produced.
///
/// Items are never mutated; a refresh writes a new item under the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem<V> {
    /// The cached value.
    pub data: V,

    /// When `data` was computed. Age is always measured from here, not from the
    /// moment a tier stored the item.
    pub timestamp: DateTime<Utc>,
}

/// Where an item sits relative to its freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Younger than (or exactly at) the freshness window.
    Fresh,
    /// Older than the freshness window; the tier's TTL still keeps it around.
    Stale,
}

impl<V> CacheItem<V> {
    /// Wrap a value computed just now.
    pub fn new(data: V) -> Self {
        CacheItem {
            data,
            timestamp: Utc::now(),
        }
    }

    /// Wrap a value computed at `timestamp`.
    pub fn with_timestamp(data: V, timestamp: DateTime<Utc>) -> Self {
        CacheItem { data, timestamp }
    }

    /// Time elapsed since the value was computed. Items stamped in the future count as
    /// zero age.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }

    /// Classify the item against a freshness window.
    pub fn status(&self, freshness: Duration, now: DateTime<Utc>) -> ItemStatus {
        if self.age(now) <= freshness {
            ItemStatus::Fresh
        } else {
            ItemStatus::Stale
        }
    }
}

impl<V> CacheItem<V>
where
    V: Serialize,
{
    /// Encode the item as the `{data, timestamp}` envelope written to every tier.
    ///
    /// The timestamp is RFC 3339 in UTC with nanosecond precision.
    pub fn to_envelope(&self) -> Result<Value, CacheError> {
        let data = serde_json::to_value(&self.data)
            .map_err(|e| CacheError::Serialization(format!("Serialization failed: {}", e)))?;

        let mut envelope = Map::with_capacity(2);
        envelope.insert(DATA_FIELD.to_string(), data);
        envelope.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );
        Ok(Value::Object(envelope))
    }
}

impl<V> CacheItem<V>
where
    V: DeserializeOwned,
{
    /// Decode an envelope read back from a tier.
    ///
    /// A payload that is not an object, lacks either field, or carries an unparsable
    /// timestamp is [`CacheError::InvalidCacheFormat`]. Well-formed envelopes whose `data`
    /// does not fit `V` are [`CacheError::TypeMismatch`].
    pub fn from_envelope(payload: Value) -> Result<Self, CacheError> {
        let mut fields = match payload {
            Value::Object(fields) => fields,
            other => {
                return Err(CacheError::InvalidCacheFormat(format!(
                    "expected an object, got {}",
                    json_kind(&other)
                )));
            }
        };

        let data = fields.remove(DATA_FIELD).ok_or_else(|| {
            CacheError::InvalidCacheFormat(format!("missing '{}' field", DATA_FIELD))
        })?;

        let timestamp = match fields.remove(TIMESTAMP_FIELD) {
            Some(Value::String(raw)) => DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| {
                    CacheError::InvalidCacheFormat(format!("bad timestamp '{}': {}", raw, e))
                })?
                .with_timezone(&Utc),
            Some(other) => {
                return Err(CacheError::InvalidCacheFormat(format!(
                    "'{}' must be a string, got {}",
                    TIMESTAMP_FIELD,
                    json_kind(&other)
                )));
            }
            None => {
                return Err(CacheError::InvalidCacheFormat(format!(
                    "missing '{}' field",
                    TIMESTAMP_FIELD
                )));
            }
        };

        let data = serde_json::from_value(data).map_err(|e| CacheError::TypeMismatch {
            expected: std::any::type_name::<V>(),
            message: e.to_string(),
        })?;

        Ok(CacheItem { data, timestamp })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
