//! Deterministic cache-key derivation.
//!
//! Query keys are canonicalized as JSON arrays. String quoting and array delimiters keep
//! argument boundaries in the encoding, so `["ab", "c"]` and `["a", "bc"]` never collide.
//! Maps keep insertion order in the plain encoding; use [`sorted_stable_hash`] (or
//! [`KeyCodec::SortedHashed`]) when maps are built dynamically.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::CacheError;

/// An ordered list of arguments identifying one cached computation.
///
/// Each argument is encoded to JSON as it is added, so unencodable values are reported
/// when the key is built rather than on first lookup.
///
/// ```ignore
/// let key = query_key!["user", user_id, &filters]?;
/// let same = QueryKey::new().with("user")?.with(&user_id)?.with(&filters)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryKey {
    parts: Vec<Value>,
}

impl QueryKey {
    /// An empty key. It canonicalizes to `[]`.
    pub fn new() -> Self {
        QueryKey { parts: Vec::new() }
    }

    /// Build a key from parts encoded with [`encode_part`].
    pub fn from_encoded<I>(parts: I) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = Result<Value, CacheError>>,
    {
        let parts = parts.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(QueryKey { parts })
    }

    /// Append an argument.
    pub fn with<T>(mut self, part: &T) -> Result<Self, CacheError>
    where
        T: Serialize + ?Sized,
    {
        self.push(part)?;
        Ok(self)
    }

    /// Append an argument in place.
    pub fn push<T>(&mut self, part: &T) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        self.parts.push(encode_part(part)?);
        Ok(())
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl From<&str> for QueryKey {
    fn from(key: &str) -> Self {
        QueryKey {
            parts: vec![Value::String(key.to_string())],
        }
    }
}

impl From<String> for QueryKey {
    fn from(key: String) -> Self {
        QueryKey {
            parts: vec![Value::String(key)],
        }
    }
}

/// Build a [`QueryKey`] from a list of serializable arguments.
///
/// Evaluates to `Result<QueryKey, CacheError>`.
#[macro_export]
macro_rules! query_key {
    () => {
        ::core::result::Result::<$crate::QueryKey, $crate::CacheError>::Ok($crate::QueryKey::new())
    };
    ($($part:expr),+ $(,)?) => {
        $crate::QueryKey::from_encoded([$($crate::keys::encode_part(&$part)),+])
    };
}

/// Encode one key argument to a JSON value.
pub fn encode_part<T>(part: &T) -> Result<Value, CacheError>
where
    T: Serialize + ?Sized,
{
    serde_json::to_value(part)
        .map_err(|e| CacheError::Serialization(format!("unencodable key part: {}", e)))
}

/// Serialize `values` to their canonical JSON string.
///
/// Struct fields keep declaration order, sequences keep element order and maps keep
/// whatever order their `Serialize` impl yields.
pub fn canonical_serialize<T>(values: &T) -> Result<String, CacheError>
where
    T: Serialize + ?Sized,
{
    serde_json::to_string(values)
        .map_err(|e| CacheError::Serialization(format!("Serialization failed: {}", e)))
}

/// SHA-256 of the canonical serialization, hex encoded.
pub fn stable_hash<T>(values: &T) -> Result<String, CacheError>
where
    T: Serialize + ?Sized,
{
    let canonical = canonical_serialize(values)?;
    Ok(digest_hex(canonical.as_bytes()))
}

/// Like [`stable_hash`], but every map (at any depth) is rewritten in key order first,
/// so maps built in different insertion orders hash identically.
pub fn sorted_stable_hash<T>(value: &T) -> Result<String, CacheError>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(value)
        .map_err(|e| CacheError::Serialization(format!("Serialization failed: {}", e)))?;
    stable_hash(&sort_keys(value))
}

/// Recursively reorder every object's entries by key. Scalars pass through unchanged.
pub fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut entries: Vec<(String, Value)> = fields.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, field) in entries {
                sorted.insert(key, sort_keys(field));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        scalar => scalar,
    }
}

fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// How a [`QueryKey`] becomes the string handed to each tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCodec {
    /// The canonical JSON itself. Readable, but unbounded in length.
    Json,
    /// [`stable_hash`]: fixed 64-character hex digest, map-order sensitive.
    Hashed,
    /// [`sorted_stable_hash`]: fixed-width and independent of map construction order.
    #[default]
    SortedHashed,
}

impl KeyCodec {
    /// Derive the canonical key.
    pub fn derive(&self, key: &QueryKey) -> Result<String, CacheError> {
        match self {
            KeyCodec::Json => canonical_serialize(key),
            KeyCodec::Hashed => stable_hash(key),
            KeyCodec::SortedHashed => sorted_stable_hash(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    fn map_in_order(entries: &[(&str, Value)]) -> Map<String, Value> {
        let mut map = Map::new();
        for (k, v) in entries {
            map.insert(k.to_string(), v.clone());
        }
        map
    }

    #[test]
    fn test_canonical_serialize_keeps_argument_order() {
        let key = query_key!["string", 123, "another", vec!["one", "two", "three"]].unwrap();
        assert_eq!(
            canonical_serialize(&key).unwrap(),
            r#"["string",123,"another",["one","two","three"]]"#
        );
    }

    #[test]
    fn test_struct_fields_keep_declared_order() {
        #[derive(Serialize)]
        struct Filter {
            zone: &'static str,
            id: u32,
        }

        let encoded = canonical_serialize(&Filter { zone: "eu", id: 1 }).unwrap();
        assert_eq!(encoded, r#"{"zone":"eu","id":1}"#);
    }

    #[test]
    fn test_argument_boundaries_never_collide() {
        let left = query_key!["ab", "c"].unwrap();
        let right = query_key!["a", "bc"].unwrap();
        assert_ne!(stable_hash(&left).unwrap(), stable_hash(&right).unwrap());
    }

    #[test]
    fn test_empty_key_hashes_empty_sequence() {
        let empty = query_key![].unwrap();
        assert!(empty.is_empty());
        assert_eq!(canonical_serialize(&empty).unwrap(), "[]");
        assert_eq!(stable_hash(&empty).unwrap(), digest_hex(b"[]"));
    }

    #[test]
    fn test_hash_is_fixed_width_hex() {
        let hash = stable_hash(&QueryKey::from("user:123")).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_insertion_order_changes_unsorted_encoding() {
        let ab = map_in_order(&[("a", json!(1)), ("b", json!(2))]);
        let ba = map_in_order(&[("b", json!(2)), ("a", json!(1))]);

        assert_ne!(
            canonical_serialize(&ab).unwrap(),
            canonical_serialize(&ba).unwrap()
        );
        assert_ne!(stable_hash(&ab).unwrap(), stable_hash(&ba).unwrap());
    }

    #[test]
    fn test_sorted_hash_ignores_insertion_order_at_any_depth() {
        let inner_xy = map_in_order(&[("x", json!(true)), ("y", json!(null))]);
        let inner_yx = map_in_order(&[("y", json!(null)), ("x", json!(true))]);

        let first = map_in_order(&[
            ("b", Value::Array(vec![Value::Object(inner_xy)])),
            ("a", json!("leaf")),
        ]);
        let second = map_in_order(&[
            ("a", json!("leaf")),
            ("b", Value::Array(vec![Value::Object(inner_yx)])),
        ]);

        let k1 = query_key!["report", first].unwrap();
        let k2 = query_key!["report", second].unwrap();

        assert_ne!(stable_hash(&k1).unwrap(), stable_hash(&k2).unwrap());
        assert_eq!(
            sorted_stable_hash(&k1).unwrap(),
            sorted_stable_hash(&k2).unwrap()
        );
    }

    #[test]
    fn test_sorted_hash_matches_btreemap_encoding() {
        let mut hashed: HashMap<String, u32> = HashMap::new();
        let mut ordered: BTreeMap<String, u32> = BTreeMap::new();
        for (i, name) in ["delta", "alpha", "charlie", "bravo"].iter().enumerate() {
            hashed.insert(name.to_string(), i as u32);
            ordered.insert(name.to_string(), i as u32);
        }

        assert_eq!(
            sorted_stable_hash(&hashed).unwrap(),
            stable_hash(&ordered).unwrap()
        );
    }

    #[test]
    fn test_sort_keys_leaves_scalars_and_array_order() {
        assert_eq!(sort_keys(json!(42)), json!(42));
        let sorted = sort_keys(json!([{"b": 1, "a": 2}, 3]));
        assert_eq!(serde_json::to_string(&sorted).unwrap(), r#"[{"a":2,"b":1},3]"#);
    }

    #[test]
    fn test_unencodable_key_part() {
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        bad.insert((1, 2), 3);

        let result = QueryKey::new().with(&bad);
        assert!(matches!(result, Err(CacheError::Serialization(_))));
        assert!(matches!(
            canonical_serialize(&bad),
            Err(CacheError::Serialization(_))
        ));
    }

    #[test]
    fn test_codecs_derive_expected_forms() {
        let key = QueryKey::from("user:1");
        assert_eq!(KeyCodec::Json.derive(&key).unwrap(), r#"["user:1"]"#);
        assert_eq!(
            KeyCodec::Hashed.derive(&key).unwrap(),
            digest_hex(br#"["user:1"]"#)
        );
        assert_eq!(
            KeyCodec::SortedHashed.derive(&key).unwrap(),
            KeyCodec::Hashed.derive(&key).unwrap()
        );
    }
}
