//! Lenient field decoding for host-style properties
//!
//! The host keeps list properties as JSON strings (`"[]"`), condition
//! properties as JSON strings, and object references as integers where 0 and
//! 1 mean "nothing selected". YAML files may write the same values natively.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serializer};
use wm_core::ObjectId;

/// A list written either natively or as a JSON string
pub(crate) fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::String(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        serde_json::Value::String(raw) => serde_json::from_str(&raw).map_err(D::Error::custom),
        other => serde_json::from_value(other).map_err(D::Error::custom),
    }
}

/// A serialized condition, written either as a JSON string or natively
pub(crate) fn condition<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(raw) => raw,
        other => other.to_string(),
    })
}

/// An object reference; sentinels and garbage decode to `None`
pub(crate) fn object_ref<'de, D>(deserializer: D) -> Result<Option<ObjectId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(ObjectId::from_json(&value))
}

/// Write an object reference the way the host does, 0 for none
pub(crate) fn serialize_object_ref<S>(id: &Option<ObjectId>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_i64(id.map(ObjectId::get).unwrap_or(0))
}
