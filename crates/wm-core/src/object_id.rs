//! Object identity in the host object space

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raw identity of the root category
const ROOT_ID: i64 = 0;

/// Raw identity used by selection widgets for "nothing selected"
const NONE_SELECTED_ID: i64 = 1;

/// Error type for invalid object identities
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObjectIdError {
    #[error("object id {0} is reserved (0 = root category, 1 = none selected)")]
    Reserved(i64),

    #[error("object id cannot be negative: {0}")]
    Negative(i64),

    #[error("object id is not a number: {0}")]
    NotANumber(String),
}

/// Identity of an object (category, instance, variable) in the host
///
/// The two reserved raw values 0 and 1 never form an `ObjectId`; places
/// where the host stores them decode to `None` via [`ObjectId::from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ObjectId(i64);

impl ObjectId {
    /// Create an ObjectId, rejecting the reserved sentinels
    pub fn new(raw: i64) -> Result<Self, ObjectIdError> {
        if raw < 0 {
            return Err(ObjectIdError::Negative(raw));
        }
        if raw == ROOT_ID || raw == NONE_SELECTED_ID {
            return Err(ObjectIdError::Reserved(raw));
        }
        Ok(Self(raw))
    }

    /// Decode a raw identity as stored by the host, mapping sentinels to `None`
    pub fn from_raw(raw: i64) -> Option<Self> {
        Self::new(raw).ok()
    }

    /// Decode a loosely typed JSON value (number or numeric string)
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().and_then(Self::from_raw),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok().and_then(Self::from_raw),
            _ => None,
        }
    }

    /// The raw integer value
    pub fn get(self) -> i64 {
        self.0
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| ObjectIdError::NotANumber(s.to_string()))?;
        Self::new(raw)
    }
}

impl TryFrom<i64> for ObjectId {
    type Error = ObjectIdError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<ObjectId> for i64 {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sentinels_rejected() {
        assert_eq!(ObjectId::new(0), Err(ObjectIdError::Reserved(0)));
        assert_eq!(ObjectId::new(1), Err(ObjectIdError::Reserved(1)));
        assert_eq!(ObjectId::new(-5), Err(ObjectIdError::Negative(-5)));
        assert!(ObjectId::from_raw(1).is_none());
        assert_eq!(ObjectId::from_raw(12345).map(ObjectId::get), Some(12345));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(ObjectId::from_json(&json!(23456)), ObjectId::from_raw(23456));
        assert_eq!(ObjectId::from_json(&json!("23456")), ObjectId::from_raw(23456));
        assert_eq!(ObjectId::from_json(&json!(0)), None);
        assert_eq!(ObjectId::from_json(&json!(null)), None);
        assert_eq!(ObjectId::from_json(&json!(true)), None);
    }

    #[test]
    fn test_serde_as_integer() {
        let id = ObjectId::new(40001).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "40001");
        let back: ObjectId = serde_json::from_str("40001").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ObjectId>("1").is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("  4711 ".parse::<ObjectId>().unwrap().get(), 4711);
        assert!(matches!(
            "abc".parse::<ObjectId>(),
            Err(ObjectIdError::NotANumber(_))
        ));
    }
}
