//! Objects of the host object tree

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use wm_core::ObjectId;

/// Host variable types, numbered as the host numbers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Boolean = 0,
    Integer = 1,
    Float = 2,
    String = 3,
}

/// Current value of a host variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl VariableValue {
    pub fn variable_type(&self) -> VariableType {
        match self {
            VariableValue::Boolean(_) => VariableType::Boolean,
            VariableValue::Integer(_) => VariableType::Integer,
            VariableValue::Float(_) => VariableType::Float,
            VariableValue::String(_) => VariableType::String,
        }
    }

    /// Numeric view of the value; booleans count as 0 / 1
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VariableValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            VariableValue::Integer(i) => Some(*i as f64),
            VariableValue::Float(f) => Some(*f),
            VariableValue::String(s) => s.trim().parse().ok(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            VariableValue::Boolean(b) => serde_json::Value::from(*b),
            VariableValue::Integer(i) => serde_json::Value::from(*i),
            VariableValue::Float(f) => serde_json::Value::from(*f),
            VariableValue::String(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Boolean(b) => write!(f, "{}", b),
            VariableValue::Integer(i) => write!(f, "{}", i),
            VariableValue::Float(v) => write!(f, "{}", v),
            VariableValue::String(s) => f.write_str(s),
        }
    }
}

/// A host variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub value: VariableValue,

    /// Profile assigned by the providing module (e.g. "~Window")
    #[serde(default)]
    pub profile: String,

    /// Profile assigned by the operator, overrides `profile` for display
    #[serde(default)]
    pub custom_profile: String,

    /// When the value last changed
    #[serde(default = "Utc::now")]
    pub last_changed: DateTime<Utc>,

    /// When the value was last written, changed or not
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl Variable {
    pub fn new(value: VariableValue) -> Self {
        let now = Utc::now();
        Self {
            value,
            profile: String::new(),
            custom_profile: String::new(),
            last_changed: now,
            last_updated: now,
        }
    }

    pub fn variable_type(&self) -> VariableType {
        self.value.variable_type()
    }

    /// Whether either profile equals the given name
    pub fn has_profile(&self, name: &str) -> bool {
        self.profile == name || self.custom_profile == name
    }

    /// Write a new value, keeping `last_changed` when the value is the same
    pub fn with_value(&self, value: VariableValue) -> Self {
        let now = Utc::now();
        let changed = self.value != value;
        Self {
            value,
            profile: self.profile.clone(),
            custom_profile: self.custom_profile.clone(),
            last_changed: if changed { now } else { self.last_changed },
            last_updated: now,
        }
    }
}

/// Kind-specific payload of a host object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectKind {
    Category,
    Instance {
        /// Module properties (e.g. the device "Address")
        #[serde(default)]
        properties: HashMap<String, serde_json::Value>,
    },
    Variable(Variable),
}

/// An object of the host object tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostObject {
    pub id: ObjectId,

    pub name: String,

    /// Parent object, `None` for children of the root category
    #[serde(default)]
    pub parent: Option<ObjectId>,

    /// Identifier set by the providing module (e.g. "STATE")
    #[serde(default)]
    pub ident: String,

    #[serde(flatten)]
    pub kind: ObjectKind,
}

impl HostObject {
    pub fn category(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            ident: String::new(),
            kind: ObjectKind::Category,
        }
    }

    pub fn instance(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            ident: String::new(),
            kind: ObjectKind::Instance {
                properties: HashMap::new(),
            },
        }
    }

    pub fn variable(id: ObjectId, name: impl Into<String>, value: VariableValue) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            ident: String::new(),
            kind: ObjectKind::Variable(Variable::new(value)),
        }
    }

    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_ident(mut self, ident: impl Into<String>) -> Self {
        self.ident = ident.into();
        self
    }

    /// Set the profile of a variable; no-op for other kinds
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        if let ObjectKind::Variable(variable) = &mut self.kind {
            variable.profile = profile.into();
        }
        self
    }

    /// Set a property of an instance; no-op for other kinds
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if let ObjectKind::Instance { properties } = &mut self.kind {
            properties.insert(key.into(), value);
        }
        self
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.kind, ObjectKind::Instance { .. })
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.kind {
            ObjectKind::Variable(variable) => Some(variable),
            _ => None,
        }
    }

    /// Property of an instance
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        match &self.kind {
            ObjectKind::Instance { properties } => properties.get(key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_untagged() {
        let v: VariableValue = serde_json::from_value(json!(1)).unwrap();
        assert_eq!(v, VariableValue::Integer(1));
        let v: VariableValue = serde_json::from_value(json!(21.5)).unwrap();
        assert_eq!(v, VariableValue::Float(21.5));
        let v: VariableValue = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(v.variable_type(), VariableType::Boolean);
    }

    #[test]
    fn test_with_value_keeps_last_changed() {
        let variable = Variable::new(VariableValue::Boolean(false));
        let same = variable.with_value(VariableValue::Boolean(false));
        assert_eq!(same.last_changed, variable.last_changed);
        let changed = variable.with_value(VariableValue::Boolean(true));
        assert!(changed.last_changed >= variable.last_changed);
        assert_eq!(changed.value, VariableValue::Boolean(true));
    }

    #[test]
    fn test_object_from_yaml() {
        let yaml = r#"
id: 23456
name: Rauchmelder
parent: 12345
ident: SMOKE_DETECTOR_ALARM_STATUS
type: variable
value: 0
profile: "~Alert"
"#;
        let object: HostObject = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(object.id.get(), 23456);
        assert_eq!(object.ident, "SMOKE_DETECTOR_ALARM_STATUS");
        let variable = object.as_variable().unwrap();
        assert_eq!(variable.value, VariableValue::Integer(0));
        assert!(variable.has_profile("~Alert"));
    }

    #[test]
    fn test_instance_properties() {
        let instance = HostObject::instance(ObjectId::new(12345).unwrap(), "Flur:1")
            .with_property("Address", json!("OEQ1234567:1"));
        assert!(instance.is_instance());
        assert_eq!(instance.property("Address"), Some(&json!("OEQ1234567:1")));
    }
}
