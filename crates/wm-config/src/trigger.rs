//! Trigger list: the configured monitored sensors

use serde::{Deserialize, Serialize};
use tracing::debug;
use wm_condition::ConditionExpression;
use wm_core::ObjectId;

use crate::de;

fn default_true() -> bool {
    true
}

/// One row of the `TriggerList` property, as the host stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEntry {
    #[serde(rename = "Use", default = "default_true")]
    pub enabled: bool,

    #[serde(rename = "Designation", default)]
    pub designation: String,

    #[serde(rename = "Comment", default)]
    pub comment: String,

    /// Serialized condition expression binding the sensor variable
    #[serde(rename = "PrimaryCondition", default, deserialize_with = "de::condition")]
    pub primary_condition: String,

    /// Serialized multi-condition gating the primary one
    #[serde(rename = "SecondaryCondition", default, deserialize_with = "de::condition")]
    pub secondary_condition: String,
}

impl TriggerEntry {
    /// An enabled entry with the given primary condition and no secondary conditions
    pub fn new(
        designation: impl Into<String>,
        comment: impl Into<String>,
        primary: &ConditionExpression,
    ) -> Self {
        Self {
            enabled: true,
            designation: designation.into(),
            comment: comment.into(),
            primary_condition: primary.to_json_string(),
            secondary_condition: "[]".to_string(),
        }
    }

    /// The variable bound by the primary condition, if it parses and is not a sentinel
    pub fn primary_variable(&self) -> Option<ObjectId> {
        ConditionExpression::parse(&self.primary_condition)
            .ok()
            .and_then(|expr| expr.primary_variable())
    }
}

/// A trigger list entry with its conditions decoded
///
/// Decoding never fails: an empty or malformed primary condition yields
/// `primary_condition: None`, a malformed secondary condition sets
/// `secondary_malformed`. Both leave the sensor unconfigured.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredSensor {
    /// Position in the trigger list
    pub id: usize,
    pub enabled: bool,
    pub designation: String,
    pub comment: String,
    pub primary_condition: Option<ConditionExpression>,
    pub secondary_conditions: Vec<ConditionExpression>,
    pub secondary_malformed: bool,
}

impl MonitoredSensor {
    pub fn from_entry(position: usize, entry: &TriggerEntry) -> Self {
        let primary_condition = match ConditionExpression::parse(&entry.primary_condition) {
            Ok(expr) if !expr.is_empty() => Some(expr),
            Ok(_) => None,
            Err(e) => {
                debug!(position, designation = %entry.designation, error = %e, "Malformed primary condition");
                None
            }
        };

        let (secondary_conditions, secondary_malformed) =
            match ConditionExpression::parse(&entry.secondary_condition) {
                Ok(expr) => (expr.split(), false),
                Err(e) => {
                    debug!(position, designation = %entry.designation, error = %e, "Malformed secondary condition");
                    (Vec::new(), true)
                }
            };

        Self {
            id: position,
            enabled: entry.enabled,
            designation: entry.designation.clone(),
            comment: entry.comment.clone(),
            primary_condition,
            secondary_conditions,
            secondary_malformed,
        }
    }

    /// Identity of the monitored variable
    pub fn primary_variable(&self) -> Option<ObjectId> {
        self.primary_condition
            .as_ref()
            .and_then(ConditionExpression::primary_variable)
    }

    /// Variable references of the secondary conditions; `None` marks a sentinel
    pub fn secondary_variables(&self) -> Vec<Option<ObjectId>> {
        self.secondary_conditions
            .iter()
            .flat_map(ConditionExpression::bound_variables)
            .collect()
    }

    /// Whether the primary variable and every secondary variable resolve
    pub fn is_configured(&self, exists: impl Fn(ObjectId) -> bool) -> bool {
        let Some(primary) = self.primary_variable() else {
            return false;
        };
        if !exists(primary) || self.secondary_malformed {
            return false;
        }
        self.secondary_variables()
            .into_iter()
            .all(|reference| reference.map(&exists).unwrap_or(false))
    }
}

/// Decode the whole trigger list
pub fn monitored_sensors(entries: &[TriggerEntry]) -> Vec<MonitoredSensor> {
    entries
        .iter()
        .enumerate()
        .map(|(position, entry)| MonitoredSensor::from_entry(position, entry))
        .collect()
}
