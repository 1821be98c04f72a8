//! Variable discovery
//!
//! Scans the host's variables by profile or ident and turns every match into
//! a trigger list entry whose primary condition is `variable == true` (`== 1`
//! for integer variables).

use serde_json::json;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};
use wm_condition::ConditionExpression;
use wm_config::TriggerEntry;
use wm_core::ObjectId;
use wm_object_space::{ObjectSpace, VariableType};

/// Errors raised by variable discovery
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("no profile selected")]
    NoProfileSelected,

    #[error("no profile name given")]
    NoProfileName,

    #[error("no ident given")]
    NoIdent,

    #[error("unknown determination type: {0}")]
    UnknownDeterminationType(u8),

    #[error("no variables found")]
    NoVariablesFound,
}

/// What to look for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryQuery {
    /// Variables whose profile or custom profile is one of the names
    Profiles(Vec<String>),
    /// Variables whose ident is one of the names
    Idents(Vec<String>),
}

impl DiscoveryQuery {
    /// Build a query from the host's determination type numbering
    ///
    /// | type | query |
    /// |------|-------|
    /// | 0 | profiles from `profile_selection` |
    /// | 1-6 | `~Window`, `~Window.Reversed`, `~Window.HM`, `~Motion`, `~Motion.Reversed`, `~Motion.HM` |
    /// | 7 | profiles from `value` |
    /// | 8-12 | `STATE`, `ALARMSTATE`, `SMOKE_DETECTOR_ALARM_STATUS`, `ERROR_SABOTAGE,SABOTAGE`, `DUTYCYCLE,DUTY_CYCLE` |
    /// | 13 | idents from `value` |
    pub fn from_determination(
        determination_type: u8,
        value: &str,
        profile_selection: &str,
    ) -> Result<Self, DiscoveryError> {
        let query = match determination_type {
            0 => {
                let names = split_names(profile_selection);
                if names.is_empty() {
                    return Err(DiscoveryError::NoProfileSelected);
                }
                DiscoveryQuery::Profiles(names)
            }
            1 => DiscoveryQuery::Profiles(split_names("~Window")),
            2 => DiscoveryQuery::Profiles(split_names("~Window.Reversed")),
            3 => DiscoveryQuery::Profiles(split_names("~Window.HM")),
            4 => DiscoveryQuery::Profiles(split_names("~Motion")),
            5 => DiscoveryQuery::Profiles(split_names("~Motion.Reversed")),
            6 => DiscoveryQuery::Profiles(split_names("~Motion.HM")),
            7 => {
                let names = split_names(value);
                if names.is_empty() {
                    return Err(DiscoveryError::NoProfileName);
                }
                DiscoveryQuery::Profiles(names)
            }
            8 => DiscoveryQuery::Idents(split_names("STATE")),
            9 => DiscoveryQuery::Idents(split_names("ALARMSTATE")),
            10 => DiscoveryQuery::Idents(split_names("SMOKE_DETECTOR_ALARM_STATUS")),
            11 => DiscoveryQuery::Idents(split_names("ERROR_SABOTAGE, SABOTAGE")),
            12 => DiscoveryQuery::Idents(split_names("DUTYCYCLE, DUTY_CYCLE")),
            13 => {
                let names = split_names(value);
                if names.is_empty() {
                    return Err(DiscoveryError::NoIdent);
                }
                DiscoveryQuery::Idents(names)
            }
            other => return Err(DiscoveryError::UnknownDeterminationType(other)),
        };
        Ok(query)
    }
}

/// Comma separated names, whitespace removed, empty names dropped
fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|name| name.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Find matching variables and build a trigger entry for each
pub fn discover(objects: &dyn ObjectSpace, query: &DiscoveryQuery) -> Vec<TriggerEntry> {
    let mut ids = objects.variable_ids();
    ids.sort();

    let mut found = Vec::new();
    for id in ids {
        let Some(object) = objects.object(id) else {
            continue;
        };
        let Some(variable) = object.as_variable() else {
            continue;
        };

        let matched = match query {
            DiscoveryQuery::Profiles(names) => names.iter().any(|n| variable.has_profile(n)),
            DiscoveryQuery::Idents(names) => names.iter().any(|n| object.ident == *n),
        };
        if !matched {
            continue;
        }

        let (designation, comment) = describe(objects, id, &object.name, object.parent);
        let value = match variable.variable_type() {
            VariableType::Integer => json!(1),
            _ => json!(true),
        };
        debug!(%id, designation = %designation, "Variable matched");
        found.push(TriggerEntry::new(
            designation,
            comment,
            &ConditionExpression::variable_equals(id, value),
        ));
    }
    found
}

/// Designation and comment of a discovered variable
///
/// Variables below a device instance are named after the instance (up to the
/// first `:`) and commented with its `Address` property.
fn describe(
    objects: &dyn ObjectSpace,
    id: ObjectId,
    name: &str,
    parent: Option<ObjectId>,
) -> (String, String) {
    let Some(instance) = parent
        .and_then(|p| objects.object(p))
        .filter(|p| p.is_instance())
    else {
        return (name.to_string(), String::new());
    };

    let designation = match instance.name.split_once(':') {
        Some((head, _)) if !head.is_empty() => head.to_string(),
        _ => instance.name.clone(),
    };
    let comment = instance
        .property("Address")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    debug!(%id, instance = %instance.id, "Using instance name");
    (designation, comment)
}

/// Append discovered entries to the trigger list
///
/// Entries whose variable is already listed, or no longer exists, are left
/// out. The result is sorted by designation.
pub fn merge_trigger_list(
    objects: &dyn ObjectSpace,
    listed: &[TriggerEntry],
    found: Vec<TriggerEntry>,
) -> Result<Vec<TriggerEntry>, DiscoveryError> {
    if found.is_empty() {
        return Err(DiscoveryError::NoVariablesFound);
    }

    let mut known: HashSet<ObjectId> = listed
        .iter()
        .filter_map(TriggerEntry::primary_variable)
        .collect();
    let mut merged = listed.to_vec();
    let mut added = 0;

    for entry in found {
        let Some(id) = entry.primary_variable() else {
            continue;
        };
        if objects.object_exists(id) && known.insert(id) {
            merged.push(entry);
            added += 1;
        }
    }

    merged.sort_by(|a, b| a.designation.cmp(&b.designation));
    info!(added, total = merged.len(), "Merged discovered variables");
    Ok(merged)
}
