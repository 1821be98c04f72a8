//! The persisted set of sensors currently in alarm

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::ObjectId;

/// Errors raised by a critical set backend
#[derive(Debug, Error)]
pub enum CriticalStoreError {
    #[error("critical set backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("critical set is corrupt: {0}")]
    Corrupt(String),
}

/// Identities of the monitored variables classified Alarm as of the last cycle
///
/// Serialized as a plain JSON array of identities. Decoding is lenient:
/// entries that are not valid identities are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CriticalSet(BTreeSet<ObjectId>);

impl CriticalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.0.contains(&id)
    }

    /// Returns true if the identity was newly added
    pub fn insert(&mut self, id: ObjectId) -> bool {
        self.0.insert(id)
    }

    /// Returns true if the identity was present
    pub fn remove(&mut self, id: ObjectId) -> bool {
        self.0.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identities in ascending order
    pub fn iter(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.0.iter().copied()
    }

    /// Keep only the identities matching the predicate
    pub fn retain(&mut self, mut keep: impl FnMut(ObjectId) -> bool) {
        self.0.retain(|id| keep(*id));
    }
}

impl FromIterator<ObjectId> for CriticalSet {
    fn from_iter<I: IntoIterator<Item = ObjectId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for CriticalSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
        Ok(raw.iter().filter_map(ObjectId::from_json).collect())
    }
}

/// Backend holding the `CriticalVariables` attribute
///
/// The set is read once at the start of a status cycle and written once at
/// its end, always as a full replacement.
#[async_trait]
pub trait CriticalStore: Send + Sync {
    /// Read the persisted set; a missing attribute reads as empty
    async fn load(&self) -> Result<CriticalSet, CriticalStoreError>;

    /// Replace the persisted set
    async fn save(&self, set: &CriticalSet) -> Result<(), CriticalStoreError>;
}
