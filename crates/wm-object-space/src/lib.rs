//! Host object space for the warning detector
//!
//! This crate models the part of the host's object tree the module reads:
//! object existence, names, locations, variable values and the metadata used
//! for variable discovery. [`ObjectSpace`] is the seam to a real host;
//! [`MemoryObjectSpace`] is an in-memory host that fires VARIABLE_UPDATED
//! events when a variable is written.

mod object;

pub use object::{HostObject, ObjectKind, Variable, VariableType, VariableValue};

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, trace};
use wm_core::events::VariableUpdatedData;
use wm_core::ObjectId;
use wm_event_bus::EventBus;

/// Separator between names in an object location
pub const LOCATION_SEPARATOR: &str = "\\";

/// Guard against parent cycles when walking up the tree
const MAX_DEPTH: usize = 64;

/// First identity handed out by [`MemoryObjectSpace`]
const FIRST_OBJECT_ID: i64 = 10000;

/// Errors raised when writing to the object space
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObjectSpaceError {
    #[error("object {0} does not exist")]
    NotFound(ObjectId),

    #[error("object {0} is not a variable")]
    NotAVariable(ObjectId),
}

/// Read access to the host object tree
pub trait ObjectSpace: Send + Sync {
    /// Get an object by identity
    fn object(&self, id: ObjectId) -> Option<HostObject>;

    /// Identities of all variables
    fn variable_ids(&self) -> Vec<ObjectId>;

    fn object_exists(&self, id: ObjectId) -> bool {
        self.object(id).is_some()
    }

    fn name(&self, id: ObjectId) -> Option<String> {
        self.object(id).map(|o| o.name)
    }

    fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.object(id).and_then(|o| o.parent)
    }

    fn variable(&self, id: ObjectId) -> Option<Variable> {
        self.object(id).and_then(|o| o.as_variable().cloned())
    }

    /// Path of names from the root down to the object, separated by `\`
    fn location(&self, id: ObjectId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(self.object(id)?);
        while let Some(object) = current {
            names.push(object.name.clone());
            if names.len() >= MAX_DEPTH {
                break;
            }
            current = object.parent.and_then(|parent| self.object(parent));
        }
        names.reverse();
        Some(names.join(LOCATION_SEPARATOR))
    }
}

/// In-memory host object space
pub struct MemoryObjectSpace {
    objects: DashMap<ObjectId, HostObject>,
    next_id: AtomicI64,
    event_bus: Option<Arc<EventBus>>,
}

impl MemoryObjectSpace {
    /// Create an empty object space without event delivery
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            next_id: AtomicI64::new(FIRST_OBJECT_ID),
            event_bus: None,
        }
    }

    /// Create an empty object space that fires VARIABLE_UPDATED on the bus
    pub fn with_event_bus(event_bus: Arc<EventBus>) -> Self {
        Self {
            event_bus: Some(event_bus),
            ..Self::new()
        }
    }

    /// Insert a prepared object, replacing any object with the same identity
    pub fn insert(&self, object: HostObject) {
        let raw = object.id.get();
        self.next_id.fetch_max(raw + 1, Ordering::SeqCst);
        trace!(id = %object.id, name = %object.name, "Inserting object");
        self.objects.insert(object.id, object);
    }

    /// Insert a list of objects (e.g. loaded from a seed file)
    pub fn extend(&self, objects: impl IntoIterator<Item = HostObject>) {
        for object in objects {
            self.insert(object);
        }
    }

    fn allocate_id(&self) -> ObjectId {
        loop {
            let raw = self.next_id.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = ObjectId::from_raw(raw) {
                if !self.objects.contains_key(&id) {
                    return id;
                }
            }
        }
    }

    pub fn create_category(&self, name: &str, parent: Option<ObjectId>) -> ObjectId {
        let id = self.allocate_id();
        let mut object = HostObject::category(id, name);
        object.parent = parent;
        self.insert(object);
        id
    }

    pub fn create_instance(&self, name: &str, parent: Option<ObjectId>) -> ObjectId {
        let id = self.allocate_id();
        let mut object = HostObject::instance(id, name);
        object.parent = parent;
        self.insert(object);
        id
    }

    pub fn create_variable(
        &self,
        name: &str,
        parent: Option<ObjectId>,
        value: VariableValue,
    ) -> ObjectId {
        let id = self.allocate_id();
        let mut object = HostObject::variable(id, name, value);
        object.parent = parent;
        self.insert(object);
        id
    }

    /// Apply a change to a stored object
    pub fn update(
        &self,
        id: ObjectId,
        change: impl FnOnce(&mut HostObject),
    ) -> Result<(), ObjectSpaceError> {
        let mut object = self
            .objects
            .get_mut(&id)
            .ok_or(ObjectSpaceError::NotFound(id))?;
        change(&mut object);
        Ok(())
    }

    /// Write a variable value
    ///
    /// Fires a VARIABLE_UPDATED event even when the value did not change, as
    /// the host reports every write.
    #[instrument(skip(self, value), fields(id = %id))]
    pub fn set_value(
        &self,
        id: ObjectId,
        value: VariableValue,
    ) -> Result<Variable, ObjectSpaceError> {
        let (old, new) = {
            let mut object = self
                .objects
                .get_mut(&id)
                .ok_or(ObjectSpaceError::NotFound(id))?;
            let ObjectKind::Variable(variable) = &mut object.kind else {
                return Err(ObjectSpaceError::NotAVariable(id));
            };
            let old = variable.clone();
            *variable = variable.with_value(value);
            (old, variable.clone())
        };

        let changed = old.value != new.value;
        debug!(value = %new.value, changed, "Variable written");

        if let Some(bus) = &self.event_bus {
            bus.fire_typed(VariableUpdatedData {
                variable_id: id,
                value: new.value.to_json(),
                changed,
                old_value: Some(old.value.to_json()),
            });
        }

        Ok(new)
    }

    /// Remove an object
    pub fn remove(&self, id: ObjectId) -> Option<HostObject> {
        let removed = self.objects.remove(&id).map(|(_, o)| o);
        if removed.is_some() {
            debug!(id = %id, "Removed object");
        }
        removed
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl Default for MemoryObjectSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectSpace for MemoryObjectSpace {
    fn object(&self, id: ObjectId) -> Option<HostObject> {
        self.objects.get(&id).map(|o| o.clone())
    }

    fn variable_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|o| o.as_variable().is_some())
            .map(|o| *o.key())
            .collect();
        ids.sort();
        ids
    }

    fn object_exists(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }
}

/// Thread-safe wrapper for an object space
pub type SharedObjectSpace = Arc<dyn ObjectSpace>;
