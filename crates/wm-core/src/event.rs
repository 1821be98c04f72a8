//! Event types for the host event bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use crate::events;

/// Trait for typed event data
///
/// Implement this trait for any data type that should be carried by events.
pub trait EventData: Clone + Send + Sync + 'static {
    /// The kind of event this data belongs to
    fn kind() -> EventKind;
}

/// Kind of a host event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    KernelStarted,
    VariableUpdated,
    TimerElapsed,
    ManualUpdate,
    ResetCriticalVariables,
    RemoveCriticalVariable,
    SetActive,
    StatusPublished,
}

impl EventKind {
    /// The wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::KernelStarted => events::KERNEL_STARTED,
            EventKind::VariableUpdated => events::VARIABLE_UPDATED,
            EventKind::TimerElapsed => events::TIMER_ELAPSED,
            EventKind::ManualUpdate => events::MANUAL_UPDATE,
            EventKind::ResetCriticalVariables => events::RESET_CRITICAL_VARIABLES,
            EventKind::RemoveCriticalVariable => events::REMOVE_CRITICAL_VARIABLE,
            EventKind::SetActive => events::SET_ACTIVE,
            EventKind::StatusPublished => events::STATUS_PUBLISHED,
        }
    }

    /// Whether events of this kind can start a status update cycle
    ///
    /// Forgetting a single critical variable and switching notifications
    /// take effect with the next cycle.
    pub fn starts_cycle(&self) -> bool {
        !matches!(
            self,
            EventKind::RemoveCriticalVariable | EventKind::SetActive | EventKind::StatusPublished
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event that can be fired on the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T = serde_json::Value> {
    /// Unique event id (ULID)
    pub id: String,

    /// The kind of event
    pub kind: EventKind,

    /// The event data
    pub data: T,

    /// Origin of the event
    pub origin: EventOrigin,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,
}

impl<T> Event<T> {
    /// Create a new event with current timestamp
    pub fn new(kind: EventKind, data: T) -> Self {
        Self {
            id: Ulid::new().to_string(),
            kind,
            data,
            origin: EventOrigin::Host,
            time_fired: Utc::now(),
        }
    }

    /// Create an event with a specific origin
    pub fn with_origin(mut self, origin: EventOrigin) -> Self {
        self.origin = origin;
        self
    }
}

impl<T: EventData> Event<T> {
    /// Create a typed event from EventData
    pub fn typed(data: T) -> Self {
        Self::new(T::kind(), data)
    }
}

/// Origin of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrigin {
    /// Raised by the host runtime (message sink, kernel)
    #[default]
    Host,
    /// Raised by an operator action
    Operator,
    /// Raised by the module itself (timer, published status)
    Module,
}
