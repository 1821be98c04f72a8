//! Core types for the warning detector
//!
//! This crate provides the fundamental types shared by every other crate of the
//! workspace: ObjectId, Classification, Event and the persisted CriticalSet.

mod classification;
mod critical;
mod event;
mod object_id;

pub use classification::Classification;
pub use critical::{CriticalSet, CriticalStore, CriticalStoreError};
pub use event::{Event, EventData, EventKind, EventOrigin};
pub use object_id::{ObjectId, ObjectIdError};

/// Module name as shown to operators
pub const MODULE_NAME: &str = "Warnmelder";

/// Prefix used for host-side function names and profiles
pub const MODULE_PREFIX: &str = "WM";

/// Module release
pub const MODULE_VERSION: &str = "1.0-4, 01.02.2023";

/// Standard events exchanged with the host runtime
pub mod events {
    use super::*;

    /// The host finished starting up
    pub const KERNEL_STARTED: &str = "kernel_started";

    /// A variable in the host object space received a new value
    pub const VARIABLE_UPDATED: &str = "variable_updated";

    /// The automatic status update timer elapsed
    pub const TIMER_ELAPSED: &str = "timer_elapsed";

    /// An operator requested a status update
    pub const MANUAL_UPDATE: &str = "manual_update";

    /// An operator asked to forget every critical variable
    pub const RESET_CRITICAL_VARIABLES: &str = "reset_critical_variables";

    /// An operator asked to forget one critical variable
    pub const REMOVE_CRITICAL_VARIABLE: &str = "remove_critical_variable";

    /// An operator switched notifications on or off
    pub const SET_ACTIVE: &str = "set_active";

    /// The module published new status values
    pub const STATUS_PUBLISHED: &str = "status_published";

    /// Data for KERNEL_STARTED events
    #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
    pub struct KernelStartedData {}

    impl EventData for KernelStartedData {
        fn kind() -> EventKind {
            EventKind::KernelStarted
        }
    }

    /// Data for VARIABLE_UPDATED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct VariableUpdatedData {
        pub variable_id: ObjectId,
        pub value: serde_json::Value,
        /// Whether the value differs from the previous one
        pub changed: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub old_value: Option<serde_json::Value>,
    }

    impl EventData for VariableUpdatedData {
        fn kind() -> EventKind {
            EventKind::VariableUpdated
        }
    }

    /// Data for TIMER_ELAPSED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct TimerElapsedData {
        pub timer: String,
    }

    impl EventData for TimerElapsedData {
        fn kind() -> EventKind {
            EventKind::TimerElapsed
        }
    }

    /// Data for MANUAL_UPDATE events
    #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
    pub struct ManualUpdateData {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub requested_by: Option<String>,
    }

    impl EventData for ManualUpdateData {
        fn kind() -> EventKind {
            EventKind::ManualUpdate
        }
    }

    /// Data for RESET_CRITICAL_VARIABLES events
    #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
    pub struct ResetCriticalVariablesData {}

    impl EventData for ResetCriticalVariablesData {
        fn kind() -> EventKind {
            EventKind::ResetCriticalVariables
        }
    }

    /// Data for REMOVE_CRITICAL_VARIABLE events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct RemoveCriticalVariableData {
        pub variable_id: ObjectId,
    }

    impl EventData for RemoveCriticalVariableData {
        fn kind() -> EventKind {
            EventKind::RemoveCriticalVariable
        }
    }

    /// Data for SET_ACTIVE events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct SetActiveData {
        pub active: bool,
    }

    impl EventData for SetActiveData {
        fn kind() -> EventKind {
            EventKind::SetActive
        }
    }

    /// Data for STATUS_PUBLISHED events
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    pub struct StatusPublishedData {
        pub status: bool,
        pub triggering_detector: String,
        pub last_update: String,
        pub entered: Vec<ObjectId>,
        pub exited: Vec<ObjectId>,
    }

    impl EventData for StatusPublishedData {
        fn kind() -> EventKind {
            EventKind::StatusPublished
        }
    }
}
