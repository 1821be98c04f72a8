//! Status monitor for the warning detector
//!
//! Evaluates the configured sensors, keeps the persisted set of sensors in
//! alarm, notifies on every Alarm/OK transition and publishes the overall
//! status with a sensor list.
//!
//! # Example
//!
//! ```ignore
//! let monitor = Warnmelder::new(config, objects, conditions, store, sender);
//! let alarm = monitor.update_status().await?;
//! println!("{}", monitor.published().await.triggering_detector);
//! ```

mod aggregate;
mod critical;
mod discovery;
mod error;
mod module;
mod status;
mod summary;

pub use aggregate::{AggregateStatus, OverallStatusAggregator};
pub use critical::{CriticalSetTracker, Reconciliation};
pub use discovery::{discover, merge_trigger_list, DiscoveryError, DiscoveryQuery};
pub use error::{MonitorError, MonitorResult};
pub use module::{CycleOutcome, PublishedStatus, Warnmelder, LAST_UPDATE_FORMAT};
pub use status::{StatusEvaluator, VariableSnapshot};
pub use summary::{
    channel_list_rows, object_rows, trigger_list_rows, ChannelListRow, ObjectRow, RowState,
    TriggerListRow, STATE_BROKEN, STATE_DISABLED,
};
