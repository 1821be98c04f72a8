//! Transitions against the persisted critical set

use std::collections::HashSet;
use wm_config::MonitoredSensor;
use wm_core::{CriticalSet, ObjectId};

use crate::status::VariableSnapshot;

/// Outcome of reconciling a snapshot with the previous critical set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Exactly the Alarm identities of the snapshot
    pub new_critical: CriticalSet,
    /// Identities that went into Alarm, in snapshot order
    pub entered: Vec<ObjectId>,
    /// Identities that left Alarm: classified OK in snapshot order, then
    /// identities missing from the snapshot in ascending order
    pub exited: Vec<ObjectId>,
}

impl Reconciliation {
    pub fn has_transitions(&self) -> bool {
        !self.entered.is_empty() || !self.exited.is_empty()
    }
}

/// Diffs snapshots against the critical set
pub struct CriticalSetTracker;

impl CriticalSetTracker {
    /// Compute the transitions of `snapshot` relative to `previous`
    ///
    /// An identity listed both as Alarm and OK (two sensors on one variable)
    /// counts as Alarm.
    pub fn reconcile(snapshot: &[VariableSnapshot], previous: &CriticalSet) -> Reconciliation {
        let new_critical: CriticalSet = snapshot
            .iter()
            .filter(|s| s.is_alarm())
            .map(|s| s.variable_id)
            .collect();

        let mut seen = HashSet::new();
        let mut entered = Vec::new();
        let mut exited = Vec::new();

        for entry in snapshot {
            let id = entry.variable_id;
            if !seen.insert(id) {
                continue;
            }
            let was_critical = previous.contains(id);
            let is_critical = new_critical.contains(id);
            if is_critical && !was_critical {
                entered.push(id);
            } else if was_critical && !is_critical {
                exited.push(id);
            }
        }

        exited.extend(previous.iter().filter(|id| !seen.contains(id)));

        Reconciliation {
            new_critical,
            entered,
            exited,
        }
    }

    /// Drop identities no trigger list entry refers to any more
    pub fn prune(previous: &CriticalSet, sensors: &[MonitoredSensor]) -> CriticalSet {
        let listed: HashSet<ObjectId> = sensors
            .iter()
            .filter_map(MonitoredSensor::primary_variable)
            .collect();
        let mut pruned = previous.clone();
        pruned.retain(|id| listed.contains(&id));
        pruned
    }
}
