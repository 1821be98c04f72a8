//! The warning detector module
//!
//! [`Warnmelder`] owns one configuration snapshot and runs the status cycle:
//!
//! ```text
//! Idle -> Evaluating -> Reconciling -> Dispatching -> Aggregating -> Idle
//! ```
//!
//! Every trigger (variable update, timer, manual request, host start) calls
//! [`Warnmelder::update_status`]. Cycles are serialized; a trigger arriving
//! while a cycle runs waits for it to finish.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};
use wm_condition::ConditionEvaluator;
use wm_config::{ModuleConfig, MonitoredSensor};
use wm_core::events::StatusPublishedData;
use wm_core::{Classification, CriticalSet, CriticalStore, ObjectId};
use wm_event_bus::EventBus;
use wm_notify::{ChannelSender, DispatchContext, NotificationDispatcher};
use wm_object_space::ObjectSpace;

use crate::aggregate::OverallStatusAggregator;
use crate::critical::CriticalSetTracker;
use crate::discovery::{discover, merge_trigger_list, DiscoveryQuery};
use crate::error::MonitorResult;
use crate::status::{StatusEvaluator, VariableSnapshot};
use crate::summary::{
    channel_list_rows, object_rows, trigger_list_rows, ChannelListRow, ObjectRow, TriggerListRow,
};

/// Format of the published `LastUpdate` value
pub const LAST_UPDATE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Values the module publishes after each cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedStatus {
    #[serde(rename = "Active")]
    pub active: bool,
    #[serde(rename = "Status")]
    pub status: bool,
    #[serde(rename = "TriggeringDetector")]
    pub triggering_detector: String,
    #[serde(rename = "LastUpdate")]
    pub last_update: String,
    #[serde(rename = "AlarmSensorList")]
    pub alarm_sensor_list: String,
}

/// Result of one completed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub overall: bool,
    pub entered: Vec<ObjectId>,
    pub exited: Vec<ObjectId>,
    pub notifications_sent: usize,
}

/// One instance of the warning detector
pub struct Warnmelder {
    objects: Arc<dyn ObjectSpace>,
    evaluator: StatusEvaluator,
    dispatcher: NotificationDispatcher,
    store: Arc<dyn CriticalStore>,
    event_bus: Option<Arc<EventBus>>,
    config: RwLock<Arc<ModuleConfig>>,
    active: AtomicBool,
    published: RwLock<PublishedStatus>,
    cycle: Mutex<()>,
}

impl Warnmelder {
    pub fn new(
        config: ModuleConfig,
        objects: Arc<dyn ObjectSpace>,
        conditions: Arc<dyn ConditionEvaluator>,
        store: Arc<dyn CriticalStore>,
        sender: Arc<dyn ChannelSender>,
    ) -> Self {
        Self {
            evaluator: StatusEvaluator::new(objects.clone(), conditions),
            dispatcher: NotificationDispatcher::new(objects.clone(), sender),
            objects,
            store,
            event_bus: None,
            config: RwLock::new(Arc::new(config)),
            active: AtomicBool::new(true),
            published: RwLock::new(PublishedStatus {
                active: true,
                ..Default::default()
            }),
            cycle: Mutex::new(()),
        }
    }

    /// Publish STATUS_PUBLISHED events on the bus after each cycle
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Current configuration snapshot
    pub async fn config(&self) -> Arc<ModuleConfig> {
        self.config.read().await.clone()
    }

    /// Last published values
    pub async fn published(&self) -> PublishedStatus {
        self.published.read().await.clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Switch notifications on or off
    pub async fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
        self.published.write().await.active = active;
        info!(active, "Active switch changed");
    }

    /// Replace the configuration and run a cycle
    #[instrument(skip(self, config))]
    pub async fn apply_config(&self, config: ModuleConfig) -> MonitorResult<bool> {
        config.validate()?;

        let hidden = config.display.hidden_values();
        if !hidden.is_empty() {
            debug!(?hidden, "Hidden status values");
        }
        info!(
            sensors = config.trigger_list.len(),
            automatic_update = ?config.timer.period(),
            "Applying configuration"
        );
        *self.config.write().await = Arc::new(config);

        self.update_status().await
    }

    /// Run one status cycle, returning the overall status
    ///
    /// Returns `Ok(false)` without publishing anything when no enabled sensor
    /// has an existing variable.
    pub async fn update_status(&self) -> MonitorResult<bool> {
        Ok(self
            .run_cycle()
            .await?
            .map(|outcome| outcome.overall)
            .unwrap_or(false))
    }

    /// Run one status cycle, `None` when there is nothing to monitor
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> MonitorResult<Option<CycleOutcome>> {
        let _cycle = self.cycle.lock().await;
        let config = self.config().await;

        // Evaluating
        let sensors = config.sensors();
        if !self.evaluator.has_monitored_sensors(&sensors) {
            debug!("No monitored variables, skipping cycle");
            // identities left behind by removed sensors leave silently
            self.prune_critical_variables(&sensors).await?;
            return Ok(None);
        }
        let snapshot = self.evaluator.evaluate(&sensors, &config.labels);

        // Reconciling
        let previous = self.store.load().await?;
        let reconciliation = CriticalSetTracker::reconcile(&snapshot, &previous);

        // Dispatching
        let ctx = DispatchContext::new(self.is_active());
        let mut notifications_sent = 0;
        for (ids, direction) in [
            (&reconciliation.entered, Classification::Alarm),
            (&reconciliation.exited, Classification::Ok),
        ] {
            for id in ids {
                let name = display_name(*id, &snapshot, &sensors, self.objects.as_ref());
                info!(variable_id = %id, name = %name, ?direction, "Sensor transition");
                let report =
                    self.dispatcher
                        .dispatch(direction, &name, config.channel_lists(direction), &ctx);
                notifications_sent += report.sent;
            }
        }

        self.store.save(&reconciliation.new_critical).await?;

        // Aggregating
        let aggregate = OverallStatusAggregator::new(&config.display).aggregate(&snapshot);
        let last_update = Local::now().format(LAST_UPDATE_FORMAT).to_string();
        {
            let mut published = self.published.write().await;
            published.status = aggregate.overall;
            published.triggering_detector = aggregate.last_triggering_name.clone();
            published.last_update = last_update.clone();
            published.alarm_sensor_list = aggregate.html_summary;
        }

        if let Some(bus) = &self.event_bus {
            bus.fire_typed(StatusPublishedData {
                status: aggregate.overall,
                triggering_detector: aggregate.last_triggering_name,
                last_update,
                entered: reconciliation.entered.clone(),
                exited: reconciliation.exited.clone(),
            });
        }

        debug!(
            overall = aggregate.overall,
            entered = reconciliation.entered.len(),
            exited = reconciliation.exited.len(),
            notifications_sent,
            "Status cycle complete"
        );

        Ok(Some(CycleOutcome {
            overall: aggregate.overall,
            entered: reconciliation.entered,
            exited: reconciliation.exited,
            notifications_sent,
        }))
    }

    /// Forget all stored critical variables
    ///
    /// The next cycle notifies every sensor in Alarm again.
    pub async fn reset_critical_variables(&self) -> MonitorResult<()> {
        let _cycle = self.cycle.lock().await;
        self.store.save(&CriticalSet::new()).await?;
        info!("Critical variables reset");
        Ok(())
    }

    /// Forget one stored critical variable, returning whether it was stored
    ///
    /// If the sensor is still in Alarm, the next cycle notifies it again.
    pub async fn remove_critical_variable(&self, id: ObjectId) -> MonitorResult<bool> {
        let _cycle = self.cycle.lock().await;
        let mut set = self.store.load().await?;
        if !set.remove(id) {
            debug!(variable_id = %id, "Variable is not critical");
            return Ok(false);
        }
        self.store.save(&set).await?;
        info!(variable_id = %id, "Critical variable removed");
        Ok(true)
    }

    /// Drop stored identities without a trigger list entry, returning how many were removed
    pub async fn clean_up_critical_variables(&self) -> MonitorResult<usize> {
        let _cycle = self.cycle.lock().await;
        let config = self.config().await;
        self.prune_critical_variables(&config.sensors()).await
    }

    /// Caller holds the cycle lock
    async fn prune_critical_variables(&self, sensors: &[MonitoredSensor]) -> MonitorResult<usize> {
        let previous = self.store.load().await?;
        let pruned = CriticalSetTracker::prune(&previous, sensors);
        let removed = previous.len() - pruned.len();
        if removed > 0 {
            self.store.save(&pruned).await?;
            info!(removed, "Removed stale critical variables");
        }
        Ok(removed)
    }

    /// Stored critical variables with their names
    pub async fn critical_variables(&self) -> MonitorResult<Vec<ObjectRow>> {
        let set = self.store.load().await?;
        Ok(object_rows(set.iter(), self.objects.as_ref()))
    }

    /// Primary variables whose updates start a cycle
    pub async fn subscriptions(&self) -> Vec<ObjectId> {
        let config = self.config().await;
        let ids: BTreeSet<ObjectId> = config
            .sensors()
            .iter()
            .filter(|s| s.enabled && !s.secondary_malformed)
            .filter_map(MonitoredSensor::primary_variable)
            .filter(|id| self.objects.object_exists(*id))
            .collect();
        ids.into_iter().collect()
    }

    /// Every existing variable the enabled sensors refer to
    pub async fn references(&self) -> Vec<ObjectId> {
        let config = self.config().await;
        let mut ids = BTreeSet::new();
        for sensor in config.sensors().iter().filter(|s| s.enabled) {
            ids.extend(sensor.primary_variable());
            ids.extend(sensor.secondary_variables().into_iter().flatten());
        }
        ids.into_iter()
            .filter(|id| self.objects.object_exists(*id))
            .collect()
    }

    /// Trigger list with validity and current status
    pub async fn trigger_list_summary(&self) -> Vec<TriggerListRow> {
        let config = self.config().await;
        trigger_list_rows(
            &config.sensors(),
            self.objects.as_ref(),
            &self.evaluator,
            &config.labels,
        )
    }

    /// Channel rows with validity
    pub async fn channel_summary(&self) -> Vec<ChannelListRow> {
        let config = self.config().await;
        channel_list_rows(&config, self.objects.as_ref())
    }

    /// Discover variables and add them to the trigger list, then run a cycle
    ///
    /// Returns the number of entries added.
    #[instrument(skip(self))]
    pub async fn determine_variables(&self, query: DiscoveryQuery) -> MonitorResult<usize> {
        let config = self.config().await;
        let found = discover(self.objects.as_ref(), &query);
        let merged = merge_trigger_list(self.objects.as_ref(), &config.trigger_list, found)?;
        let added = merged.len() - config.trigger_list.len();

        if added == 0 {
            debug!("All discovered variables are already listed");
            return Ok(0);
        }

        let mut updated = (*config).clone();
        updated.trigger_list = merged;
        self.apply_config(updated).await?;
        Ok(added)
    }
}

/// Name used in notifications for a transitioning identity
///
/// Exited identities can be missing from the snapshot; they fall back to the
/// trigger list designation, the object name and finally the identity.
fn display_name(
    id: ObjectId,
    snapshot: &[VariableSnapshot],
    sensors: &[MonitoredSensor],
    objects: &dyn ObjectSpace,
) -> String {
    snapshot
        .iter()
        .find(|s| s.variable_id == id)
        .map(|s| s.name.clone())
        .or_else(|| {
            sensors
                .iter()
                .find(|s| s.primary_variable() == Some(id))
                .map(|s| s.designation.clone())
        })
        .or_else(|| objects.name(id))
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wm_condition::ConditionExpression;
    use wm_config::TriggerEntry;
    use wm_object_space::{HostObject, MemoryObjectSpace, VariableValue};

    fn id(raw: i64) -> ObjectId {
        ObjectId::new(raw).unwrap()
    }

    fn sensor(name: &str, variable: i64) -> MonitoredSensor {
        let entry = TriggerEntry::new(
            name,
            "",
            &ConditionExpression::variable_equals(id(variable), serde_json::json!(true)),
        );
        MonitoredSensor::from_entry(0, &entry)
    }

    #[test]
    fn test_display_name_fallback() {
        let space = MemoryObjectSpace::new();
        space.insert(HostObject::variable(id(300), "STATE", VariableValue::Boolean(false)));
        let snapshot = vec![VariableSnapshot {
            variable_id: id(100),
            name: "Smoke A".to_string(),
            comment: String::new(),
            classification: Classification::Alarm,
            status_text: String::new(),
        }];
        let sensors = vec![sensor("Fenster Bad", 200)];

        assert_eq!(display_name(id(100), &snapshot, &sensors, &space), "Smoke A");
        assert_eq!(display_name(id(200), &snapshot, &sensors, &space), "Fenster Bad");
        assert_eq!(display_name(id(300), &snapshot, &sensors, &space), "STATE");
        assert_eq!(display_name(id(400), &snapshot, &sensors, &space), "400");
    }
}
