//! Per-sensor status evaluation

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;
use wm_condition::ConditionEvaluator;
use wm_config::{MonitoredSensor, StatusLabels};
use wm_core::{Classification, ObjectId};
use wm_object_space::ObjectSpace;

/// Classified state of one monitored sensor in the current cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSnapshot {
    pub variable_id: ObjectId,
    /// The sensor's designation
    pub name: String,
    pub comment: String,
    pub classification: Classification,
    pub status_text: String,
}

impl VariableSnapshot {
    pub fn is_alarm(&self) -> bool {
        self.classification.is_alarm()
    }
}

/// Classifies the configured sensors
pub struct StatusEvaluator {
    objects: Arc<dyn ObjectSpace>,
    conditions: Arc<dyn ConditionEvaluator>,
}

impl StatusEvaluator {
    pub fn new(objects: Arc<dyn ObjectSpace>, conditions: Arc<dyn ConditionEvaluator>) -> Self {
        Self {
            objects,
            conditions,
        }
    }

    /// Variable monitored by `sensor`, if the sensor takes part in evaluation
    ///
    /// Disabled sensors and sensors with a malformed secondary condition are left out.
    fn monitored_variable(&self, sensor: &MonitoredSensor) -> Option<ObjectId> {
        if !sensor.enabled || sensor.secondary_malformed {
            return None;
        }
        sensor
            .primary_variable()
            .filter(|id| self.objects.object_exists(*id))
    }

    /// Whether at least one enabled sensor has an existing primary variable
    pub fn has_monitored_sensors(&self, sensors: &[MonitoredSensor]) -> bool {
        sensors.iter().any(|s| self.monitored_variable(s).is_some())
    }

    /// Classify one sensor, `None` if it does not take part in evaluation
    ///
    /// Alarm iff the primary condition passes and every secondary condition
    /// passes.
    pub fn classify(&self, sensor: &MonitoredSensor) -> Option<Classification> {
        self.monitored_variable(sensor)?;
        let primary = sensor.primary_condition.as_ref()?;

        let passing = self.conditions.is_passing(primary)
            && sensor
                .secondary_conditions
                .iter()
                .all(|condition| self.conditions.is_passing(condition));
        Some(Classification::from_passing(passing))
    }

    /// Classify every monitored sensor, sorted by name
    pub fn evaluate(
        &self,
        sensors: &[MonitoredSensor],
        labels: &StatusLabels,
    ) -> Vec<VariableSnapshot> {
        let mut snapshot: Vec<VariableSnapshot> = sensors
            .iter()
            .filter_map(|sensor| {
                let variable_id = self.monitored_variable(sensor)?;
                let classification = self.classify(sensor)?;
                trace!(sensor = sensor.id, %variable_id, ?classification, "Sensor evaluated");
                Some(VariableSnapshot {
                    variable_id,
                    name: sensor.designation.clone(),
                    comment: sensor.comment.clone(),
                    classification,
                    status_text: labels.sensor_text(classification).to_string(),
                })
            })
            .collect();

        snapshot.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wm_condition::ConditionExpression;
    use wm_config::TriggerEntry;
    use wm_object_space::{HostObject, MemoryObjectSpace, VariableValue};

    /// Passes exactly the expressions bound to the listed variables
    struct FixedEvaluator(Vec<ObjectId>);

    impl ConditionEvaluator for FixedEvaluator {
        fn is_passing(&self, expression: &ConditionExpression) -> bool {
            expression
                .primary_variable()
                .map(|id| self.0.contains(&id))
                .unwrap_or(false)
        }
    }

    fn id(raw: i64) -> ObjectId {
        ObjectId::new(raw).unwrap()
    }

    fn objects(ids: &[i64]) -> Arc<MemoryObjectSpace> {
        let space = MemoryObjectSpace::new();
        for raw in ids {
            space.insert(HostObject::variable(
                id(*raw),
                format!("Variable {}", raw),
                VariableValue::Boolean(true),
            ));
        }
        Arc::new(space)
    }

    fn sensor(position: usize, name: &str, primary: i64, secondary: &[i64]) -> MonitoredSensor {
        let mut entry = TriggerEntry::new(
            name,
            "",
            &ConditionExpression::variable_equals(id(primary), serde_json::json!(true)),
        );
        let nodes: Vec<_> = secondary
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let mut node = ConditionExpression::variable_equals(id(*raw), serde_json::json!(true))
                    .nodes()[0]
                    .clone();
                node.id = i as i64;
                node.parent_id = i as i64;
                node
            })
            .collect();
        entry.secondary_condition = ConditionExpression::from_nodes(nodes).to_json_string();
        MonitoredSensor::from_entry(position, &entry)
    }

    #[test]
    fn test_primary_and_secondary() {
        let space = objects(&[100, 200, 300]);
        let evaluator = StatusEvaluator::new(space, Arc::new(FixedEvaluator(vec![id(100), id(200)])));
        let labels = StatusLabels::default();

        // secondary [true, false] -> Ok
        let snapshot = evaluator.evaluate(&[sensor(0, "A", 100, &[200, 300])], &labels);
        assert_eq!(snapshot[0].classification, Classification::Ok);
        assert_eq!(snapshot[0].status_text, labels.sensor_ok);

        // secondary [] -> Alarm
        let snapshot = evaluator.evaluate(&[sensor(0, "A", 100, &[])], &labels);
        assert_eq!(snapshot[0].classification, Classification::Alarm);
        assert_eq!(snapshot[0].status_text, labels.sensor_alarm);
    }

    #[test]
    fn test_skips_disabled_and_missing() {
        let space = objects(&[100, 200]);
        let evaluator = StatusEvaluator::new(space, Arc::new(FixedEvaluator(vec![])));
        let mut disabled = sensor(0, "Disabled", 100, &[]);
        disabled.enabled = false;
        let sensors = vec![disabled, sensor(1, "Missing", 999, &[]), sensor(2, "Bad", 200, &[])];

        let snapshot = evaluator.evaluate(&sensors, &StatusLabels::default());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "Bad");
        assert!(evaluator.has_monitored_sensors(&sensors));
        assert!(!evaluator.has_monitored_sensors(&sensors[..2]));
    }

    #[test]
    fn test_malformed_secondary_is_excluded() {
        let space = objects(&[100, 200]);
        let evaluator = StatusEvaluator::new(space, Arc::new(FixedEvaluator(vec![id(100), id(200)])));
        let mut broken = sensor(0, "Smoke A", 100, &[]);
        broken.secondary_malformed = true;

        assert_eq!(evaluator.classify(&broken), None);
        assert!(!evaluator.has_monitored_sensors(std::slice::from_ref(&broken)));

        let snapshot = evaluator.evaluate(&[broken, sensor(1, "Smoke B", 200, &[])], &StatusLabels::default());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "Smoke B");
    }

    #[test]
    fn test_sorted_by_name_stable() {
        let space = objects(&[100, 200, 300]);
        let evaluator = StatusEvaluator::new(space, Arc::new(FixedEvaluator(vec![])));
        let sensors = vec![
            sensor(0, "Wohnzimmer", 100, &[]),
            sensor(1, "Bad", 200, &[]),
            sensor(2, "Wohnzimmer", 300, &[]),
        ];

        let snapshot = evaluator.evaluate(&sensors, &StatusLabels::default());
        let order: Vec<_> = snapshot.iter().map(|s| s.variable_id.get()).collect();
        assert_eq!(order, vec![200, 100, 300]);
    }
}
