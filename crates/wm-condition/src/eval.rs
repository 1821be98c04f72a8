//! Condition evaluation
//!
//! Evaluates rule trees against the current values of the host object space.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, Timelike};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};
use wm_core::ObjectId;
use wm_object_space::{ObjectSpace, VariableValue};

use crate::expression::{
    Comparison, ConditionError, ConditionExpression, ConditionNode, ConditionResult, DateRule,
    NodeOperation, RuleValueType, TimeRule, VariableRule, WeekdayRule,
};

/// Decides whether a condition expression currently holds
///
/// Implementations never fail: an expression that cannot be evaluated is
/// reported as not passing.
pub trait ConditionEvaluator: Send + Sync {
    fn is_passing(&self, expression: &ConditionExpression) -> bool;
}

/// Context for condition evaluation
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    /// Override for current time (for testing)
    pub time_override: Option<DateTime<Local>>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set time override for testing
    pub fn with_time(mut self, time: DateTime<Local>) -> Self {
        self.time_override = Some(time);
        self
    }

    /// Get current time (or override if set)
    pub fn now(&self) -> DateTime<Local> {
        self.time_override.unwrap_or_else(Local::now)
    }
}

/// Evaluates the host's rule trees
///
/// Each root node is evaluated with its subtree; an expression passes when
/// every root passes. An empty expression, or a node without rules and
/// children, passes.
pub struct RuleTreeEvaluator {
    objects: Arc<dyn ObjectSpace>,
    context: EvalContext,
}

impl RuleTreeEvaluator {
    pub fn new(objects: Arc<dyn ObjectSpace>) -> Self {
        Self {
            objects,
            context: EvalContext::default(),
        }
    }

    pub fn with_context(mut self, context: EvalContext) -> Self {
        self.context = context;
        self
    }

    /// Evaluate an expression, surfacing why it could not be evaluated
    pub fn evaluate(&self, expression: &ConditionExpression) -> ConditionResult<bool> {
        if !expression.is_empty() && expression.roots().next().is_none() {
            return Err(ConditionError::NoRootNode);
        }
        let now = self.context.now();
        for root in expression.roots() {
            let mut visited = HashSet::new();
            if !self.eval_node(expression, root, &now, &mut visited)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn eval_node(
        &self,
        expression: &ConditionExpression,
        node: &ConditionNode,
        now: &DateTime<Local>,
        visited: &mut HashSet<i64>,
    ) -> ConditionResult<bool> {
        if !visited.insert(node.id) {
            return Ok(true);
        }

        let mut results = Vec::with_capacity(node.rules.len());
        for rule in &node.rules.variable {
            results.push(self.eval_variable_rule(rule)?);
        }
        for rule in &node.rules.date {
            results.push(eval_date_rule(rule, now)?);
        }
        for rule in &node.rules.time {
            results.push(eval_time_rule(rule, now)?);
        }
        for rule in &node.rules.day_of_the_week {
            results.push(eval_weekday_rule(rule, now));
        }
        for child in expression.children(node) {
            results.push(self.eval_node(expression, child, now, visited)?);
        }

        if results.is_empty() {
            return Ok(true);
        }

        let result = match node.operation {
            NodeOperation::And => results.iter().all(|r| *r),
            NodeOperation::Or => results.iter().any(|r| *r),
            NodeOperation::Nand => !results.iter().all(|r| *r),
            NodeOperation::Nor => !results.iter().any(|r| *r),
        };
        trace!(node = node.id, operation = ?node.operation, result, "Evaluated node");
        Ok(result)
    }

    fn eval_variable_rule(&self, rule: &VariableRule) -> ConditionResult<bool> {
        let id = rule.variable().ok_or(ConditionError::UnsetVariable)?;
        let actual = self.current_value(id)?;

        let expected = match rule.value_type {
            RuleValueType::Constant => rule.value.clone(),
            RuleValueType::Variable => {
                let other = ObjectId::from_json(&rule.value).ok_or(ConditionError::UnsetVariable)?;
                self.current_value(other)?.to_json()
            }
        };

        compare(&actual, &expected, rule.comparison)
    }

    fn current_value(&self, id: ObjectId) -> ConditionResult<VariableValue> {
        self.objects
            .variable(id)
            .map(|variable| variable.value)
            .ok_or(ConditionError::VariableNotFound(id))
    }
}

impl ConditionEvaluator for RuleTreeEvaluator {
    fn is_passing(&self, expression: &ConditionExpression) -> bool {
        match self.evaluate(expression) {
            Ok(result) => result,
            Err(e) => {
                debug!(error = %e, "Condition cannot be evaluated, treating as not passing");
                false
            }
        }
    }
}

/// Compare a variable value with an expected JSON value
///
/// Strings compare lexically; everything else numerically with booleans as 0 / 1.
fn compare(
    actual: &VariableValue,
    expected: &serde_json::Value,
    comparison: Comparison,
) -> ConditionResult<bool> {
    let incomparable = || ConditionError::Incomparable {
        actual: actual.to_string(),
        expected: expected.to_string(),
    };

    let ordering = match actual {
        VariableValue::String(s) => {
            let expected = match expected {
                serde_json::Value::String(e) => e.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            s.as_str().cmp(expected.as_str())
        }
        _ => {
            let a = actual.as_f64().ok_or_else(incomparable)?;
            let e = json_as_f64(expected).ok_or_else(incomparable)?;
            a.partial_cmp(&e).ok_or_else(incomparable)?
        }
    };

    Ok(comparison.matches(ordering))
}

fn json_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn eval_time_rule(rule: &TimeRule, now: &DateTime<Local>) -> ConditionResult<bool> {
    let value = rule.value;
    let expected = NaiveTime::from_hms_opt(value.hour, value.minute, value.second).ok_or_else(
        || ConditionError::InvalidValue(format!("{}:{}:{}", value.hour, value.minute, value.second)),
    )?;
    let current = NaiveTime::from_hms_opt(now.hour(), now.minute(), now.second())
        .unwrap_or(NaiveTime::MIN);
    Ok(rule.comparison.matches(current.cmp(&expected)))
}

fn eval_date_rule(rule: &DateRule, now: &DateTime<Local>) -> ConditionResult<bool> {
    let value = rule.value;
    let expected = NaiveDate::from_ymd_opt(value.year, value.month, value.day).ok_or_else(|| {
        ConditionError::InvalidValue(format!("{}.{}.{}", value.day, value.month, value.year))
    })?;
    Ok(rule.comparison.matches(now.date_naive().cmp(&expected)))
}

fn eval_weekday_rule(rule: &WeekdayRule, now: &DateTime<Local>) -> bool {
    let current = now.weekday().number_from_monday();
    rule.comparison.matches(current.cmp(&rule.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use wm_object_space::MemoryObjectSpace;

    fn setup() -> (Arc<MemoryObjectSpace>, RuleTreeEvaluator) {
        let space = Arc::new(MemoryObjectSpace::new());
        let evaluator = RuleTreeEvaluator::new(space.clone());
        (space, evaluator)
    }

    fn rule_expr(variable: ObjectId, comparison: i64, value: serde_json::Value) -> ConditionExpression {
        let raw = json!([{
            "id": 0, "parentID": 0, "operation": 0,
            "rules": {"variable": [{"id": 0, "variableID": variable.get(), "comparison": comparison, "value": value, "type": 0}]}
        }]);
        ConditionExpression::parse(&raw.to_string()).unwrap()
    }

    #[test]
    fn test_boolean_equal() {
        let (space, evaluator) = setup();
        let contact = space.create_variable("STATE", None, VariableValue::Boolean(false));
        let expr = rule_expr(contact, 0, json!(false));

        assert!(evaluator.is_passing(&expr));
        space.set_value(contact, VariableValue::Boolean(true)).unwrap();
        assert!(!evaluator.is_passing(&expr));
    }

    #[test]
    fn test_integer_against_boolean_constant() {
        let (space, evaluator) = setup();
        let state = space.create_variable("STATE", None, VariableValue::Integer(1));
        assert!(evaluator.is_passing(&rule_expr(state, 0, json!(true))));
        assert!(!evaluator.is_passing(&rule_expr(state, 1, json!(1))));
    }

    #[test]
    fn test_numeric_ordering() {
        let (space, evaluator) = setup();
        let duty = space.create_variable("DUTY_CYCLE", None, VariableValue::Float(42.5));
        assert!(evaluator.is_passing(&rule_expr(duty, 4, json!(80))));
        assert!(!evaluator.is_passing(&rule_expr(duty, 2, json!(80))));
        assert!(evaluator.is_passing(&rule_expr(duty, 3, json!(42.5))));
        assert!(evaluator.is_passing(&rule_expr(duty, 5, json!("42.5"))));
    }

    #[test]
    fn test_string_compare() {
        let (space, evaluator) = setup();
        let text = space.create_variable("Status", None, VariableValue::String("OK".into()));
        assert!(evaluator.is_passing(&rule_expr(text, 0, json!("OK"))));
        assert!(evaluator.is_passing(&rule_expr(text, 1, json!("Fehler"))));
    }

    #[test]
    fn test_missing_variable_does_not_pass() {
        let (_space, evaluator) = setup();
        let expr = rule_expr(ObjectId::new(99999).unwrap(), 0, json!(true));
        assert!(matches!(
            evaluator.evaluate(&expr),
            Err(ConditionError::VariableNotFound(_))
        ));
        assert!(!evaluator.is_passing(&expr));
    }

    #[test]
    fn test_variable_reference() {
        let (space, evaluator) = setup();
        let temp = space.create_variable("Temperatur", None, VariableValue::Float(24.0));
        let limit = space.create_variable("Grenzwert", None, VariableValue::Float(30.0));
        let raw = json!([{"rules": {"variable": [
            {"variableID": temp.get(), "comparison": 4, "value": limit.get(), "type": 1}
        ]}}]);
        let expr = ConditionExpression::parse(&raw.to_string()).unwrap();
        assert!(evaluator.is_passing(&expr));
        space.set_value(temp, VariableValue::Float(31.0)).unwrap();
        assert!(!evaluator.is_passing(&expr));
    }

    #[test]
    fn test_or_node_with_child() {
        let (space, evaluator) = setup();
        let a = space.create_variable("A", None, VariableValue::Boolean(false));
        let b = space.create_variable("B", None, VariableValue::Boolean(true));
        let raw = json!([
            {"id": 0, "parentID": 0, "operation": 1, "rules": {"variable": [
                {"variableID": a.get(), "comparison": 0, "value": true}
            ]}},
            {"id": 1, "parentID": 0, "operation": 0, "rules": {"variable": [
                {"variableID": b.get(), "comparison": 0, "value": true}
            ]}}
        ]);
        let expr = ConditionExpression::parse(&raw.to_string()).unwrap();
        assert!(evaluator.is_passing(&expr));

        space.set_value(b, VariableValue::Boolean(false)).unwrap();
        assert!(!evaluator.is_passing(&expr));
    }

    #[test]
    fn test_nor_node() {
        let (space, evaluator) = setup();
        let a = space.create_variable("A", None, VariableValue::Boolean(false));
        let raw = json!([{"operation": 3, "rules": {"variable": [
            {"variableID": a.get(), "comparison": 0, "value": true}
        ]}}]);
        let expr = ConditionExpression::parse(&raw.to_string()).unwrap();
        assert!(evaluator.is_passing(&expr));
    }

    #[test]
    fn test_cyclic_nodes_do_not_pass() {
        let (space, evaluator) = setup();
        let a = space.create_variable("A", None, VariableValue::Boolean(true));
        let mut nodes = rule_expr(a, 0, json!(true)).nodes().to_vec();
        let mut second = nodes[0].clone();
        nodes[0].id = 1;
        nodes[0].parent_id = 2;
        second.id = 2;
        second.parent_id = 1;
        nodes.push(second);

        let expr = ConditionExpression::from_nodes(nodes);
        assert!(matches!(evaluator.evaluate(&expr), Err(ConditionError::NoRootNode)));
        assert!(!evaluator.is_passing(&expr));
    }

    #[test]
    fn test_empty_passes() {
        let (_space, evaluator) = setup();
        assert!(evaluator.is_passing(&ConditionExpression::default()));
        let expr = ConditionExpression::parse(r#"[{"id":0,"parentID":0,"operation":0,"rules":{}}]"#).unwrap();
        assert!(evaluator.is_passing(&expr));
    }

    #[test]
    fn test_time_and_weekday_rules() {
        let space = Arc::new(MemoryObjectSpace::new());
        // Wednesday
        let now = Local.with_ymd_and_hms(2023, 2, 1, 14, 30, 0).unwrap();
        let evaluator =
            RuleTreeEvaluator::new(space).with_context(EvalContext::new().with_time(now));

        let raw = json!([{"rules": {
            "time": [{"comparison": 3, "value": {"hour": 8, "minute": 0, "second": 0}}],
            "dayOfTheWeek": [{"comparison": 0, "value": 3}],
            "date": [{"comparison": 0, "value": {"day": 1, "month": 2, "year": 2023}}]
        }}]);
        let expr = ConditionExpression::parse(&raw.to_string()).unwrap();
        assert!(evaluator.is_passing(&expr));

        let raw = json!([{"rules": {
            "time": [{"comparison": 4, "value": {"hour": 12, "minute": 0, "second": 0}}]
        }}]);
        let expr = ConditionExpression::parse(&raw.to_string()).unwrap();
        assert!(!evaluator.is_passing(&expr));
    }

    #[test]
    fn test_invalid_date_does_not_pass() {
        let (_space, evaluator) = setup();
        let raw = json!([{"rules": {
            "date": [{"comparison": 0, "value": {"day": 31, "month": 2, "year": 2023}}]
        }}]);
        let expr = ConditionExpression::parse(&raw.to_string()).unwrap();
        assert!(matches!(
            evaluator.evaluate(&expr),
            Err(ConditionError::InvalidValue(_))
        ));
    }
}
