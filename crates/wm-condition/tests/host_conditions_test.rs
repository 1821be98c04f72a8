//! Conditions as the host stores them in a trigger list

use std::sync::Arc;
use wm_condition::{ConditionEvaluator, ConditionExpression, RuleTreeEvaluator};
use wm_core::ObjectId;
use wm_object_space::{HostObject, MemoryObjectSpace, VariableValue};

fn id(raw: i64) -> ObjectId {
    ObjectId::new(raw).unwrap()
}

#[test]
fn test_primary_and_secondary_conditions() {
    let space = Arc::new(MemoryObjectSpace::new());
    space.insert(HostObject::variable(id(12345), "STATE", VariableValue::Boolean(false)));
    space.insert(HostObject::variable(id(23456), "Anwesenheit", VariableValue::Boolean(true)));

    // primary: window closed; secondary: only while someone is home
    let primary = ConditionExpression::parse(
        r#"[{"id":0,"parentID":0,"operation":0,"rules":{"variable":[{"id":0,"variableID":12345,"comparison":0,"value":false,"type":0}],"date":[],"time":[],"dayOfTheWeek":[]}}]"#,
    )
    .unwrap();
    let secondary = ConditionExpression::parse(
        r#"[{"id":0,"parentID":0,"operation":0,"rules":{"variable":{"0":{"id":0,"variableID":23456,"comparison":0,"value":true,"type":0}},"date":[],"time":[],"dayOfTheWeek":[]}}]"#,
    )
    .unwrap();

    let evaluator = RuleTreeEvaluator::new(space.clone());
    assert_eq!(primary.primary_variable(), Some(id(12345)));
    assert!(evaluator.is_passing(&primary));
    assert!(secondary.split().iter().all(|c| evaluator.is_passing(c)));

    space.set_value(id(12345), VariableValue::Boolean(true)).unwrap();
    assert!(!evaluator.is_passing(&primary));

    space.set_value(id(23456), VariableValue::Boolean(false)).unwrap();
    assert!(!secondary.split().iter().all(|c| evaluator.is_passing(c)));
}

#[test]
fn test_condition_bound_to_deleted_variable() {
    let space = Arc::new(MemoryObjectSpace::new());
    let variable = space.create_variable("STATE", None, VariableValue::Boolean(false));
    let expr = ConditionExpression::variable_equals(variable, serde_json::json!(true));
    let evaluator = RuleTreeEvaluator::new(space.clone());

    space.remove(variable);
    assert!(!evaluator.is_passing(&expr));
    assert_eq!(expr.bound_variables(), vec![Some(variable)]);
}
