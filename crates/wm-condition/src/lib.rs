//! Condition expressions for the warning detector
//!
//! Monitored sensors are configured as serialized rule trees bound to host
//! variables. This crate parses those trees, extracts the variables they bind
//! and evaluates them against the host object space.

mod eval;
mod expression;

pub use eval::{ConditionEvaluator, EvalContext, RuleTreeEvaluator};
pub use expression::{
    CalendarDate, Comparison, ConditionError, ConditionExpression, ConditionNode, ConditionResult,
    ConditionRules, DateRule, NodeOperation, RuleValueType, TimeOfDay, TimeRule, VariableRule,
    WeekdayRule,
};
