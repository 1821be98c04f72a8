//! Condition expression types
//!
//! A condition expression is the host's serialized rule tree: a list of nodes,
//! each combining its own rules and its child nodes with one operation.
//!
//! ```json
//! [{"id": 0, "parentID": 0, "operation": 0,
//!   "rules": {"variable": [{"id": 0, "variableID": 12345, "comparison": 0, "value": true, "type": 0}],
//!             "date": [], "time": [], "dayOfTheWeek": []}}]
//! ```

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use wm_core::ObjectId;

/// Condition errors
#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("malformed condition expression: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown comparison operator: {0}")]
    UnknownComparison(i64),

    #[error("unknown node operation: {0}")]
    UnknownOperation(i64),

    #[error("unknown rule value type: {0}")]
    UnknownValueType(i64),

    #[error("rule references no variable")]
    UnsetVariable,

    #[error("variable not found: {0}")]
    VariableNotFound(ObjectId),

    #[error("cannot compare {actual} with {expected}")]
    Incomparable { actual: String, expected: String },

    #[error("invalid rule value: {0}")]
    InvalidValue(String),

    /// Every node has a parent in the list, so no tree can be evaluated
    #[error("condition expression has no root node")]
    NoRootNode,
}

/// Result type for condition operations
pub type ConditionResult<T> = Result<T, ConditionError>;

/// Comparison operator of a rule, numbered as the host numbers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Comparison {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Comparison {
    /// Whether `actual.cmp(expected) == ordering` satisfies this operator
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Equal => ordering == Ordering::Equal,
            Comparison::NotEqual => ordering != Ordering::Equal,
            Comparison::Greater => ordering == Ordering::Greater,
            Comparison::GreaterOrEqual => ordering != Ordering::Less,
            Comparison::Less => ordering == Ordering::Less,
            Comparison::LessOrEqual => ordering != Ordering::Greater,
        }
    }
}

impl TryFrom<i64> for Comparison {
    type Error = ConditionError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Comparison::Equal),
            1 => Ok(Comparison::NotEqual),
            2 => Ok(Comparison::Greater),
            3 => Ok(Comparison::GreaterOrEqual),
            4 => Ok(Comparison::Less),
            5 => Ok(Comparison::LessOrEqual),
            other => Err(ConditionError::UnknownComparison(other)),
        }
    }
}

impl From<Comparison> for i64 {
    fn from(c: Comparison) -> Self {
        c as i64
    }
}

/// How a node combines the results of its rules and child nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum NodeOperation {
    #[default]
    And,
    Or,
    Nand,
    Nor,
}

impl TryFrom<i64> for NodeOperation {
    type Error = ConditionError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(NodeOperation::And),
            1 => Ok(NodeOperation::Or),
            2 => Ok(NodeOperation::Nand),
            3 => Ok(NodeOperation::Nor),
            other => Err(ConditionError::UnknownOperation(other)),
        }
    }
}

impl From<NodeOperation> for i64 {
    fn from(op: NodeOperation) -> Self {
        op as i64
    }
}

/// What the `value` of a variable rule holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum RuleValueType {
    /// A constant to compare against
    #[default]
    Constant,
    /// The identity of another variable whose value is compared against
    Variable,
}

impl TryFrom<i64> for RuleValueType {
    type Error = ConditionError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(RuleValueType::Constant),
            1 => Ok(RuleValueType::Variable),
            other => Err(ConditionError::UnknownValueType(other)),
        }
    }
}

impl From<RuleValueType> for i64 {
    fn from(t: RuleValueType) -> Self {
        t as i64
    }
}

/// Compare a variable against a constant or another variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRule {
    #[serde(default)]
    pub id: i64,

    /// Raw identity of the bound variable (0 / 1 when nothing is selected)
    #[serde(rename = "variableID", default, deserialize_with = "lenient_i64")]
    pub variable_id: i64,

    pub comparison: Comparison,

    #[serde(default)]
    pub value: serde_json::Value,

    #[serde(rename = "type", default)]
    pub value_type: RuleValueType,
}

impl VariableRule {
    /// The bound variable, `None` when the rule points at a sentinel
    pub fn variable(&self) -> Option<ObjectId> {
        ObjectId::from_raw(self.variable_id)
    }

    /// The variable compared against, for rules of type [`RuleValueType::Variable`]
    pub fn value_variable(&self) -> Option<Option<ObjectId>> {
        match self.value_type {
            RuleValueType::Constant => None,
            RuleValueType::Variable => Some(ObjectId::from_json(&self.value)),
        }
    }
}

/// Time of day for time rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    #[serde(default)]
    pub second: u32,
}

/// Calendar date for date rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDate {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

/// Compare the current time of day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRule {
    #[serde(default)]
    pub id: i64,
    pub comparison: Comparison,
    pub value: TimeOfDay,
}

/// Compare the current date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRule {
    #[serde(default)]
    pub id: i64,
    pub comparison: Comparison,
    pub value: CalendarDate,
}

/// Compare the current weekday (1 = Monday ... 7 = Sunday)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayRule {
    #[serde(default)]
    pub id: i64,
    pub comparison: Comparison,
    pub value: u32,
}

/// Rules of one node, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionRules {
    #[serde(default, deserialize_with = "seq_or_map")]
    pub variable: Vec<VariableRule>,

    #[serde(default, deserialize_with = "seq_or_map")]
    pub date: Vec<DateRule>,

    #[serde(default, deserialize_with = "seq_or_map")]
    pub time: Vec<TimeRule>,

    #[serde(rename = "dayOfTheWeek", default, deserialize_with = "seq_or_map")]
    pub day_of_the_week: Vec<WeekdayRule>,
}

impl ConditionRules {
    pub fn len(&self) -> usize {
        self.variable.len() + self.date.len() + self.time.len() + self.day_of_the_week.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One node of a rule tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionNode {
    #[serde(default)]
    pub id: i64,

    #[serde(rename = "parentID", default)]
    pub parent_id: i64,

    #[serde(default)]
    pub operation: NodeOperation,

    #[serde(default)]
    pub rules: ConditionRules,
}

/// A serialized condition expression
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionExpression {
    nodes: Vec<ConditionNode>,
}

impl ConditionExpression {
    /// Parse the host's serialized form; a blank string is an empty expression
    ///
    /// Nodes whose parent links only form cycles are rejected.
    pub fn parse(raw: &str) -> ConditionResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let expression: Self = serde_json::from_str(raw)?;
        if !expression.is_empty() && expression.roots().next().is_none() {
            return Err(ConditionError::NoRootNode);
        }
        Ok(expression)
    }

    pub fn from_nodes(nodes: Vec<ConditionNode>) -> Self {
        Self { nodes }
    }

    /// A single-rule expression `variable == value`
    pub fn variable_equals(variable: ObjectId, value: serde_json::Value) -> Self {
        Self::from_nodes(vec![ConditionNode {
            id: 0,
            parent_id: 0,
            operation: NodeOperation::And,
            rules: ConditionRules {
                variable: vec![VariableRule {
                    id: 0,
                    variable_id: variable.get(),
                    comparison: Comparison::Equal,
                    value,
                    value_type: RuleValueType::Constant,
                }],
                ..Default::default()
            },
        }])
    }

    pub fn nodes(&self) -> &[ConditionNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialized form as stored by the host
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "[]".to_string())
    }

    /// The variable bound by the first rule of the first node
    ///
    /// This is the identity of a monitored sensor. `None` when the expression
    /// is empty, has no variable rule, or the rule points at a sentinel.
    pub fn primary_variable(&self) -> Option<ObjectId> {
        self.nodes
            .first()
            .and_then(|node| node.rules.variable.first())
            .and_then(VariableRule::variable)
    }

    /// Every variable reference in the expression, in rule order
    ///
    /// References to sentinels ("nothing selected") appear as `None`.
    pub fn bound_variables(&self) -> Vec<Option<ObjectId>> {
        let mut refs = Vec::new();
        for node in &self.nodes {
            for rule in &node.rules.variable {
                refs.push(rule.variable());
                if let Some(value_variable) = rule.value_variable() {
                    refs.push(value_variable);
                }
            }
        }
        refs
    }

    /// Nodes that start a tree: self-parented, or whose parent is not in the list
    pub fn roots(&self) -> impl Iterator<Item = &ConditionNode> {
        self.nodes.iter().filter(move |node| {
            node.parent_id == node.id
                || !self
                    .nodes
                    .iter()
                    .any(|other| other.id == node.parent_id && other.id != node.id)
        })
    }

    /// Direct children of a node
    pub fn children<'a>(&'a self, node: &'a ConditionNode) -> impl Iterator<Item = &'a ConditionNode> {
        self.nodes
            .iter()
            .filter(move |other| other.parent_id == node.id && other.id != node.id)
    }

    /// Split into one expression per root node, each carrying its subtree
    pub fn split(&self) -> Vec<ConditionExpression> {
        self.roots()
            .map(|root| {
                let mut visited = HashSet::new();
                let mut nodes = Vec::new();
                self.collect_subtree(root, &mut visited, &mut nodes);
                ConditionExpression::from_nodes(nodes)
            })
            .collect()
    }

    fn collect_subtree(
        &self,
        node: &ConditionNode,
        visited: &mut HashSet<i64>,
        out: &mut Vec<ConditionNode>,
    ) {
        if !visited.insert(node.id) {
            return;
        }
        out.push(node.clone());
        for child in self.children(node) {
            self.collect_subtree(child, visited, out);
        }
    }
}

/// Accept a number or a numeric string; anything else reads as 0 (the root sentinel)
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Rule lists are written either as arrays or as objects keyed "0", "1", ...
fn seq_or_map<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SeqOrMap<T> {
        Seq(Vec<T>),
        Map(BTreeMap<String, T>),
    }

    Ok(match SeqOrMap::<T>::deserialize(deserializer)? {
        SeqOrMap::Seq(items) => items,
        SeqOrMap::Map(map) => {
            let mut entries: Vec<(String, T)> = map.into_iter().collect();
            entries.sort_by_key(|(key, _)| key.parse::<u64>().unwrap_or(u64::MAX));
            entries.into_iter().map(|(_, item)| item).collect()
        }
    })
}
