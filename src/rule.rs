//! Rule tree model.
//!
//! `QueryRule` is the serialized form a client sends: one struct used for both
//! leaves and groups. It is lowered once into `RuleNode`, where leaves and
//! groups are distinct variants and operators are a closed enum.

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Serialized rule node, as exchanged with clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_query_rules: Option<Vec<QueryRule>>,
}

impl QueryRule {
    pub fn leaf(field: &str, operator: &str, values: &[&str], value_type: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            operator: Some(operator.to_string()),
            values: values.iter().map(|v| v.to_string()).collect(),
            value_type: Some(value_type.to_string()),
            ..Default::default()
        }
    }

    pub fn group(condition: &str, children: Vec<QueryRule>) -> Self {
        Self {
            condition: Some(condition.to_string()),
            sub_query_rules: Some(children),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn has_children(&self) -> bool {
        self.sub_query_rules
            .as_ref()
            .is_some_and(|children| !children.is_empty())
    }
}

/// Boolean connective of a group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    And,
    Or,
}

impl Condition {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "AND" => Ok(Condition::And),
            "OR" => Ok(Condition::Or),
            _ => Err(QueryError::UnparsableCondition {
                condition: raw.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::And => "AND",
            Condition::Or => "OR",
        }
    }
}

/// Comparison operators a leaf may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    Between,
    Contains,
    NotContains,
    BeginsWith,
    NotBeginsWith,
    EndsWith,
    NotEndsWith,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Operator {
    pub fn parse(raw: &str) -> Option<Self> {
        let op = match raw {
            "equal" => Operator::Equal,
            "not_equal" => Operator::NotEqual,
            "between" => Operator::Between,
            "contains" => Operator::Contains,
            "not_contains" => Operator::NotContains,
            "begins_with" => Operator::BeginsWith,
            "not_begins_with" => Operator::NotBeginsWith,
            "ends_with" => Operator::EndsWith,
            "not_ends_with" => Operator::NotEndsWith,
            "less" => Operator::Less,
            "less_or_equal" => Operator::LessOrEqual,
            "greater" => Operator::Greater,
            "greater_or_equal" => Operator::GreaterOrEqual,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "equal",
            Operator::NotEqual => "not_equal",
            Operator::Between => "between",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::BeginsWith => "begins_with",
            Operator::NotBeginsWith => "not_begins_with",
            Operator::EndsWith => "ends_with",
            Operator::NotEndsWith => "not_ends_with",
            Operator::Less => "less",
            Operator::LessOrEqual => "less_or_equal",
            Operator::Greater => "greater",
            Operator::GreaterOrEqual => "greater_or_equal",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared semantic type of a leaf's operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    String,
    Date,
    Double,
    Status,
    /// Any other type name. Operands stay raw strings.
    Other(String),
}

impl ValueType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "string" => ValueType::String,
            "date" => ValueType::Date,
            "double" => ValueType::Double,
            "status" => ValueType::Status,
            other => ValueType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ValueType::String => "string",
            ValueType::Date => "date",
            ValueType::Double => "double",
            ValueType::Status => "status",
            ValueType::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafRule {
    pub field: String,
    pub operator: Operator,
    pub values: Vec<String>,
    pub value_type: ValueType,
}

/// Checked rule tree.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleNode {
    /// A leaf without a field: matches everything.
    MatchAll,
    Leaf(LeafRule),
    Group {
        condition: Condition,
        children: Vec<RuleNode>,
    },
}

impl RuleNode {
    pub fn and(children: Vec<RuleNode>) -> Self {
        RuleNode::Group {
            condition: Condition::And,
            children,
        }
    }

    pub fn or(children: Vec<RuleNode>) -> Self {
        RuleNode::Group {
            condition: Condition::Or,
            children,
        }
    }
}

impl TryFrom<&QueryRule> for RuleNode {
    type Error = QueryError;

    fn try_from(rule: &QueryRule) -> Result<Self> {
        if rule.has_children() {
            // A group's own field and operator are ignored.
            let condition = Condition::parse(rule.condition.as_deref().unwrap_or(""))?;
            let children = rule
                .sub_query_rules
                .iter()
                .flatten()
                .map(RuleNode::try_from)
                .collect::<Result<Vec<_>>>()?;
            return Ok(RuleNode::Group {
                condition,
                children,
            });
        }

        let Some(field) = rule.field.as_ref() else {
            return Ok(RuleNode::MatchAll);
        };

        let value_type = rule
            .value_type
            .as_deref()
            .map(ValueType::parse)
            .unwrap_or(ValueType::String);
        let raw_operator = rule.operator.as_deref().unwrap_or("");
        let operator =
            Operator::parse(raw_operator).ok_or_else(|| QueryError::UnsupportedOperator {
                value_type: value_type.to_string(),
                operator: raw_operator.to_string(),
                values: rule.values.clone(),
            })?;

        Ok(RuleNode::Leaf(LeafRule {
            field: field.clone(),
            operator,
            values: rule.values.clone(),
            value_type,
        }))
    }
}

impl From<&RuleNode> for QueryRule {
    fn from(node: &RuleNode) -> Self {
        match node {
            RuleNode::MatchAll => QueryRule::default(),
            RuleNode::Leaf(leaf) => QueryRule {
                field: Some(leaf.field.clone()),
                operator: Some(leaf.operator.as_str().to_string()),
                values: leaf.values.clone(),
                value_type: Some(leaf.value_type.to_string()),
                ..Default::default()
            },
            RuleNode::Group {
                condition,
                children,
            } => QueryRule {
                condition: Some(condition.as_str().to_string()),
                sub_query_rules: Some(children.iter().map(QueryRule::from).collect()),
                ..Default::default()
            },
        }
    }
}

/// A user query: rule trees for both entity families plus presentation data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub query_rule: Option<QueryRule>,
    #[serde(default)]
    pub path_data_query_rule: Option<QueryRule>,
    #[serde(default)]
    pub selects: Vec<String>,
    #[serde(default)]
    pub order_by_list: Vec<String>,
    #[serde(default)]
    pub grouped_by_list: Vec<String>,
    #[serde(default)]
    pub contexts: Vec<QueryContext>,
}

impl Query {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn revision_rule(&self) -> Result<RuleNode> {
        lower(self.query_rule.as_ref())
    }

    pub fn path_data_rule(&self) -> Result<RuleNode> {
        lower(self.path_data_query_rule.as_ref())
    }
}

fn lower(rule: Option<&QueryRule>) -> Result<RuleNode> {
    match rule {
        Some(rule) => RuleNode::try_from(rule),
        None => Ok(RuleNode::MatchAll),
    }
}

/// Product instance a saved query was scoped to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryContext {
    pub serial_number: String,
    pub configuration_item: String,
}
