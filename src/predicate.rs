//! Compilation of rule trees into predicates, and their evaluation.
//!
//! Compilation does all validation: field resolution, operand coercion and
//! operator/type gating. A compiled `Predicate` cannot fail at evaluation
//! time; it only answers whether a row matches.

use crate::attribute::AttributeStore;
use crate::coerce::{coerce, Operand};
use crate::error::{QueryError, Result};
use crate::field::{AttributeScope, Family, FieldRef, ValueKind};
use crate::model::RevisionStatus;
use crate::rule::{Condition, LeafRule, Operator, RuleNode, ValueType};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::cmp::Ordering;

/// A comparable field or operand value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Date(DateTime<Utc>),
    Number(f64),
    Boolean(bool),
    Lov(u32),
    Status(RevisionStatus),
}

impl Scalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(text) => Some(text),
            _ => None,
        }
    }

    fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Number(a), Scalar::Number(b)) => a.partial_cmp(b),
            (Scalar::Date(a), Scalar::Date(b)) => Some(a.cmp(b)),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<Operand> for Scalar {
    fn from(operand: Operand) -> Self {
        match operand {
            Operand::Text(text) => Scalar::Text(text),
            Operand::Date(date) => Scalar::Date(date),
            Operand::Number(n) => Scalar::Number(n),
            Operand::Status(status) => Scalar::Status(status),
        }
    }
}

/// Anchoring of a case-insensitive pattern match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeMode {
    Contains,
    BeginsWith,
    EndsWith,
}

impl LikeMode {
    fn matches(&self, haystack: &str, needle: &str) -> bool {
        match self {
            LikeMode::Contains => haystack.contains(needle),
            LikeMode::BeginsWith => haystack.starts_with(needle),
            LikeMode::EndsWith => haystack.ends_with(needle),
        }
    }

    /// SQL `LIKE` pattern for `needle`. A backslash escapes `%` and `_` so
    /// they match literally, as they do in memory.
    pub fn pattern(&self, needle: &str) -> String {
        let needle = needle
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        match self {
            LikeMode::Contains => format!("%{}%", needle),
            LikeMode::BeginsWith => format!("{}%", needle),
            LikeMode::EndsWith => format!("%{}", needle),
        }
    }
}

/// The comparison a leaf applies to its field's value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueTest {
    Always,
    Equal(Scalar),
    NotEqual(Scalar),
    /// Half-open `[start, end)`.
    DayWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Inclusive on both ends.
    Range {
        low: Scalar,
        high: Scalar,
    },
    Less(Scalar),
    LessOrEqual(Scalar),
    Greater(Scalar),
    GreaterOrEqual(Scalar),
    /// `needle` is already lower-cased.
    Like {
        mode: LikeMode,
        needle: String,
        negated: bool,
    },
    TagsAny(Vec<String>),
    TagsNone(Vec<String>),
}

impl ValueTest {
    /// Apply the test to a present value.
    pub fn test(&self, actual: &Scalar) -> bool {
        match self {
            ValueTest::Always => true,
            ValueTest::Equal(expected) => actual == expected,
            ValueTest::NotEqual(expected) => actual != expected,
            ValueTest::DayWindow { start, end } => {
                matches!(actual, Scalar::Date(date) if date >= start && date < end)
            }
            ValueTest::Range { low, high } => {
                matches!(actual.compare(low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(actual.compare(high), Some(Ordering::Less | Ordering::Equal))
            }
            ValueTest::Less(bound) => actual.compare(bound) == Some(Ordering::Less),
            ValueTest::LessOrEqual(bound) => {
                matches!(actual.compare(bound), Some(Ordering::Less | Ordering::Equal))
            }
            ValueTest::Greater(bound) => actual.compare(bound) == Some(Ordering::Greater),
            ValueTest::GreaterOrEqual(bound) => {
                matches!(actual.compare(bound), Some(Ordering::Greater | Ordering::Equal))
            }
            ValueTest::Like {
                mode,
                needle,
                negated,
            } => actual
                .as_text()
                .is_some_and(|text| mode.matches(&text.to_lowercase(), needle) != *negated),
            // Tag sets are checked by the row, never through a single value.
            ValueTest::TagsAny(_) | ValueTest::TagsNone(_) => false,
        }
    }
}

/// Compiled rule tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Compare { field: FieldRef, test: ValueTest },
}

///
/// Row
///
/// One candidate the predicate is evaluated against: a head entity paired
/// with the iteration under consideration.
///
pub trait Row {
    /// Value of a core field, `None` when unset or not applicable.
    fn core_value(&self, field: &FieldRef) -> Option<Scalar>;

    fn has_tag(&self, label: &str) -> bool;

    /// Attribute collection of the current iteration for `scope`.
    fn attribute_store(&self, scope: AttributeScope) -> Option<&dyn AttributeStore>;

    fn is_last_iteration(&self) -> bool;
}

impl Predicate {
    pub fn matches<R: Row + ?Sized>(&self, row: &R) -> bool {
        match self {
            Predicate::True => true,
            Predicate::And(children) => children.iter().all(|child| child.matches(row)),
            Predicate::Or(children) => children.iter().any(|child| child.matches(row)),
            Predicate::Compare { field, test } => compare(row, field, test),
        }
    }
}

fn compare<R: Row + ?Sized>(row: &R, field: &FieldRef, test: &ValueTest) -> bool {
    match (field, test) {
        (_, ValueTest::Always) => true,
        (_, ValueTest::TagsAny(labels)) => labels.iter().any(|label| row.has_tag(label)),
        (_, ValueTest::TagsNone(labels)) => !labels.iter().any(|label| row.has_tag(label)),
        (FieldRef::Attribute { scope, kind, name }, _) => row
            .attribute_store(*scope)
            .is_some_and(|store| store.has_attribute(*kind, name, &|value| test.test(value))),
        _ => {
            if field.is_last_iteration_only() && !row.is_last_iteration() {
                return false;
            }
            row.core_value(field).is_some_and(|value| test.test(&value))
        }
    }
}

/// Settings a compilation runs under.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext {
    pub family: Family,
    pub timezone: FixedOffset,
}

/// Compile a rule tree. Fails on the first invalid leaf.
pub fn compile(node: &RuleNode, ctx: &CompileContext) -> Result<Predicate> {
    match node {
        RuleNode::MatchAll => Ok(Predicate::True),
        RuleNode::Leaf(leaf) => compile_leaf(leaf, ctx),
        RuleNode::Group {
            condition,
            children,
        } => {
            let compiled = children
                .iter()
                .map(|child| compile(child, ctx))
                .collect::<Result<Vec<_>>>()?;
            Ok(match condition {
                Condition::And if compiled.is_empty() => Predicate::True,
                Condition::And => Predicate::And(compiled),
                Condition::Or => Predicate::Or(compiled),
            })
        }
    }
}

fn compile_leaf(leaf: &LeafRule, ctx: &CompileContext) -> Result<Predicate> {
    let field = FieldRef::resolve_for(ctx.family, &leaf.field, leaf.operator, &leaf.values)?;
    let test = value_test(&field, leaf, ctx.timezone)?;
    Ok(Predicate::Compare { field, test })
}

fn value_test(field: &FieldRef, leaf: &LeafRule, timezone: FixedOffset) -> Result<ValueTest> {
    let unsupported = || QueryError::UnsupportedOperator {
        value_type: leaf.value_type.to_string(),
        operator: leaf.operator.to_string(),
        values: leaf.values.clone(),
    };
    let malformed = || QueryError::MalformedOperand {
        value_type: leaf.value_type.to_string(),
        operator: leaf.operator.to_string(),
        values: leaf.values.clone(),
    };
    let raw_type = matches!(leaf.value_type, ValueType::String | ValueType::Other(_));

    match field.value_kind() {
        ValueKind::Unchecked => Ok(ValueTest::Always),
        ValueKind::Tags => {
            if leaf.values.is_empty() {
                return Err(unsupported());
            }
            match leaf.operator {
                Operator::Equal => Ok(ValueTest::TagsAny(leaf.values.clone())),
                Operator::NotEqual => Ok(ValueTest::TagsNone(leaf.values.clone())),
                _ => Err(unsupported()),
            }
        }
        ValueKind::Status => {
            let accepted = raw_type || leaf.value_type == ValueType::Status;
            let raw = equality_operand(leaf, accepted).ok_or_else(unsupported)?;
            let status = raw.parse::<RevisionStatus>().map_err(|_| malformed())?;
            equality(leaf.operator, Scalar::Status(status)).ok_or_else(unsupported)
        }
        ValueKind::Boolean => {
            let raw = equality_operand(leaf, raw_type).ok_or_else(unsupported)?;
            let value = parse_bool(raw).ok_or_else(malformed)?;
            equality(leaf.operator, Scalar::Boolean(value)).ok_or_else(unsupported)
        }
        ValueKind::Lov => {
            let raw = equality_operand(leaf, raw_type).ok_or_else(unsupported)?;
            let index = raw.trim().parse::<u32>().map_err(|_| malformed())?;
            equality(leaf.operator, Scalar::Lov(index)).ok_or_else(unsupported)
        }
        kind @ (ValueKind::Text | ValueKind::Date | ValueKind::Number) => {
            let operands = coerce(&leaf.value_type, leaf.operator, &leaf.values, timezone)?;
            let accepted = match kind {
                ValueKind::Text => raw_type,
                ValueKind::Date => leaf.value_type == ValueType::Date,
                _ => leaf.value_type == ValueType::Double,
            };
            if !accepted {
                return Err(unsupported());
            }
            let operands: Vec<Scalar> = operands.into_iter().map(Scalar::from).collect();

            if let (Operator::Equal, Some(Scalar::Date(start))) =
                (leaf.operator, operands.first())
            {
                // The last representable day has no following midnight.
                let end = start
                    .checked_add_signed(Duration::days(1))
                    .ok_or_else(malformed)?;
                return Ok(ValueTest::DayWindow { start: *start, end });
            }
            comparison(leaf.operator, &leaf.value_type, operands).ok_or_else(unsupported)
        }
    }
}

// The single operand of an equality-only field. Arity, operator and declared
// type are checked before the operand is parsed.
fn equality_operand(leaf: &LeafRule, type_accepted: bool) -> Option<&str> {
    let [raw] = leaf.values.as_slice() else {
        return None;
    };
    let equality = matches!(leaf.operator, Operator::Equal | Operator::NotEqual);
    (equality && type_accepted).then_some(raw.as_str())
}

fn equality(operator: Operator, value: Scalar) -> Option<ValueTest> {
    match operator {
        Operator::Equal => Some(ValueTest::Equal(value)),
        Operator::NotEqual => Some(ValueTest::NotEqual(value)),
        _ => None,
    }
}

// `None` means the operator is not defined for this type or arity.
fn comparison(
    operator: Operator,
    value_type: &ValueType,
    operands: Vec<Scalar>,
) -> Option<ValueTest> {
    let ordered = matches!(value_type, ValueType::Date | ValueType::Double);
    let textual = *value_type == ValueType::String;

    if operator == Operator::Between {
        if !ordered {
            return None;
        }
        let [low, high]: [Scalar; 2] = operands.try_into().ok()?;
        return Some(ValueTest::Range { low, high });
    }

    let first = operands.into_iter().next()?;
    let test = match operator {
        Operator::Equal => ValueTest::Equal(first),
        Operator::NotEqual => ValueTest::NotEqual(first),
        Operator::Less if ordered => ValueTest::Less(first),
        Operator::LessOrEqual if ordered => ValueTest::LessOrEqual(first),
        Operator::Greater if ordered => ValueTest::Greater(first),
        Operator::GreaterOrEqual if ordered => ValueTest::GreaterOrEqual(first),
        Operator::Contains | Operator::NotContains if textual => {
            like(LikeMode::Contains, operator, &first)?
        }
        Operator::BeginsWith | Operator::NotBeginsWith if textual => {
            like(LikeMode::BeginsWith, operator, &first)?
        }
        Operator::EndsWith | Operator::NotEndsWith if textual => {
            like(LikeMode::EndsWith, operator, &first)?
        }
        _ => return None,
    };
    Some(test)
}

fn like(mode: LikeMode, operator: Operator, operand: &Scalar) -> Option<ValueTest> {
    let negated = matches!(
        operator,
        Operator::NotContains | Operator::NotBeginsWith | Operator::NotEndsWith
    );
    Some(ValueTest::Like {
        mode,
        needle: operand.as_text()?.to_lowercase(),
        negated,
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
