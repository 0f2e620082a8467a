//! Coercion of raw string operands into typed values.

use crate::error::{QueryError, Result};
use crate::model::RevisionStatus;
use crate::rule::{Operator, ValueType};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// A typed operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Text(String),
    Date(DateTime<Utc>),
    Number(f64),
    Status(RevisionStatus),
}

const LOCAL_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Coerce every value to `value_type`. Any failure fails the whole list.
pub fn coerce(
    value_type: &ValueType,
    operator: Operator,
    values: &[String],
    timezone: FixedOffset,
) -> Result<Vec<Operand>> {
    let malformed = || QueryError::MalformedOperand {
        value_type: value_type.to_string(),
        operator: operator.to_string(),
        values: values.to_vec(),
    };

    match value_type {
        ValueType::String | ValueType::Other(_) => {
            Ok(values.iter().cloned().map(Operand::Text).collect())
        }
        ValueType::Date => values
            .iter()
            .map(|v| parse_date(v, timezone).map(Operand::Date).ok_or_else(malformed))
            .collect(),
        ValueType::Double => values
            .iter()
            .map(|v| parse_double(v).map(Operand::Number).ok_or_else(malformed))
            .collect(),
        ValueType::Status => values
            .iter()
            .map(|v| {
                v.parse::<RevisionStatus>()
                    .map(Operand::Status)
                    .map_err(|_| malformed())
            })
            .collect(),
    }
}

/// Parse a date operand. Values without an offset are local to `timezone`.
pub fn parse_date(raw: &str, timezone: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = LOCAL_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    timezone
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_double(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| !n.is_nan())
}
