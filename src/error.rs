//! Error types raised while compiling and running rule queries.

/// Failure reported by a data source. Passed through to the caller untouched.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("malformed operand(s) {values:?} for type `{value_type}` with operator `{operator}`")]
    MalformedOperand {
        value_type: String,
        operator: String,
        values: Vec<String>,
    },

    #[error("unresolved field `{field}` (operator `{operator}`, values {values:?})")]
    UnresolvedField {
        field: String,
        operator: String,
        values: Vec<String>,
    },

    #[error("unsupported operator `{operator}` for type `{value_type}` with values {values:?}")]
    UnsupportedOperator {
        value_type: String,
        operator: String,
        values: Vec<String>,
    },

    #[error("unparsable condition `{condition}`")]
    UnparsableCondition { condition: String },

    #[error(transparent)]
    Source(SourceError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
