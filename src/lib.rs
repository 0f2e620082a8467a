//! Rule-tree filtering over part revisions and product-instance path data.
//!
//! A JSON `QueryRule` tree is lowered to a `RuleNode`, compiled against one
//! field family into a `Predicate`, then either evaluated in memory by the
//! engines or rendered as SQL.

pub mod attribute;
pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod model;
pub mod predicate;
pub mod rule;
pub mod source;
pub mod sql_compiler;

#[cfg(test)]
mod fixtures;

pub use config::{ConfigError, EngineConfig};
pub use engine::{PathDataQueryEngine, RevisionQueryEngine};
pub use error::{QueryError, Result};
pub use model::{ProductInstanceIteration, Revision, RevisionKey};
pub use rule::{Query, QueryRule, RuleNode};
pub use source::{InMemorySource, PathDataSource, RevisionSource};
pub use sql_compiler::{CompileResult, Optimization, SqlCompiler};
