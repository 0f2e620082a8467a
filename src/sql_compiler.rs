//! SQL compiler that renders compiled rule queries as PostgreSQL using sea-query.
//!
//! The rendered statement mirrors the in-memory engines: the same compiled
//! `Predicate` becomes the `WHERE` tree, dynamic attributes become `EXISTS`
//! sub-selects on their per-kind table, and the revision query always
//! carries the checked-in post-filter.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::field::{
    AttributeKind, AttributeScope, AuthorField, Family, FieldRef, MasterField, RevisionField,
};
use crate::model::ProductInstanceIteration;
use crate::predicate::{compile, CompileContext, Predicate, Scalar, ValueTest};
use crate::rule::{Operator, Query};
use sea_query::{
    Alias, Asterisk, Expr, Func, Iden, JoinType, LikeExpr, Order, PostgresQueryBuilder,
    SelectStatement, SimpleExpr, Value,
};
use tracing::debug;

/// Table aliases used in rendered statements.
#[derive(Debug, Clone, Copy)]
pub enum TableAlias {
    Revision,
    Master,
    Author,
    Iteration,
    CheckedIn,
    PathData,
    PathDataIteration,
    /// Sub-select aliases, numbered per statement.
    Sub(usize),
}

impl Iden for TableAlias {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = match self {
            TableAlias::Revision => write!(s, "pr"),
            TableAlias::Master => write!(s, "pm"),
            TableAlias::Author => write!(s, "au"),
            TableAlias::Iteration => write!(s, "pi"),
            TableAlias::CheckedIn => write!(s, "ci"),
            TableAlias::PathData => write!(s, "pd"),
            TableAlias::PathDataIteration => write!(s, "pdi"),
            TableAlias::Sub(idx) => write!(s, "s{}", idx),
        };
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone, Copy)]
pub struct ColumnName(pub &'static str);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = write!(s, "{}", self.0);
    }
}

#[derive(Debug, Clone, Copy)]
struct Column {
    table: TableAlias,
    name: &'static str,
}

impl Column {
    fn new(table: TableAlias, name: &'static str) -> Self {
        Self { table, name }
    }

    fn expr(&self) -> Expr {
        Expr::col((self.table, ColumnName(self.name)))
    }

    fn qualified(&self) -> String {
        let mut table = String::new();
        self.table.unquoted(&mut table);
        format!("{}.{}", table, self.name)
    }
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    OrToIn { field: String, value_count: usize },
}

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

/// SQL Compiler that renders rule queries as SQL statements
pub struct SqlCompiler {
    config: EngineConfig,
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn from_config(config: EngineConfig) -> Self {
        Self { config }
    }

    fn table(&self, entity: &str) -> Alias {
        Alias::new(self.config.get_table_name(entity))
    }

    fn context(&self, family: Family) -> CompileContext {
        CompileContext {
            family,
            timezone: self.config.timezone,
        }
    }

    /// Render the revision side of `query` for one workspace.
    pub fn compile_revision_query(
        &self,
        query: &Query,
        workspace_id: &str,
    ) -> Result<CompileResult> {
        let predicate = compile(&query.revision_rule()?, &self.context(Family::Revision))?;
        let mut renderer = Renderer::new(self);

        let mut select = SelectStatement::new();
        select
            .distinct()
            .column((TableAlias::Revision, ColumnName("workspace_id")))
            .column((TableAlias::Master, ColumnName("number")))
            .column((TableAlias::Revision, ColumnName("version")))
            .from_as(self.table("PartRevision"), TableAlias::Revision)
            .join_as(
                JoinType::InnerJoin,
                self.table("PartMaster"),
                TableAlias::Master,
                Expr::col((TableAlias::Master, ColumnName("id")))
                    .equals((TableAlias::Revision, ColumnName("part_master_id"))),
            )
            .join_as(
                JoinType::InnerJoin,
                self.table("Account"),
                TableAlias::Author,
                Expr::col((TableAlias::Author, ColumnName("id")))
                    .equals((TableAlias::Revision, ColumnName("author_id"))),
            )
            .join_as(
                JoinType::InnerJoin,
                self.table("PartIteration"),
                TableAlias::Iteration,
                Expr::col((TableAlias::Iteration, ColumnName("part_revision_id")))
                    .equals((TableAlias::Revision, ColumnName("id"))),
            )
            .and_where(
                Expr::col((TableAlias::Revision, ColumnName("workspace_id"))).eq(workspace_id),
            );

        // Presentation columns; dynamic attributes are not projected.
        for name in query.selects.iter().chain(&query.order_by_list) {
            if let Some(column) = self.presentation_column(name)? {
                select.column((column.table, ColumnName(column.name)));
            }
        }
        for name in &query.order_by_list {
            if let Some(column) = self.presentation_column(name)? {
                select.order_by((column.table, ColumnName(column.name)), Order::Asc);
            }
        }

        select.and_where(renderer.render(&predicate));

        let mut checked_in = SelectStatement::new();
        checked_in
            .expr(Expr::val(1))
            .from_as(self.table("PartIteration"), TableAlias::CheckedIn)
            .and_where(
                Expr::col((TableAlias::CheckedIn, ColumnName("part_revision_id")))
                    .equals((TableAlias::Revision, ColumnName("id"))),
            )
            .and_where(
                Expr::col((TableAlias::CheckedIn, ColumnName("check_in_date"))).is_not_null(),
            );
        select.and_where(Expr::exists(checked_in));

        let sql = select.to_string(PostgresQueryBuilder);
        debug!(%sql, "rendered revision query");

        Ok(CompileResult {
            sql,
            optimizations: renderer.optimizations,
        })
    }

    /// Render the path-data side of `query`. `None` when the instance has no
    /// path data attached, since the statement could only return nothing.
    pub fn compile_path_data_query(
        &self,
        query: &Query,
        instance: &ProductInstanceIteration,
    ) -> Result<Option<CompileResult>> {
        if instance.path_data_ids.is_empty() {
            return Ok(None);
        }

        let predicate = compile(&query.path_data_rule()?, &self.context(Family::PathData))?;
        let mut renderer = Renderer::new(self);

        let mut select = SelectStatement::new();
        select
            .distinct()
            .column((TableAlias::PathData, ColumnName("path")))
            .from_as(self.table("PathDataMaster"), TableAlias::PathData)
            .join_as(
                JoinType::InnerJoin,
                self.table("PathDataIteration"),
                TableAlias::PathDataIteration,
                Expr::col((TableAlias::PathDataIteration, ColumnName("path_data_master_id")))
                    .equals((TableAlias::PathData, ColumnName("id"))),
            )
            .and_where(
                Expr::col((TableAlias::PathData, ColumnName("id")))
                    .is_in(instance.path_data_ids.iter().copied()),
            )
            .and_where(renderer.render(&predicate))
            .order_by((TableAlias::PathData, ColumnName("path")), Order::Asc);

        Ok(Some(CompileResult {
            sql: select.to_string(PostgresQueryBuilder),
            optimizations: renderer.optimizations,
        }))
    }

    fn presentation_column(&self, name: &str) -> Result<Option<Column>> {
        let field = FieldRef::resolve(name, Operator::Equal, &[])?;
        Ok(core_column(&field))
    }
}

fn core_column(field: &FieldRef) -> Option<Column> {
    let column = match field {
        FieldRef::Master(master) => Column::new(
            TableAlias::Master,
            match master {
                MasterField::Number => "number",
                MasterField::Name => "name",
                MasterField::Type => "type",
                MasterField::CreationDate => "creation_date",
            },
        ),
        FieldRef::Revision(revision) => match revision {
            RevisionField::Version => Column::new(TableAlias::Revision, "version"),
            RevisionField::Description => Column::new(TableAlias::Revision, "description"),
            RevisionField::CreationDate => Column::new(TableAlias::Revision, "creation_date"),
            RevisionField::CheckoutDate => Column::new(TableAlias::Revision, "checkout_date"),
            RevisionField::LifeCycleState => Column::new(TableAlias::Revision, "lifecycle_state"),
            RevisionField::Status => Column::new(TableAlias::Revision, "status"),
            RevisionField::CheckInDate => Column::new(TableAlias::Iteration, "check_in_date"),
            RevisionField::ModificationDate => {
                Column::new(TableAlias::Iteration, "modification_date")
            }
            RevisionField::Tags | RevisionField::LinkedDocuments => return None,
        },
        FieldRef::Author(author) => Column::new(
            TableAlias::Author,
            match author {
                AuthorField::Login => "login",
                AuthorField::Name => "name",
                AuthorField::Email => "email",
                AuthorField::Language => "language",
            },
        ),
        FieldRef::Attribute { .. } => return None,
    };
    Some(column)
}

fn attribute_table(kind: AttributeKind) -> (&'static str, &'static str) {
    match kind {
        AttributeKind::Text => ("TextAttribute", "text_value"),
        AttributeKind::LongText => ("LongTextAttribute", "long_text_value"),
        AttributeKind::Date => ("DateAttribute", "date_value"),
        AttributeKind::Boolean => ("BooleanAttribute", "boolean_value"),
        AttributeKind::Url => ("UrlAttribute", "url_value"),
        AttributeKind::Number => ("NumberAttribute", "number_value"),
        AttributeKind::Lov => ("LovAttribute", "item_index"),
        AttributeKind::PartNumber => ("PartNumberAttribute", "part_master_id"),
    }
}

fn value(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Text(text) => text.clone().into(),
        Scalar::Date(date) => (*date).into(),
        Scalar::Number(n) => (*n).into(),
        Scalar::Boolean(b) => (*b).into(),
        Scalar::Lov(index) => (*index).into(),
        Scalar::Status(status) => status.as_str().into(),
    }
}

fn and_all(exprs: Vec<SimpleExpr>) -> SimpleExpr {
    exprs
        .into_iter()
        .reduce(|acc, expr| acc.and(expr))
        .unwrap_or_else(|| Expr::val(true).into())
}

fn or_any(exprs: Vec<SimpleExpr>) -> SimpleExpr {
    exprs
        .into_iter()
        .reduce(|acc, expr| acc.or(expr))
        .unwrap_or_else(|| Expr::val(false).into())
}

/// Per-statement rendering state.
struct Renderer<'c> {
    compiler: &'c SqlCompiler,
    next_alias: usize,
    optimizations: Vec<Optimization>,
}

impl<'c> Renderer<'c> {
    fn new(compiler: &'c SqlCompiler) -> Self {
        Self {
            compiler,
            next_alias: 0,
            optimizations: Vec::new(),
        }
    }

    fn alias(&mut self) -> TableAlias {
        self.next_alias += 1;
        TableAlias::Sub(self.next_alias)
    }

    fn render(&mut self, predicate: &Predicate) -> SimpleExpr {
        match predicate {
            Predicate::True => Expr::val(true).into(),
            Predicate::And(children) => {
                let exprs = children.iter().map(|child| self.render(child)).collect();
                and_all(exprs)
            }
            Predicate::Or(children) => {
                if let Some(in_expr) = self.try_optimize_or_to_in(children) {
                    return in_expr;
                }
                let exprs = children.iter().map(|child| self.render(child)).collect();
                or_any(exprs)
            }
            Predicate::Compare { field, test } => self.render_compare(field, test),
        }
    }

    /// Rewrite an OR of equalities on one core column into `IN`.
    fn try_optimize_or_to_in(&mut self, children: &[Predicate]) -> Option<SimpleExpr> {
        if children.len() < self.compiler.config.max_or_conditions_for_in.max(2) {
            return None;
        }

        let mut target: Option<&FieldRef> = None;
        let mut values = Vec::with_capacity(children.len());
        for child in children {
            let Predicate::Compare {
                field,
                test: ValueTest::Equal(expected),
            } = child
            else {
                return None;
            };
            if field.is_last_iteration_only() || target.is_some_and(|t| t != field) {
                return None;
            }
            target = Some(field);
            values.push(value(expected));
        }

        let column = core_column(target?)?;
        self.optimizations.push(Optimization::OrToIn {
            field: column.qualified(),
            value_count: values.len(),
        });
        Some(column.expr().is_in(values))
    }

    fn render_compare(&mut self, field: &FieldRef, test: &ValueTest) -> SimpleExpr {
        match (field, test) {
            (_, ValueTest::Always) => Expr::val(true).into(),
            (_, ValueTest::TagsAny(labels)) => Expr::exists(self.tag_select(labels)),
            (_, ValueTest::TagsNone(labels)) => Expr::exists(self.tag_select(labels)).not(),
            (FieldRef::Attribute { scope, kind, name }, _) => {
                Expr::exists(self.attribute_select(*scope, *kind, name, test))
            }
            _ => match core_column(field) {
                Some(column) if field.is_last_iteration_only() => {
                    self.last_iteration().and(render_test(column, test))
                }
                Some(column) => render_test(column, test),
                None => Expr::val(true).into(),
            },
        }
    }

    fn tag_select(&mut self, labels: &[String]) -> SelectStatement {
        let alias = self.alias();
        let mut select = SelectStatement::new();
        select
            .expr(Expr::val(1))
            .from_as(self.compiler.table("Tag"), alias)
            .and_where(
                Expr::col((alias, ColumnName("part_revision_id")))
                    .equals((TableAlias::Revision, ColumnName("id"))),
            )
            .and_where(Expr::col((alias, ColumnName("label"))).is_in(labels.iter().cloned()));
        select
    }

    fn attribute_select(
        &mut self,
        scope: AttributeScope,
        kind: AttributeKind,
        name: &str,
        test: &ValueTest,
    ) -> SelectStatement {
        let (entity, value_column) = attribute_table(kind);
        let (owner_column, owner) = match scope {
            AttributeScope::Revision => ("part_iteration_id", TableAlias::Iteration),
            AttributeScope::PathData => ("path_data_iteration_id", TableAlias::PathDataIteration),
        };

        let alias = self.alias();
        let mut select = SelectStatement::new();
        select
            .expr(Expr::val(1))
            .from_as(self.compiler.table(entity), alias)
            .and_where(Expr::col((alias, ColumnName("name"))).eq(name))
            .and_where(
                Expr::col((alias, ColumnName(owner_column))).equals((owner, ColumnName("id"))),
            );

        let compared = if kind == AttributeKind::PartNumber {
            // Compare the referenced part's number, not the reference itself.
            let referenced = self.alias();
            select.join_as(
                JoinType::InnerJoin,
                self.compiler.table("PartMaster"),
                referenced,
                Expr::col((referenced, ColumnName("id"))).equals((alias, ColumnName(value_column))),
            );
            Column::new(referenced, "number")
        } else {
            Column::new(alias, value_column)
        };
        select.and_where(render_test(compared, test));
        select
    }

    // The iteration joined as `pi` is the newest one of its revision.
    fn last_iteration(&mut self) -> SimpleExpr {
        let alias = self.alias();
        let mut count = SelectStatement::new();
        count
            .expr(Func::count(Expr::col(Asterisk)))
            .from_as(self.compiler.table("PartIteration"), alias)
            .and_where(
                Expr::col((alias, ColumnName("part_revision_id")))
                    .equals((TableAlias::Revision, ColumnName("id"))),
            );
        Expr::col((TableAlias::Iteration, ColumnName("iteration"))).in_subquery(count)
    }
}

fn render_test(column: Column, test: &ValueTest) -> SimpleExpr {
    match test {
        ValueTest::Always | ValueTest::TagsAny(_) | ValueTest::TagsNone(_) => {
            Expr::val(true).into()
        }
        ValueTest::Equal(expected) => column.expr().eq(value(expected)),
        ValueTest::NotEqual(expected) => column.expr().ne(value(expected)),
        ValueTest::DayWindow { start, end } => column
            .expr()
            .gte(Value::from(*start))
            .and(column.expr().lt(Value::from(*end))),
        ValueTest::Range { low, high } => column.expr().between(value(low), value(high)),
        ValueTest::Less(bound) => column.expr().lt(value(bound)),
        ValueTest::LessOrEqual(bound) => column.expr().lte(value(bound)),
        ValueTest::Greater(bound) => column.expr().gt(value(bound)),
        ValueTest::GreaterOrEqual(bound) => column.expr().gte(value(bound)),
        ValueTest::Like {
            mode,
            needle,
            negated,
        } => {
            let lowered = Expr::expr(Func::lower(column.expr()));
            let pattern = LikeExpr::new(mode.pattern(needle)).escape('\\');
            if *negated {
                lowered.not_like(pattern)
            } else {
                lowered.like(pattern)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::rule::QueryRule;

    fn revision_sql(rule: QueryRule) -> CompileResult {
        let query = Query {
            query_rule: Some(rule),
            ..Default::default()
        };
        SqlCompiler::new().compile_revision_query(&query, "ws").unwrap()
    }

    #[test]
    fn test_simple_filter_compilation() {
        let result = revision_sql(QueryRule::leaf("pm.name", "equal", &["Bolt"], "string"));
        assert!(result.sql.starts_with("SELECT DISTINCT"));
        assert!(result.sql.contains(r#"FROM "part_revision" AS "pr""#));
        assert!(result.sql.contains(r#""pm"."name" = 'Bolt'"#));
        assert!(result.sql.contains(r#""pr"."workspace_id" = 'ws'"#));
    }

    #[test]
    fn test_checked_in_filter_is_always_present() {
        let result = revision_sql(QueryRule::default());
        assert!(result.sql.contains("EXISTS"));
        assert!(result.sql.contains(r#""ci"."check_in_date" IS NOT NULL"#));
    }

    #[test]
    fn test_attribute_becomes_exists_subselect() {
        let result =
            revision_sql(QueryRule::leaf("attr-NUMBER.weight", "between", &["1", "5"], "double"));
        assert!(result.sql.contains(r#"FROM "number_attribute" AS "s1""#));
        assert!(result.sql.contains(r#""s1"."name" = 'weight'"#));
        assert!(result.sql.contains(r#""s1"."part_iteration_id" = "pi"."id""#));
        assert!(result.sql.contains("BETWEEN"));
    }

    #[test]
    fn test_part_number_joins_referenced_master() {
        let result = revision_sql(QueryRule::leaf(
            "attr-PART_NUMBER.replaces",
            "equal",
            &["P-003"],
            "string",
        ));
        assert!(result.sql.contains(r#""part_master" AS "s2""#));
        assert!(result.sql.contains(r#""s2"."number" = 'P-003'"#));
    }

    #[test]
    fn test_like_is_lowered() {
        let result = revision_sql(QueryRule::leaf("pm.name", "contains", &["Foo"], "string"));
        assert!(result.sql.contains(r#"LOWER("pm"."name") LIKE '%foo%'"#));

        let result =
            revision_sql(QueryRule::leaf("pm.name", "not_begins_with", &["foo"], "string"));
        assert!(result.sql.contains(r#"LOWER("pm"."name") NOT LIKE 'foo%'"#));
    }

    #[test]
    fn test_like_wildcards_in_needle_are_escaped() {
        let result = revision_sql(QueryRule::leaf("pm.name", "contains", &["50%_off"], "string"));
        assert!(result.sql.contains("ESCAPE"));
        assert!(!result.sql.contains("'%50%_off%'"));
    }

    #[test]
    fn test_date_equal_renders_day_window() {
        let result =
            revision_sql(QueryRule::leaf("pr.creationDate", "equal", &["2024-05-10"], "date"));
        assert!(result.sql.contains(r#""pr"."creation_date" >= "#));
        assert!(result.sql.contains(r#""pr"."creation_date" < "#));
    }

    #[test]
    fn test_check_in_date_restricted_to_last_iteration() {
        let result =
            revision_sql(QueryRule::leaf("pr.checkInDate", "greater", &["2024-01-01"], "date"));
        assert!(result.sql.contains(r#""pi"."iteration" IN (SELECT COUNT(*)"#));
        assert!(result.sql.contains(r#""pi"."check_in_date" > "#));
    }

    #[test]
    fn test_tags_membership() {
        let result = revision_sql(QueryRule::leaf("pr.tags", "not_equal", &["urgent"], "string"));
        assert!(result.sql.contains(r#"NOT EXISTS"#));
        assert!(result.sql.contains(r#""revision_tag""#));
        assert!(result.sql.contains(r#""label" IN ('urgent')"#));
    }

    #[test]
    fn test_or_to_in_optimization() {
        let mut config = EngineConfig::default();
        config.max_or_conditions_for_in = 3;
        let compiler = SqlCompiler::from_config(config);

        let rule = QueryRule::group(
            "OR",
            ["Open", "Pending", "Review"]
                .iter()
                .map(|v| QueryRule::leaf("pr.lifeCycleState", "equal", &[*v], "string"))
                .collect(),
        );
        let query = Query {
            query_rule: Some(rule),
            ..Default::default()
        };
        let result = compiler.compile_revision_query(&query, "ws").unwrap();

        assert_eq!(
            result.optimizations,
            vec![Optimization::OrToIn {
                field: "pr.lifecycle_state".to_string(),
                value_count: 3,
            }]
        );
        assert!(result
            .sql
            .contains(r#""pr"."lifecycle_state" IN ('Open', 'Pending', 'Review')"#));
    }

    #[test]
    fn test_mixed_or_is_not_rewritten() {
        let rule = QueryRule::group(
            "OR",
            vec![
                QueryRule::leaf("pm.name", "equal", &["a"], "string"),
                QueryRule::leaf("pm.name", "equal", &["b"], "string"),
                QueryRule::leaf("pm.name", "equal", &["c"], "string"),
                QueryRule::leaf("pm.name", "equal", &["d"], "string"),
                QueryRule::leaf("pm.number", "equal", &["e"], "string"),
            ],
        );
        let result = revision_sql(rule);
        assert!(result.optimizations.is_empty());
        assert!(result.sql.contains(" OR "));
    }

    #[test]
    fn test_selects_and_order_by() {
        let query = Query {
            selects: vec!["pm.name".to_string(), "attr-TEXT.supplier".to_string()],
            order_by_list: vec!["author.login".to_string()],
            ..Default::default()
        };
        let result = SqlCompiler::new().compile_revision_query(&query, "ws").unwrap();
        assert!(result.sql.contains(r#""pm"."name""#));
        assert!(result.sql.contains(r#"ORDER BY "au"."login" ASC"#));
    }

    #[test]
    fn test_same_errors_as_engines() {
        let query = Query {
            query_rule: Some(QueryRule::leaf("unknown.x", "equal", &["1"], "string")),
            ..Default::default()
        };
        assert!(matches!(
            SqlCompiler::new().compile_revision_query(&query, "ws"),
            Err(QueryError::UnresolvedField { field, .. }) if field == "unknown.x"
        ));
    }

    #[test]
    fn test_path_data_query() {
        let query = Query {
            path_data_query_rule: Some(QueryRule::leaf(
                "pd-attr-TEXT.inspector",
                "equal",
                &["Bob"],
                "string",
            )),
            ..Default::default()
        };
        let instance = ProductInstanceIteration {
            serial_number: "SN-1".to_string(),
            configuration_item: "CAR".to_string(),
            iteration: 1,
            path_data_ids: vec![1, 2],
        };

        let result = SqlCompiler::new()
            .compile_path_data_query(&query, &instance)
            .unwrap()
            .unwrap();
        assert!(result.sql.contains(r#""pd"."id" IN (1, 2)"#));
        assert!(result.sql.contains(r#""s1"."path_data_iteration_id" = "pdi"."id""#));

        let empty = ProductInstanceIteration {
            path_data_ids: Vec::new(),
            ..instance
        };
        assert!(SqlCompiler::new()
            .compile_path_data_query(&query, &empty)
            .unwrap()
            .is_none());
    }
}
