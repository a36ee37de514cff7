//! SQL dialect abstractions for the supported engines.
//!
//! Sort and aggregation compilation never branch on the engine directly; every
//! engine-specific fragment comes from a [`Dialect`] method. Each engine lives
//! in its own file.

use serde::{Deserialize, Serialize};

use crate::models::{AggregateFunction, SortDirection};
use crate::sql_ast::NullsOrder;

mod duckdb;
mod mssql;
mod mysql;
mod postgres;

pub use duckdb::DuckDbDialect;
pub use mssql::MsSqlDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Postgres,
    DuckDb,
    MySql,
    MsSql,
}

/// Coarse discriminator: default/ANSI, MySQL family, MSSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectFamily {
    Default,
    MySql,
    MsSql,
}

/// FROM-clause fragment that unnests a JSON array, plus the per-element value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonUnnest {
    /// Appended after the FROM table, e.g. `CROSS JOIN LATERAL ...`.
    pub from_fragment: String,
    pub value_expr: String,
}

/// Dialects render identifiers and primitive expression pieces.
/// Expression tree walking lives in the renderer and the compilers; the
/// dialect only maps logical constructs to SQL fragments.
pub trait Dialect: Send + Sync {
    fn kind(&self) -> DialectKind;

    fn family(&self) -> DialectFamily {
        DialectFamily::Default
    }

    fn quote_ident(&self, ident: &str) -> String;

    /// Escape the body of a single-quoted string literal.
    fn escape_string(&self, raw: &str) -> String {
        raw.replace('\'', "''")
    }

    fn bool_literal(&self, value: bool) -> String {
        if value { "TRUE" } else { "FALSE" }.to_string()
    }

    fn render_literal(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Null => "NULL".to_string(),
            serde_json::Value::Bool(b) => self.bool_literal(*b),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => format!("'{}'", self.escape_string(s)),
            serde_json::Value::Array(items) => {
                let rendered: Vec<String> = items.iter().map(|v| self.render_literal(v)).collect();
                rendered.join(", ")
            }
            serde_json::Value::Object(_) => {
                format!("'{}'", self.escape_string(&value.to_string()))
            }
        }
    }

    /// Cast an expression to a text type that sorts lexicographically.
    fn cast_to_text(&self, expr: &str) -> String;

    /// Unnest a JSON array column aliased as `alias`, extracting numeric `field`.
    fn json_array_unnest(&self, json_expr: &str, alias: &str, field: &str) -> Option<JsonUnnest>;

    /// Condition that holds when `expr` is a zero-length JSON array.
    fn json_is_empty_array(&self, expr: &str) -> String;

    /// Whether `NULLS FIRST` / `NULLS LAST` is accepted.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    /// Whether NULL sorts below every value under native ordering.
    fn nulls_sort_low(&self) -> bool {
        false
    }

    fn render_ordering(
        &self,
        expr: &str,
        direction: SortDirection,
        nulls: Option<NullsOrder>,
    ) -> String {
        let dir = match direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        let Some(nulls) = nulls else {
            return format!("{expr} {dir}");
        };
        if self.supports_nulls_ordering() {
            return format!("{expr} {dir} {}", nulls.keyword());
        }
        let native_first = match direction {
            SortDirection::Asc => self.nulls_sort_low(),
            SortDirection::Desc => !self.nulls_sort_low(),
        };
        let wants_first = nulls == NullsOrder::First;
        if native_first == wants_first {
            format!("{expr} {dir}")
        } else {
            let key = if wants_first { "0 ELSE 1" } else { "1 ELSE 0" };
            format!("CASE WHEN {expr} IS NULL THEN {key} END, {expr} {dir}")
        }
    }

    /// Number of rows for which `condition` holds.
    fn count_where(&self, condition: &str) -> String {
        format!("SUM(CASE WHEN {condition} THEN 1 ELSE 0 END)")
    }

    fn stddev_pop(&self, expr: &str) -> String {
        format!("STDDEV_POP({expr})")
    }

    /// Native median aggregate, when the engine has one.
    fn native_median(&self, _expr: &str) -> Option<String> {
        None
    }

    /// Whole days from `start` to `end`.
    fn date_diff_days(&self, start: &str, end: &str) -> String;

    /// Whole months from `start` to `end`.
    fn month_diff(&self, start: &str, end: &str) -> String;

    /// Whether an aggregate function may take a subquery as its argument.
    fn supports_aggregate_over_subquery(&self) -> bool {
        true
    }

    /// Trailing limit/offset clause, including its leading space.
    fn render_limit_offset(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        _has_order_by: bool,
    ) -> String {
        let mut sql = String::new();
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    fn render_aggregation(&self, agg: AggregateFunction, expr: &str) -> String {
        match agg {
            AggregateFunction::Count => format!("COUNT({expr})"),
            AggregateFunction::Min => format!("MIN({expr})"),
            AggregateFunction::Max => format!("MAX({expr})"),
            AggregateFunction::Avg => format!("AVG({expr})"),
            AggregateFunction::Sum => format!("SUM({expr})"),
            AggregateFunction::CountDistinct => format!("COUNT(DISTINCT {expr})"),
            AggregateFunction::SumDistinct => format!("SUM(DISTINCT {expr})"),
            AggregateFunction::AvgDistinct => format!("AVG(DISTINCT {expr})"),
        }
    }
}

pub fn dialect_for(kind: DialectKind) -> Box<dyn Dialect> {
    match kind {
        DialectKind::Postgres => Box::new(PostgresDialect),
        DialectKind::DuckDb => Box::new(DuckDbDialect),
        DialectKind::MySql => Box::new(MySqlDialect),
        DialectKind::MsSql => Box::new(MsSqlDialect),
    }
}
