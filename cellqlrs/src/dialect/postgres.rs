//! PostgreSQL dialect implementation.

use super::{Dialect, DialectKind, JsonUnnest};

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn cast_to_text(&self, expr: &str) -> String {
        format!("CAST({expr} AS TEXT)")
    }

    fn json_array_unnest(&self, json_expr: &str, alias: &str, field: &str) -> Option<JsonUnnest> {
        let alias_q = self.quote_ident(alias);
        Some(JsonUnnest {
            from_fragment: format!(
                "CROSS JOIN LATERAL jsonb_array_elements(CAST({json_expr} AS jsonb)) AS {alias_q}(elem)"
            ),
            value_expr: format!(
                "CAST({alias_q}.elem->>'{}' AS NUMERIC)",
                self.escape_string(field)
            ),
        })
    }

    fn json_is_empty_array(&self, expr: &str) -> String {
        format!("CAST({expr} AS jsonb) = CAST('[]' AS jsonb)")
    }

    fn count_where(&self, condition: &str) -> String {
        // 9.4+
        format!("COUNT(*) FILTER (WHERE {condition})")
    }

    fn native_median(&self, expr: &str) -> Option<String> {
        Some(format!("PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY {expr})"))
    }

    fn date_diff_days(&self, start: &str, end: &str) -> String {
        format!("(CAST({end} AS DATE) - CAST({start} AS DATE))")
    }

    fn month_diff(&self, start: &str, end: &str) -> String {
        format!(
            "(EXTRACT(YEAR FROM AGE({end}, {start})) * 12 + EXTRACT(MONTH FROM AGE({end}, {start})))"
        )
    }
}
