//! Microsoft SQL Server dialect implementation.

use super::{Dialect, DialectFamily, DialectKind, JsonUnnest};

#[derive(Debug, Default, Clone, Copy)]
pub struct MsSqlDialect;

impl Dialect for MsSqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::MsSql
    }

    fn family(&self) -> DialectFamily {
        DialectFamily::MsSql
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn bool_literal(&self, value: bool) -> String {
        if value { "1" } else { "0" }.to_string()
    }

    fn cast_to_text(&self, expr: &str) -> String {
        format!("CAST({expr} AS NVARCHAR(MAX))")
    }

    fn json_array_unnest(&self, json_expr: &str, alias: &str, field: &str) -> Option<JsonUnnest> {
        let alias_q = self.quote_ident(alias);
        let field_q = self.quote_ident(field);
        Some(JsonUnnest {
            from_fragment: format!(
                "CROSS APPLY OPENJSON({json_expr}) WITH ({field_q} FLOAT '$.{}') AS {alias_q}",
                self.escape_string(field)
            ),
            value_expr: format!("{alias_q}.{field_q}"),
        })
    }

    fn json_is_empty_array(&self, expr: &str) -> String {
        // must stay subquery-free: it is nested inside SUM(CASE ...)
        let squeezed = ["' '", "CHAR(9)", "CHAR(10)", "CHAR(13)"]
            .iter()
            .fold(format!("CAST({expr} AS NVARCHAR(MAX))"), |acc, ws| {
                format!("REPLACE({acc}, {ws}, '')")
            });
        format!("(ISJSON({expr}) = 1 AND {squeezed} = '[]')")
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn nulls_sort_low(&self) -> bool {
        true
    }

    fn stddev_pop(&self, expr: &str) -> String {
        format!("STDEVP({expr})")
    }

    fn date_diff_days(&self, start: &str, end: &str) -> String {
        format!("DATEDIFF(day, {start}, {end})")
    }

    fn month_diff(&self, start: &str, end: &str) -> String {
        format!("DATEDIFF(month, {start}, {end})")
    }

    fn supports_aggregate_over_subquery(&self) -> bool {
        false
    }

    fn render_limit_offset(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        has_order_by: bool,
    ) -> String {
        if limit.is_none() && offset.is_none() {
            return String::new();
        }
        // OFFSET/FETCH is only valid after an ORDER BY
        let mut sql = if has_order_by {
            String::new()
        } else {
            " ORDER BY (SELECT NULL)".to_string()
        };
        sql.push_str(&format!(" OFFSET {} ROWS", offset.unwrap_or(0)));
        if let Some(limit) = limit {
            sql.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
        }
        sql
    }
}
