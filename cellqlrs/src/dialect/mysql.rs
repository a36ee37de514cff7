//! MySQL dialect implementation (also covers MariaDB).

use super::{Dialect, DialectFamily, DialectKind, JsonUnnest};

/// Largest row count MySQL accepts; used when only an offset is requested.
const MAX_ROWS: u64 = 18_446_744_073_709_551_615;

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn family(&self) -> DialectFamily {
        DialectFamily::MySql
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn escape_string(&self, raw: &str) -> String {
        raw.replace('\\', "\\\\").replace('\'', "''")
    }

    fn cast_to_text(&self, expr: &str) -> String {
        format!("CAST({expr} AS CHAR)")
    }

    fn json_array_unnest(&self, json_expr: &str, alias: &str, field: &str) -> Option<JsonUnnest> {
        let alias_q = self.quote_ident(alias);
        let field_q = self.quote_ident(field);
        Some(JsonUnnest {
            from_fragment: format!(
                "CROSS JOIN JSON_TABLE({json_expr}, '$[*]' COLUMNS ({field_q} DOUBLE PATH '$.{}')) AS {alias_q}",
                self.escape_string(field)
            ),
            value_expr: format!("{alias_q}.{field_q}"),
        })
    }

    fn json_is_empty_array(&self, expr: &str) -> String {
        format!("(JSON_TYPE({expr}) = 'ARRAY' AND JSON_LENGTH({expr}) = 0)")
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn nulls_sort_low(&self) -> bool {
        true
    }

    fn date_diff_days(&self, start: &str, end: &str) -> String {
        format!("DATEDIFF({end}, {start})")
    }

    fn month_diff(&self, start: &str, end: &str) -> String {
        format!("TIMESTAMPDIFF(MONTH, {start}, {end})")
    }

    fn render_limit_offset(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        _has_order_by: bool,
    ) -> String {
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (limit, Some(offset)) => {
                format!(" LIMIT {} OFFSET {offset}", limit.unwrap_or(MAX_ROWS))
            }
        }
    }
}
