//! DuckDB dialect implementation.

use super::{Dialect, DialectKind, JsonUnnest};

#[derive(Debug, Default, Clone, Copy)]
pub struct DuckDbDialect;

impl Dialect for DuckDbDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::DuckDb
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn cast_to_text(&self, expr: &str) -> String {
        format!("CAST({expr} AS VARCHAR)")
    }

    fn json_array_unnest(&self, json_expr: &str, alias: &str, field: &str) -> Option<JsonUnnest> {
        let alias_q = self.quote_ident(alias);
        Some(JsonUnnest {
            from_fragment: format!(
                "CROSS JOIN LATERAL (SELECT unnest(json_extract(CAST({json_expr} AS JSON), '$[*]')) AS elem) AS {alias_q}"
            ),
            value_expr: format!(
                "CAST(json_extract_string({alias_q}.elem, '$.{}') AS DOUBLE)",
                self.escape_string(field)
            ),
        })
    }

    fn json_is_empty_array(&self, expr: &str) -> String {
        // json_array_length is 0 for objects and scalars too
        format!(
            "(json_type(CAST({expr} AS JSON)) = 'ARRAY' AND json_array_length(CAST({expr} AS JSON)) = 0)"
        )
    }

    fn count_where(&self, condition: &str) -> String {
        format!("COUNT(*) FILTER (WHERE {condition})")
    }

    fn native_median(&self, expr: &str) -> Option<String> {
        Some(format!("MEDIAN({expr})"))
    }

    fn date_diff_days(&self, start: &str, end: &str) -> String {
        format!("date_diff('day', {start}, {end})")
    }

    fn month_diff(&self, start: &str, end: &str) -> String {
        format!("date_diff('month', {start}, {end})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_to_varchar() {
        assert_eq!(DuckDbDialect.cast_to_text("x"), "CAST(x AS VARCHAR)");
    }

    #[test]
    fn date_differences_use_date_diff() {
        let d = DuckDbDialect;
        assert_eq!(d.date_diff_days("a", "b"), "date_diff('day', a, b)");
        assert_eq!(d.month_diff("a", "b"), "date_diff('month', a, b)");
    }

    #[test]
    fn empty_json_array_requires_array_type() {
        assert_eq!(
            DuckDbDialect.json_is_empty_array("x"),
            "(json_type(CAST(x AS JSON)) = 'ARRAY' AND json_array_length(CAST(x AS JSON)) = 0)"
        );
    }
}
