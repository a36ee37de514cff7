//! Per-type rules for what counts as an empty cell.

use serde_json::Value;

use crate::dialect::Dialect;
use crate::models::ColumnType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emptiness {
    /// Only SQL NULL is empty (numbers, dates, system columns).
    NullOnly,
    /// NULL or `0` (ratings).
    NullOrZero,
    /// NULL or `''` (text-like columns).
    NullOrEmptyString,
    /// NULL or a zero-length JSON array.
    NullOrEmptyArray,
}

impl Emptiness {
    pub fn for_type(column_type: ColumnType) -> Self {
        match column_type {
            t if t.is_system() || t.is_date() => Emptiness::NullOnly,
            ColumnType::Rating => Emptiness::NullOrZero,
            ColumnType::Json | ColumnType::Attachment => Emptiness::NullOrEmptyArray,
            t if t.is_text_like() => Emptiness::NullOrEmptyString,
            _ => Emptiness::NullOnly,
        }
    }

    pub fn empty_condition(self, expr: &str, dialect: &dyn Dialect) -> String {
        match self {
            Emptiness::NullOnly => format!("{expr} IS NULL"),
            Emptiness::NullOrZero => format!("({expr} IS NULL OR {expr} = 0)"),
            Emptiness::NullOrEmptyString => format!("({expr} IS NULL OR {expr} = '')"),
            Emptiness::NullOrEmptyArray => format!(
                "({expr} IS NULL OR {})",
                dialect.json_is_empty_array(expr)
            ),
        }
    }

    pub fn filled_condition(self, expr: &str, dialect: &dyn Dialect) -> String {
        match self {
            Emptiness::NullOnly => format!("{expr} IS NOT NULL"),
            Emptiness::NullOrZero => format!("({expr} IS NOT NULL AND {expr} <> 0)"),
            Emptiness::NullOrEmptyString => format!("({expr} IS NOT NULL AND {expr} <> '')"),
            Emptiness::NullOrEmptyArray => format!(
                "({expr} IS NOT NULL AND NOT {})",
                dialect.json_is_empty_array(expr)
            ),
        }
    }

    /// Evaluate the rule against a decoded cell value.
    pub fn is_empty(self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Emptiness::NullOnly => false,
            Emptiness::NullOrZero => value.as_f64() == Some(0.0),
            Emptiness::NullOrEmptyString => value.as_str() == Some(""),
            Emptiness::NullOrEmptyArray => match value {
                Value::Array(items) => items.is_empty(),
                Value::String(text) => matches!(
                    serde_json::from_str::<Value>(text),
                    Ok(Value::Array(items)) if items.is_empty()
                ),
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dialect::PostgresDialect;

    #[test]
    fn rating_zero_is_empty() {
        let rule = Emptiness::for_type(ColumnType::Rating);
        assert!(rule.is_empty(&json!(0)));
        assert!(rule.is_empty(&Value::Null));
        assert!(!rule.is_empty(&json!(3)));
    }

    #[test]
    fn json_empty_array_is_empty() {
        let rule = Emptiness::for_type(ColumnType::Json);
        assert!(rule.is_empty(&json!([])));
        assert!(rule.is_empty(&json!("[]")));
        assert!(!rule.is_empty(&json!([1])));
    }

    #[test]
    fn dates_are_only_empty_when_null() {
        let rule = Emptiness::for_type(ColumnType::Date);
        assert!(rule.is_empty(&Value::Null));
        assert!(!rule.is_empty(&json!("0000-00-00")));
        assert!(!rule.is_empty(&json!("1970-01-01")));
        assert!(!rule.is_empty(&json!(0)));
    }

    #[test]
    fn text_like_treats_empty_string_as_empty() {
        for t in [ColumnType::SingleLineText, ColumnType::Email, ColumnType::MultiSelect] {
            let rule = Emptiness::for_type(t);
            assert_eq!(rule, Emptiness::NullOrEmptyString);
            assert!(rule.is_empty(&json!("")));
            assert!(!rule.is_empty(&json!(" ")));
        }
    }

    #[test]
    fn numbers_and_system_columns_are_null_only() {
        for t in [
            ColumnType::Number,
            ColumnType::Id,
            ColumnType::ForeignKey,
            ColumnType::CreatedTime,
            ColumnType::DateTime,
        ] {
            assert_eq!(Emptiness::for_type(t), Emptiness::NullOnly);
        }
        assert!(!Emptiness::for_type(ColumnType::Number).is_empty(&json!(0)));
    }

    #[test]
    fn conditions_render_against_dialect() {
        let d = PostgresDialect;
        assert_eq!(
            Emptiness::NullOrZero.filled_condition("x", &d),
            "(x IS NOT NULL AND x <> 0)"
        );
        assert_eq!(
            Emptiness::NullOrEmptyArray.empty_condition("x", &d),
            "(x IS NULL OR CAST(x AS jsonb) = CAST('[]' AS jsonb))"
        );
    }
}
