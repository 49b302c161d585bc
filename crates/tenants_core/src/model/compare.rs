//! Per-column value comparison used when computing row diffs.
//!
//! Each column kind maps to one explicit strategy. Numeric, boolean and
//! temporal columns compare by meaning (`"1"` equals `1`, `1.0` equals `1`,
//! `true` equals `1`, equal instants in different encodings are equal).
//! Text columns compare exactly and JSON columns compare structurally.

use super::value::{parse_timestamp, value_as_bool, value_as_f64, value_as_i64};
use crate::db::RawRow;
use crate::schema::{ColumnKind, TableDefinition};
use rusqlite::types::Value;

/// Comparison rule selected for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareStrategy {
    /// Exact 64-bit integers; reals only when one side is fractional.
    Integer,
    Numeric,
    Boolean,
    Temporal,
    Exact,
    Structured,
}

impl From<ColumnKind> for CompareStrategy {
    fn from(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Int => Self::Integer,
            ColumnKind::Float => Self::Numeric,
            ColumnKind::Bool => Self::Boolean,
            ColumnKind::Timestamp => Self::Temporal,
            ColumnKind::Text => Self::Exact,
            ColumnKind::Json => Self::Structured,
        }
    }
}

impl CompareStrategy {
    /// Whether `left` and `right` hold the same value under this strategy.
    ///
    /// `NULL` only equals `NULL`. Values the strategy cannot interpret fall
    /// back to exact comparison.
    pub fn equals(self, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Null, Value::Null) => return true,
            (Value::Null, _) | (_, Value::Null) => return false,
            _ => {}
        }
        let interpreted = match self {
            Self::Integer => {
                both(left, right, value_as_i64).or_else(|| both(left, right, value_as_f64))
            }
            Self::Numeric => both(left, right, value_as_f64),
            Self::Boolean => both(left, right, value_as_bool),
            Self::Temporal => both(left, right, parse_timestamp),
            Self::Structured => both(left, right, json_value),
            Self::Exact => None,
        };
        interpreted.unwrap_or_else(|| left == right)
    }
}

fn both<T: PartialEq>(left: &Value, right: &Value, view: impl Fn(&Value) -> Option<T>) -> Option<bool> {
    Some(view(left)? == view(right)?)
}

fn json_value(value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::Text(text) => serde_json::from_str(text).ok(),
        Value::Blob(bytes) => serde_json::from_slice(bytes).ok(),
        Value::Integer(number) => Some(serde_json::Value::from(*number)),
        Value::Real(number) => Some(serde_json::Value::from(*number)),
        Value::Null => Some(serde_json::Value::Null),
    }
}

/// Compares two values of a column of `kind`.
pub fn values_equal(kind: ColumnKind, left: &Value, right: &Value) -> bool {
    CompareStrategy::from(kind).equals(left, right)
}

/// Columns of `current` whose value differs from `original`.
///
/// Columns listed in `ignore` are skipped. Columns unknown to `def` compare
/// exactly. A column absent from `original` counts as changed.
pub fn diff_rows(def: &TableDefinition, current: &RawRow, original: &RawRow, ignore: &[&str]) -> RawRow {
    let mut changed = RawRow::new();
    for (column, value) in current {
        if ignore.contains(&column.as_str()) {
            continue;
        }
        let strategy = def
            .column_kind(column)
            .map(CompareStrategy::from)
            .unwrap_or(CompareStrategy::Exact);
        let same = original
            .get(column)
            .is_some_and(|before| strategy.equals(value, before));
        if !same {
            changed.insert(column.clone(), value.clone());
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::{diff_rows, values_equal, CompareStrategy};
    use crate::db::RawRow;
    use crate::schema::{tenants, ColumnKind};
    use rusqlite::types::Value;

    fn text(value: &str) -> Value {
        Value::Text(value.to_string())
    }

    #[test]
    fn numeric_strategy_ignores_encoding() {
        assert!(values_equal(ColumnKind::Int, &text("1"), &Value::Integer(1)));
        assert!(values_equal(ColumnKind::Float, &Value::Real(1.0), &Value::Integer(1)));
        assert!(!values_equal(ColumnKind::Int, &Value::Integer(2), &Value::Integer(1)));
    }

    #[test]
    fn integer_strategy_keeps_precision_past_f64_mantissa() {
        let above = Value::Integer(9_007_199_254_740_993);
        let below = Value::Integer(9_007_199_254_740_992);
        assert!(!values_equal(ColumnKind::Int, &above, &below));
        assert!(values_equal(ColumnKind::Int, &above, &text("9007199254740993")));
        assert!(!values_equal(ColumnKind::Int, &Value::Real(1.5), &Value::Integer(1)));
    }

    #[test]
    fn diff_keeps_large_integer_changes() {
        let def = tenants::definition();
        let original: RawRow = [("version".to_string(), Value::Integer(9_007_199_254_740_992))]
            .into_iter()
            .collect();
        let current: RawRow = [("version".to_string(), Value::Integer(9_007_199_254_740_993))]
            .into_iter()
            .collect();

        let changed = diff_rows(&def, &current, &original, &[]);
        assert_eq!(changed.get("version"), Some(&Value::Integer(9_007_199_254_740_993)));
    }

    #[test]
    fn boolean_strategy_accepts_text_and_integers() {
        assert!(values_equal(ColumnKind::Bool, &text("true"), &Value::Integer(1)));
        assert!(!values_equal(ColumnKind::Bool, &Value::Integer(0), &Value::Integer(1)));
    }

    #[test]
    fn temporal_strategy_compares_instants() {
        assert!(values_equal(
            ColumnKind::Timestamp,
            &text("2024-05-01 10:00:00"),
            &text("2024-05-01T12:00:00+02:00"),
        ));
    }

    #[test]
    fn exact_strategy_never_coerces() {
        assert!(!values_equal(ColumnKind::Text, &text("1"), &Value::Integer(1)));
        assert!(!values_equal(ColumnKind::Text, &text("Acme"), &text("acme")));
    }

    #[test]
    fn structured_strategy_is_key_order_insensitive() {
        assert!(CompareStrategy::Structured.equals(
            &text(r#"{"a":1,"b":[1,2]}"#),
            &text(r#"{ "b": [1, 2], "a": 1 }"#),
        ));
    }

    #[test]
    fn null_only_equals_null() {
        assert!(values_equal(ColumnKind::Int, &Value::Null, &Value::Null));
        assert!(!values_equal(ColumnKind::Int, &Value::Null, &Value::Integer(0)));
    }

    #[test]
    fn diff_rows_reports_changed_and_missing_columns() {
        let def = tenants::definition();
        let original: RawRow = [
            ("version".to_string(), text("3")),
            ("name".to_string(), text("Acme")),
        ]
        .into_iter()
        .collect();
        let current: RawRow = [
            ("version".to_string(), Value::Integer(3)),
            ("name".to_string(), text("Acme Corp")),
            ("status".to_string(), text("active")),
            ("updated_at".to_string(), text("2024-01-01 00:00:00")),
        ]
        .into_iter()
        .collect();

        let changed = diff_rows(&def, &current, &original, &["updated_at"]);
        assert_eq!(changed.len(), 2);
        assert_eq!(changed.get("name"), Some(&text("Acme Corp")));
        assert_eq!(changed.get("status"), Some(&text("active")));
    }
}
