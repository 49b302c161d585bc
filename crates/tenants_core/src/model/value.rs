//! Casting helpers between raw SQLite values and typed fields.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIMESTAMP_FORMAT_T: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub type MapResult<T> = Result<T, MapError>;

/// Hydration failure for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    MissingColumn(&'static str),
    InvalidValue {
        column: &'static str,
        expected: &'static str,
        found: String,
    },
}

impl Display for MapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumn(column) => write!(f, "required column `{column}` is missing"),
            Self::InvalidValue {
                column,
                expected,
                found,
            } => write!(f, "column `{column}` expected {expected}, found {found}"),
        }
    }
}

impl Error for MapError {}

/// Encodes a UTC timestamp in the store's text format.
pub fn timestamp_value(ts: &DateTime<Utc>) -> Value {
    Value::Text(ts.format(TIMESTAMP_FORMAT).to_string())
}

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (UTC) or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Text(text) => {
            let text = text.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
                return Some(ts.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT_T))
                .ok()
                .map(|naive| naive.and_utc())
        }
        Value::Integer(millis) => Utc.timestamp_millis_opt(*millis).single(),
        _ => None,
    }
}

/// Integer view of a value; reals must be integral, text must parse.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(number) => Some(*number),
        Value::Real(number) if number.fract() == 0.0 => Some(*number as i64),
        Value::Text(text) => text.trim().parse().ok(),
        _ => None,
    }
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(number) => Some(*number as f64),
        Value::Real(number) => Some(*number),
        Value::Text(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean view of `0/1`, `true/false` and their text forms.
pub fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Integer(0) => Some(false),
        Value::Integer(1) => Some(true),
        Value::Real(number) if *number == 0.0 => Some(false),
        Value::Real(number) if *number == 1.0 => Some(true),
        Value::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "0" | "false" => Some(false),
            "1" | "true" => Some(true),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => format!("integer {number}"),
        Value::Real(number) => format!("real {number}"),
        Value::Text(text) => format!("text `{text}`"),
        Value::Blob(bytes) => format!("blob ({} bytes)", bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_timestamp, timestamp_value, value_as_bool, value_as_i64};
    use chrono::{TimeZone, Utc};
    use rusqlite::types::Value;

    #[test]
    fn parses_sqlite_current_timestamp_text() {
        let ts = parse_timestamp(&Value::Text("2024-03-01 12:30:05".into())).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap());
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let ts = parse_timestamp(&Value::Text("2024-03-01T14:30:05+02:00".into())).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap());
    }

    #[test]
    fn timestamp_value_roundtrips_whole_seconds() {
        let ts = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let encoded = timestamp_value(&ts);
        assert_eq!(encoded, Value::Text("2023-12-31 23:59:59".into()));
        assert_eq!(parse_timestamp(&encoded), Some(ts));
    }

    #[test]
    fn numeric_and_boolean_views() {
        assert_eq!(value_as_i64(&Value::Text(" 42 ".into())), Some(42));
        assert_eq!(value_as_i64(&Value::Real(2.5)), None);
        assert_eq!(value_as_bool(&Value::Text("TRUE".into())), Some(true));
        assert_eq!(value_as_bool(&Value::Integer(2)), None);
    }
}
