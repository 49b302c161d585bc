//! Tenant typed record and its raw-row mapping.
//!
//! # Responsibility
//! - Hydrate `TenantRecord` from raw rows produced by repository reads.
//! - Serialize records back to raw rows and compute minimal update diffs.
//!
//! # Invariants
//! - Records are only built by hydration; fields are read through accessors.
//! - Nullable columns absent from a row hydrate as `None`; absent required
//!   columns are a `MapError::MissingColumn`.

use super::compare::diff_rows;
use super::value::{describe, parse_timestamp, timestamp_value, value_as_bool, value_as_i64};
use super::{Hydrate, MapError, MapResult};
use crate::db::RawRow;
use crate::schema::tenants;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::Serialize;

/// Immutable tenant projection.
///
/// Serialized to JSON with RFC 3339 timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantRecord {
    id: i64,
    name: String,
    slug: String,
    slug_ci: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
    deleted_at: Option<DateTime<Utc>>,
    is_live: Option<bool>,
}

impl TenantRecord {
    /// Hydrates a record from one raw row.
    pub fn from_row(row: &RawRow) -> MapResult<Self> {
        Ok(Self {
            id: required(row, "id", "integer", value_as_i64)?,
            name: required(row, "name", "text", text)?,
            slug: required(row, "slug", "text", text)?,
            slug_ci: optional(row, "slug_ci", "text", text)?,
            status: required(row, "status", "text", text)?,
            created_at: required(row, "created_at", "timestamp", parse_timestamp)?,
            updated_at: required(row, "updated_at", "timestamp", parse_timestamp)?,
            version: required(row, "version", "integer", value_as_i64)?,
            deleted_at: optional(row, "deleted_at", "timestamp", parse_timestamp)?,
            is_live: optional(row, "is_live", "boolean", value_as_bool)?,
        })
    }

    /// `None` passes through; a present row must hydrate.
    pub fn from_row_opt(row: Option<&RawRow>) -> MapResult<Option<Self>> {
        row.map(Self::from_row).transpose()
    }

    pub fn hydrate_list(rows: &[RawRow]) -> MapResult<Vec<Self>> {
        rows.iter().map(Self::from_row).collect()
    }

    /// Every column, `NULL` included.
    pub fn to_row(&self) -> RawRow {
        let mut row = RawRow::new();
        row.insert("id".to_string(), Value::Integer(self.id));
        row.insert("name".to_string(), Value::Text(self.name.clone()));
        row.insert("slug".to_string(), Value::Text(self.slug.clone()));
        row.insert(
            "slug_ci".to_string(),
            self.slug_ci.clone().map_or(Value::Null, Value::Text),
        );
        row.insert("status".to_string(), Value::Text(self.status.clone()));
        row.insert("created_at".to_string(), timestamp_value(&self.created_at));
        row.insert("updated_at".to_string(), timestamp_value(&self.updated_at));
        row.insert("version".to_string(), Value::Integer(self.version));
        row.insert(
            "deleted_at".to_string(),
            self.deleted_at.as_ref().map_or(Value::Null, timestamp_value),
        );
        row.insert(
            "is_live".to_string(),
            self.is_live
                .map_or(Value::Null, |live| Value::Integer(i64::from(live))),
        );
        row
    }

    /// Only columns holding a value.
    pub fn to_row_non_null(&self) -> RawRow {
        self.to_row()
            .into_iter()
            .filter(|(_, value)| *value != Value::Null)
            .collect()
    }

    /// Columns whose value differs from `original`, skipping `ignore`.
    ///
    /// The result is a minimal `update_by_id` payload.
    pub fn diff(&self, original: &RawRow, ignore: &[&str]) -> RawRow {
        diff_rows(tenants::shared(), &self.to_row(), original, ignore)
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn slug_ci(&self) -> Option<&str> {
        self.slug_ci.as_deref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_live(&self) -> Option<bool> {
        self.is_live
    }

    /// Whether the soft-delete marker is unset.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

impl Hydrate for TenantRecord {
    fn hydrate(row: &RawRow) -> MapResult<Self> {
        Self::from_row(row)
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Text(text) => Some(text.clone()),
        Value::Integer(number) => Some(number.to_string()),
        Value::Real(number) => Some(number.to_string()),
        _ => None,
    }
}

fn required<T>(
    row: &RawRow,
    column: &'static str,
    expected: &'static str,
    cast: impl Fn(&Value) -> Option<T>,
) -> MapResult<T> {
    optional(row, column, expected, cast)?.ok_or(MapError::MissingColumn(column))
}

fn optional<T>(
    row: &RawRow,
    column: &'static str,
    expected: &'static str,
    cast: impl Fn(&Value) -> Option<T>,
) -> MapResult<Option<T>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => cast(value).map(Some).ok_or_else(|| MapError::InvalidValue {
            column,
            expected,
            found: describe(value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::TenantRecord;
    use crate::db::RawRow;
    use crate::model::MapError;
    use chrono::{TimeZone, Utc};
    use rusqlite::types::Value;

    fn raw() -> RawRow {
        [
            ("id", Value::Integer(4)),
            ("name", Value::Text("Acme".into())),
            ("slug", Value::Text("acme".into())),
            ("slug_ci", Value::Text("acme".into())),
            ("status", Value::Text("active".into())),
            ("created_at", Value::Text("2024-02-01 08:00:00".into())),
            ("updated_at", Value::Text("2024-02-02 09:30:00".into())),
            ("version", Value::Integer(3)),
            ("deleted_at", Value::Null),
            ("is_live", Value::Integer(1)),
        ]
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
    }

    #[test]
    fn hydrates_typed_fields() {
        let record = TenantRecord::from_row(&raw()).unwrap();
        assert_eq!(record.id(), 4);
        assert_eq!(record.slug_ci(), Some("acme"));
        assert_eq!(record.version(), 3);
        assert_eq!(record.is_live(), Some(true));
        assert!(record.is_active());
        assert_eq!(
            record.updated_at(),
            Utc.with_ymd_and_hms(2024, 2, 2, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn missing_nullable_columns_hydrate_as_none() {
        let mut row = raw();
        row.remove("slug_ci");
        row.remove("is_live");
        row.remove("deleted_at");
        let record = TenantRecord::from_row(&row).unwrap();
        assert_eq!(record.slug_ci(), None);
        assert_eq!(record.is_live(), None);
    }

    #[test]
    fn missing_required_column_is_reported() {
        let mut row = raw();
        row.remove("name");
        assert_eq!(
            TenantRecord::from_row(&row).unwrap_err(),
            MapError::MissingColumn("name")
        );
    }

    #[test]
    fn invalid_value_names_column() {
        let mut row = raw();
        row.insert("version".into(), Value::Text("three".into()));
        let err = TenantRecord::from_row(&row).unwrap_err();
        assert!(matches!(err, MapError::InvalidValue { column: "version", .. }));
    }

    #[test]
    fn to_row_roundtrips_and_non_null_drops_nulls() {
        let record = TenantRecord::from_row(&raw()).unwrap();
        assert_eq!(record.to_row(), raw());
        assert!(!record.to_row_non_null().contains_key("deleted_at"));
    }

    #[test]
    fn diff_is_empty_against_equivalent_encodings() {
        let record = TenantRecord::from_row(&raw()).unwrap();
        let mut stored = raw();
        stored.insert("version".into(), Value::Text("3".into()));
        stored.insert("is_live".into(), Value::Text("true".into()));
        stored.insert("created_at".into(), Value::Text("2024-02-01T08:00:00Z".into()));
        assert!(record.diff(&stored, &[]).is_empty());
    }

    #[test]
    fn diff_reports_changed_columns_only() {
        let record = TenantRecord::from_row(&raw()).unwrap();
        let mut previous = raw();
        previous.insert("name".into(), Value::Text("Old".into()));
        previous.insert("updated_at".into(), Value::Text("2020-01-01 00:00:00".into()));
        let changed = record.diff(&previous, &["updated_at"]);
        assert_eq!(changed.keys().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn serializes_timestamps_as_rfc3339() {
        let record = TenantRecord::from_row(&raw()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["created_at"], "2024-02-01T08:00:00Z");
        assert_eq!(json["deleted_at"], serde_json::Value::Null);
    }
}
