//! Input normalization and key predicates shared by every repository path.

use super::{RepoError, RepoResult};
use crate::db::{quote_ident, Dialect, RawRow, SqlParams};
use crate::query::Visibility;
use crate::schema::TableDefinition;
use rusqlite::types::Value;

/// Record identity: a scalar for single-column keys, a column map for
/// composite keys.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordId {
    Single(Value),
    Composite(RawRow),
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Single(Value::Integer(value))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Single(Value::Text(value.to_string()))
    }
}

impl From<Value> for RecordId {
    fn from(value: Value) -> Self {
        Self::Single(value)
    }
}

impl From<RawRow> for RecordId {
    fn from(value: RawRow) -> Self {
        Self::Composite(value)
    }
}

/// Conflict target for `upsert_by_keys`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictKeys {
    /// Key column names; values come from the row.
    Columns(Vec<String>),
    /// Key columns with values; missing row entries are back-filled.
    Values(RawRow),
}

impl ConflictKeys {
    pub fn columns(names: &[&str]) -> Self {
        Self::Columns(names.iter().map(|name| name.to_string()).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Columns(columns) => columns.is_empty(),
            Self::Values(values) => values.is_empty(),
        }
    }
}

/// Converts `camelCase` keys to `snake_case`; snake keys pass unchanged.
pub fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (index, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Snake-cases keys and drops columns that are unknown or generated.
pub fn normalize_row(def: &TableDefinition, row: RawRow) -> RawRow {
    row.into_iter()
        .map(|(key, value)| (snake_case(&key), value))
        .filter(|(key, _)| def.is_writable(key))
        .collect()
}

/// Resolves an id into a `pk column -> value` map.
pub(crate) fn pk_map(def: &TableDefinition, id: &RecordId) -> RepoResult<RawRow> {
    let pk = def.pk();
    match id {
        RecordId::Single(value) => match pk {
            [column] => Ok(RawRow::from([(column.clone(), value.clone())])),
            _ => Err(RepoError::InvalidInput(format!(
                "table `{}` has a composite primary key ({}); pass a column map",
                def.table(),
                pk.join(", ")
            ))),
        },
        RecordId::Composite(map) => {
            let mut out = RawRow::new();
            for column in pk {
                let value = map
                    .get(column)
                    .or_else(|| map.iter().find(|(key, _)| snake_case(key) == *column).map(|(_, v)| v))
                    .ok_or_else(|| {
                        RepoError::InvalidInput(format!("id is missing key column `{column}`"))
                    })?;
                out.insert(column.clone(), value.clone());
            }
            Ok(out)
        }
    }
}

/// Quotes `column`, qualified with `alias` when given.
pub(crate) fn column_sql(dialect: Dialect, alias: Option<&str>, column: &str) -> RepoResult<String> {
    match alias {
        Some(alias) => quote_ident(dialect, &format!("{alias}.{column}")),
        None => quote_ident(dialect, column),
    }
}

/// AND-combined key predicate; binds `:{prefix}{column}` into `params`.
///
/// `NULL` key values compile to `IS NULL` and bind nothing.
pub(crate) fn pk_where(
    dialect: Dialect,
    alias: Option<&str>,
    id_map: &RawRow,
    params: &mut SqlParams,
    prefix: &str,
) -> RepoResult<String> {
    let mut parts = Vec::with_capacity(id_map.len());
    for (column, value) in id_map {
        let column_sql = column_sql(dialect, alias, column)?;
        if *value == Value::Null {
            parts.push(format!("{column_sql} IS NULL"));
        } else {
            let name = format!("{prefix}{column}");
            parts.push(format!("{column_sql} = :{name}"));
            params.push(name, value.clone());
        }
    }
    Ok(parts.join(" AND "))
}

/// Soft-delete predicate for a visibility; `1=1` without a soft column.
pub(crate) fn soft_guard(
    def: &TableDefinition,
    dialect: Dialect,
    alias: Option<&str>,
    visibility: Visibility,
) -> RepoResult<String> {
    let Some(soft) = def.soft_delete_column() else {
        return Ok("1=1".to_string());
    };
    let column = column_sql(dialect, alias, soft)?;
    Ok(match visibility {
        Visibility::Active => format!("{column} IS NULL"),
        Visibility::OnlyTrashed => format!("{column} IS NOT NULL"),
        Visibility::WithTrashed => "1=1".to_string(),
    })
}
