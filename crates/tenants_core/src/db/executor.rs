//! Statement execution contract and its `rusqlite` implementation.
//!
//! # Responsibility
//! - Execute parameterized SQL and return affected counts or raw rows.
//! - Bind named parameters (`:name`) from an ordered parameter list.
//!
//! # Invariants
//! - Raw rows are column-name keyed maps; key order is deterministic.
//! - Parameter names are stored without the `:` prefix and are unique.

use super::{DbResult, Dialect};
use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};
use std::collections::BTreeMap;

/// One raw row: column name -> stored value.
pub type RawRow = BTreeMap<String, Value>;

/// Ordered list of named statement parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlParams {
    entries: Vec<(String, Value)>,
}

impl SqlParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the parameter bound to `:name`.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = value;
            return;
        }
        self.entries.push((name, value));
    }

    /// Appends every parameter from `other`, replacing same-named entries.
    pub fn extend(&mut self, other: SqlParams) {
        for (name, value) in other.entries {
            self.push(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    fn placeholders(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(name, _)| format!(":{name}"))
            .collect()
    }
}

impl<N: Into<String>> FromIterator<(N, Value)> for SqlParams {
    fn from_iter<I: IntoIterator<Item = (N, Value)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.push(name, value);
        }
        params
    }
}

/// Statement execution contract consumed by repositories.
///
/// Implementations own connection management, cancellation and timeouts;
/// callers issue one statement per call.
pub trait Executor {
    /// Executes a write statement and returns the affected row count.
    fn execute(&self, sql: &str, params: &SqlParams) -> DbResult<usize>;
    /// Returns the first row, if any.
    fn fetch(&self, sql: &str, params: &SqlParams) -> DbResult<Option<RawRow>>;
    /// Returns every row.
    fn fetch_all(&self, sql: &str, params: &SqlParams) -> DbResult<Vec<RawRow>>;
    /// Returns the first column of the first row, if any.
    fn fetch_one(&self, sql: &str, params: &SqlParams) -> DbResult<Option<Value>>;
    /// SQL dialect spoken by the underlying store.
    fn dialect(&self) -> Dialect;
}

impl Executor for Connection {
    fn execute(&self, sql: &str, params: &SqlParams) -> DbResult<usize> {
        let names = params.placeholders();
        let bound = bind(&names, params);
        let mut stmt = self.prepare(sql)?;
        Ok(stmt.execute(bound.as_slice())?)
    }

    fn fetch(&self, sql: &str, params: &SqlParams) -> DbResult<Option<RawRow>> {
        Ok(query_rows(self, sql, params, Some(1))?.into_iter().next())
    }

    fn fetch_all(&self, sql: &str, params: &SqlParams) -> DbResult<Vec<RawRow>> {
        query_rows(self, sql, params, None)
    }

    fn fetch_one(&self, sql: &str, params: &SqlParams) -> DbResult<Option<Value>> {
        let names = params.placeholders();
        let bound = bind(&names, params);
        let mut stmt = self.prepare(sql)?;
        let mut rows = stmt.query(bound.as_slice())?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get::<_, Value>(0)?)),
            None => Ok(None),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

fn bind<'a>(names: &'a [String], params: &'a SqlParams) -> Vec<(&'a str, &'a dyn ToSql)> {
    names
        .iter()
        .zip(params.entries.iter())
        .map(|(name, (_, value))| (name.as_str(), value as &dyn ToSql))
        .collect()
}

fn query_rows(
    conn: &Connection,
    sql: &str,
    params: &SqlParams,
    max_rows: Option<usize>,
) -> DbResult<Vec<RawRow>> {
    let names = params.placeholders();
    let bound = bind(&names, params);
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = stmt.query(bound.as_slice())?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut raw = RawRow::new();
        for (index, column) in columns.iter().enumerate() {
            raw.insert(column.clone(), row.get::<_, Value>(index)?);
        }
        out.push(raw);
        if max_rows.is_some_and(|max| out.len() >= max) {
            break;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{Executor, SqlParams};
    use rusqlite::types::Value;
    use rusqlite::Connection;

    #[test]
    fn push_replaces_existing_parameter() {
        let mut params = SqlParams::new();
        params.push("a", Value::Integer(1));
        params.push("a", Value::Integer(2));
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("a"), Some(&Value::Integer(2)));
    }

    #[test]
    fn executes_named_parameters_and_reads_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();

        let params: SqlParams = [
            ("id", Value::Integer(7)),
            ("name", Value::Text("seven".to_string())),
        ]
        .into_iter()
        .collect();
        let affected =
            Executor::execute(&conn, "INSERT INTO t (id, name) VALUES (:id, :name)", &params)
                .unwrap();
        assert_eq!(affected, 1);

        let row = Executor::fetch(&conn, "SELECT * FROM t", &SqlParams::new())
            .unwrap()
            .unwrap();
        assert_eq!(row.get("id"), Some(&Value::Integer(7)));
        assert_eq!(row.get("name"), Some(&Value::Text("seven".to_string())));

        let count = conn
            .fetch_one("SELECT COUNT(*) FROM t", &SqlParams::new())
            .unwrap();
        assert_eq!(count, Some(Value::Integer(1)));
    }

    #[test]
    fn fetch_returns_none_for_empty_result() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER);").unwrap();
        let row = Executor::fetch(&conn, "SELECT * FROM t", &SqlParams::new()).unwrap();
        assert!(row.is_none());
    }
}
