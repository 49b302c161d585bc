//! Single-row upsert statement builder.
//!
//! SQLite/PostgreSQL compile to `INSERT .. ON CONFLICT (keys) DO UPDATE SET`,
//! MySQL/MariaDB to `INSERT .. ON DUPLICATE KEY UPDATE`. An empty update set
//! compiles to a conflict no-op.

use super::keys::column_sql;
use super::{RepoError, RepoResult};
use crate::db::{quote_ident, Dialect, RawRow, SqlParams};
use crate::schema::ColumnDef;

#[derive(Debug, Clone, Copy)]
pub struct UpsertBuilder<'a> {
    dialect: Dialect,
    table: &'a str,
    updated_at: Option<&'a str>,
    version: Option<&'a str>,
    columns: &'a [ColumnDef],
}

impl<'a> UpsertBuilder<'a> {
    pub fn new(dialect: Dialect, table: &'a str) -> Self {
        Self {
            dialect,
            table,
            updated_at: None,
            version: None,
            columns: &[],
        }
    }

    /// Column touched with `CURRENT_TIMESTAMP` when a conflict updates the row.
    pub fn updated_at(mut self, column: Option<&'a str>) -> Self {
        self.updated_at = column;
        self
    }

    /// Numeric column bumped by one when a conflict updates the row.
    pub fn version(mut self, column: Option<&'a str>) -> Self {
        self.version = column;
        self
    }

    /// Declared columns. Generated ones never enter the insert list and may
    /// serve as conflict targets without a row value.
    pub fn columns(mut self, columns: &'a [ColumnDef]) -> Self {
        self.columns = columns;
        self
    }

    fn is_generated(&self, column: &str) -> bool {
        self.columns
            .iter()
            .any(|def| def.generated && def.name == column)
    }

    /// Builds the statement for `row` conflicting on `keys`.
    ///
    /// Update columns absent from `row` are ignored. Parameters are named
    /// after their columns.
    pub fn build_row(
        &self,
        row: &RawRow,
        keys: &[String],
        update_columns: &[String],
    ) -> RepoResult<(String, SqlParams)> {
        if row.is_empty() {
            return Err(RepoError::InvalidInput("upsert row is empty".to_string()));
        }
        if keys.is_empty() {
            return Err(RepoError::InvalidInput(
                "upsert needs at least one conflict column".to_string(),
            ));
        }

        let table = quote_ident(self.dialect, self.table)?;
        let mut columns = Vec::with_capacity(row.len());
        let mut placeholders = Vec::with_capacity(row.len());
        let mut params = SqlParams::new();
        for (column, value) in row.iter().filter(|(column, _)| !self.is_generated(column)) {
            columns.push(quote_ident(self.dialect, column)?);
            placeholders.push(format!(":{column}"));
            params.push(column.clone(), value.clone());
        }
        if columns.is_empty() {
            return Err(RepoError::InvalidInput(
                "upsert row has no writable columns".to_string(),
            ));
        }
        let mut sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        let assignments = self.assignments(row, update_columns)?;
        let conflict = match self.dialect {
            Dialect::MySql | Dialect::MariaDb if assignments.is_empty() => {
                // No-op update keeps the existing row untouched.
                let key = quote_ident(self.dialect, &keys[0])?;
                format!(" ON DUPLICATE KEY UPDATE {key} = {key}")
            }
            Dialect::MySql | Dialect::MariaDb => {
                format!(" ON DUPLICATE KEY UPDATE {}", assignments.join(", "))
            }
            Dialect::Sqlite | Dialect::Postgres => {
                let targets = keys
                    .iter()
                    .map(|key| quote_ident(self.dialect, key))
                    .collect::<RepoResult<Vec<_>>>()?;
                if assignments.is_empty() {
                    format!(" ON CONFLICT ({}) DO NOTHING", targets.join(", "))
                } else {
                    format!(
                        " ON CONFLICT ({}) DO UPDATE SET {}",
                        targets.join(", "),
                        assignments.join(", ")
                    )
                }
            }
        };
        sql.push_str(&conflict);
        Ok((sql, params))
    }

    /// Like `build_row`, but every non-generated key column must be present
    /// in `row`.
    pub fn build_by_keys(
        &self,
        row: &RawRow,
        keys: &[String],
        update_columns: &[String],
    ) -> RepoResult<(String, SqlParams)> {
        if let Some(missing) = keys
            .iter()
            .find(|key| !row.contains_key(*key) && !self.is_generated(key))
        {
            return Err(RepoError::InvalidInput(format!(
                "upsert row is missing key column `{missing}`"
            )));
        }
        self.build_row(row, keys, update_columns)
    }

    fn assignments(&self, row: &RawRow, update_columns: &[String]) -> RepoResult<Vec<String>> {
        let mut out = Vec::new();
        for column in update_columns {
            if !row.contains_key(column)
                || Some(column.as_str()) == self.version
                || self.is_generated(column)
            {
                continue;
            }
            let target = quote_ident(self.dialect, column)?;
            out.push(format!("{target} = {}", self.incoming(column)?));
        }
        if out.is_empty() {
            return Ok(out);
        }
        if let Some(updated_at) = self.updated_at {
            if !update_columns.iter().any(|column| column == updated_at) {
                let target = quote_ident(self.dialect, updated_at)?;
                out.push(format!("{target} = CURRENT_TIMESTAMP"));
            }
        }
        if let Some(version) = self.version {
            let target = quote_ident(self.dialect, version)?;
            let current = match self.dialect {
                Dialect::MySql | Dialect::MariaDb => target.clone(),
                Dialect::Sqlite | Dialect::Postgres => {
                    column_sql(self.dialect, Some(self.table), version)?
                }
            };
            out.push(format!("{target} = {current} + 1"));
        }
        Ok(out)
    }

    /// Expression for the value the conflicting insert proposed.
    fn incoming(&self, column: &str) -> RepoResult<String> {
        let quoted = quote_ident(self.dialect, column)?;
        Ok(match self.dialect {
            Dialect::Sqlite | Dialect::Postgres => format!("excluded.{quoted}"),
            Dialect::MySql | Dialect::MariaDb => format!("VALUES({quoted})"),
        })
    }
}
