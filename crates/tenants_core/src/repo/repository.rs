//! Repository handle and its write path.
//!
//! # Invariants
//! - Input rows are snake-cased and filtered to declared columns first.
//! - Primary-key columns are never assigned by `update_by_id`.
//! - A numeric version column is bumped on every `update_by_id`; a supplied
//!   version value is the expected version, not an assignment.
//! - With a soft-delete column, `delete_by_id` never removes the row.
//! - Generated columns are never written; they may still be conflict keys.
//! - A reviving upsert leaves at most one live row per conflict key.

use super::keys::{column_sql, normalize_row, pk_map, pk_where, snake_case};
use super::upsert::UpsertBuilder;
use super::{ConflictKeys, RecordId, RepoError, RepoOptions, RepoResult};
use crate::db::{quote_ident, Dialect, Executor, RawRow, SqlParams};
use crate::model::value_as_i64;
use crate::schema::{tenants, TableDefinition};
use log::info;
use rusqlite::types::Value;
use std::collections::BTreeSet;

/// Data-access operations for one table definition.
///
/// Stateless apart from its borrowed executor and definition; cheap to build
/// per call site.
pub struct Repository<'a, X: Executor + ?Sized> {
    pub(super) exec: &'a X,
    pub(super) def: &'a TableDefinition,
    pub(super) options: RepoOptions,
}

impl<'a, X: Executor + ?Sized> Repository<'a, X> {
    pub fn new(exec: &'a X, def: &'a TableDefinition) -> Self {
        Self {
            exec,
            def,
            options: RepoOptions::default(),
        }
    }

    /// Repository over the `tenants` table.
    pub fn tenants(exec: &'a X) -> Self {
        Self::new(exec, tenants::shared())
    }

    pub fn with_options(mut self, options: RepoOptions) -> Self {
        self.options = options;
        self
    }

    pub fn definition(&self) -> &'a TableDefinition {
        self.def
    }

    pub fn options(&self) -> RepoOptions {
        self.options
    }

    pub fn dialect(&self) -> Dialect {
        self.exec.dialect()
    }

    pub(super) fn table_sql(&self) -> RepoResult<String> {
        quote_ident(self.dialect(), self.def.table())
    }

    pub(super) fn view_sql(&self) -> RepoResult<String> {
        quote_ident(self.dialect(), self.def.contract_view())
    }

    pub(super) fn pk_map(&self, id: &RecordId) -> RepoResult<RawRow> {
        pk_map(self.def, id)
    }

    /// Inserts one row; an empty row after normalization is a no-op.
    pub fn insert(&self, row: RawRow) -> RepoResult<usize> {
        let row = normalize_row(self.def, row);
        if row.is_empty() {
            return Ok(0);
        }

        let table = self.table_sql()?;
        let mut columns = Vec::with_capacity(row.len());
        let mut placeholders = Vec::with_capacity(row.len());
        let mut params = SqlParams::new();
        for (column, value) in row {
            columns.push(quote_ident(self.dialect(), &column)?);
            placeholders.push(format!(":{column}"));
            params.push(column, value);
        }
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        let affected = self.exec.execute(&sql, &params)?;
        info!(
            "event=repo_insert module=repo status=ok table={} affected={affected}",
            self.def.table()
        );
        Ok(affected)
    }

    /// Multi-row insert, chunked under the parameter ceiling.
    ///
    /// Columns are unified across rows (absent values bind `NULL`). A failing
    /// chunk aborts the rest; earlier chunks stay written.
    pub fn insert_many(&self, rows: Vec<RawRow>) -> RepoResult<()> {
        let rows: Vec<RawRow> = rows
            .into_iter()
            .map(|row| normalize_row(self.def, row))
            .filter(|row| !row.is_empty())
            .collect();
        if rows.is_empty() {
            return Ok(());
        }

        let columns: Vec<String> = rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let quoted = columns
            .iter()
            .map(|column| quote_ident(self.dialect(), column))
            .collect::<RepoResult<Vec<_>>>()?;
        let head = format!("INSERT INTO {} ({})", self.table_sql()?, quoted.join(", "));
        let chunk_len = self.options.insert_chunk_len(columns.len());

        let mut chunks = 0usize;
        for (chunk_index, chunk) in rows.chunks(chunk_len).enumerate() {
            let offset = chunk_index * chunk_len;
            let mut params = SqlParams::new();
            let mut tuples = Vec::with_capacity(chunk.len());
            for (i, row) in chunk.iter().enumerate() {
                let mut placeholders = Vec::with_capacity(columns.len());
                for column in &columns {
                    let name = format!("p_{offset}_{i}_{column}");
                    placeholders.push(format!(":{name}"));
                    params.push(name, row.get(column).cloned().unwrap_or(Value::Null));
                }
                tuples.push(format!("({})", placeholders.join(", ")));
            }
            self.exec
                .execute(&format!("{head} VALUES {}", tuples.join(", ")), &params)?;
            chunks += 1;
        }
        info!(
            "event=repo_insert_many module=repo status=ok table={} rows={} chunks={chunks}",
            self.def.table(),
            rows.len()
        );
        Ok(())
    }

    /// Upsert on the first unique-key group (else the primary key).
    pub fn upsert(&self, row: RawRow) -> RepoResult<usize> {
        self.upsert_with(row, false)
    }

    /// `upsert` that also clears the soft-delete marker of a conflicting row.
    pub fn upsert_revive(&self, row: RawRow) -> RepoResult<usize> {
        self.upsert_with(row, true)
    }

    /// Upsert on caller-supplied conflict keys.
    ///
    /// Empty `update_columns` updates every payload column except the
    /// primary and conflict keys.
    pub fn upsert_by_keys(
        &self,
        row: RawRow,
        keys: ConflictKeys,
        update_columns: &[&str],
    ) -> RepoResult<usize> {
        self.upsert_by_keys_with(row, keys, update_columns, false)
    }

    pub fn upsert_by_keys_revive(
        &self,
        row: RawRow,
        keys: ConflictKeys,
        update_columns: &[&str],
    ) -> RepoResult<usize> {
        self.upsert_by_keys_with(row, keys, update_columns, true)
    }

    /// Upserts each row independently; returns the number processed.
    pub fn upsert_many(&self, rows: Vec<RawRow>) -> RepoResult<usize> {
        self.upsert_many_with(rows, false)
    }

    pub fn upsert_many_revive(&self, rows: Vec<RawRow>) -> RepoResult<usize> {
        self.upsert_many_with(rows, true)
    }

    /// Optimistic update by primary key.
    ///
    /// A version value in `row` is the expected stored version. Returns the
    /// affected count; `0` means "missing row or version mismatch".
    pub fn update_by_id(&self, id: impl Into<RecordId>, row: RawRow) -> RepoResult<usize> {
        let id_map = self.pk_map(&id.into())?;
        let mut row: RawRow = row
            .into_iter()
            .map(|(key, value)| (snake_case(&key), value))
            .collect();

        let version = self.def.version_column();
        let expected_version = version.and_then(|column| row.remove(column));
        let row = normalize_row(self.def, row);

        let mut params = SqlParams::new();
        let where_pk = pk_where(self.dialect(), None, &id_map, &mut params, "pk_")?;

        let mut assignments = Vec::new();
        for (column, value) in &row {
            if self.def.pk().contains(column) {
                continue;
            }
            assignments.push(format!("{} = :{column}", quote_ident(self.dialect(), column)?));
            params.push(column.clone(), value.clone());
        }
        if let Some(version) = version.filter(|_| self.def.is_numeric_version()) {
            let version = quote_ident(self.dialect(), version)?;
            assignments.push(format!("{version} = {version} + 1"));
        }
        if let Some(updated_at) = self.def.updated_at_column() {
            if !row.contains_key(updated_at) {
                assignments.push(format!(
                    "{} = CURRENT_TIMESTAMP",
                    quote_ident(self.dialect(), updated_at)?
                ));
            }
        }
        if assignments.is_empty() {
            return Ok(0);
        }

        let mut sql = format!(
            "UPDATE {} SET {} WHERE {where_pk}",
            self.table_sql()?,
            assignments.join(", ")
        );
        if let (Some(version), Some(expected)) = (version, expected_version) {
            sql.push_str(&format!(
                " AND {} = :expected_version",
                quote_ident(self.dialect(), version)?
            ));
            let expected = value_as_i64(&expected).map_or(expected, Value::Integer);
            params.push("expected_version", expected);
        }

        let affected = self.exec.execute(&sql, &params)?;
        info!(
            "event=repo_update module=repo status={} table={} affected={affected}",
            if affected == 0 { "conflict" } else { "ok" },
            self.def.table()
        );
        Ok(affected)
    }

    /// Soft delete when a marker column exists, hard `DELETE` otherwise.
    pub fn delete_by_id(&self, id: impl Into<RecordId>) -> RepoResult<usize> {
        let id_map = self.pk_map(&id.into())?;
        let mut params = SqlParams::new();
        let where_pk = pk_where(self.dialect(), None, &id_map, &mut params, "pk_")?;
        let table = self.table_sql()?;

        let (sql, mode) = match self.def.soft_delete_column() {
            Some(soft) => (
                format!(
                    "UPDATE {table} SET {} WHERE {where_pk}",
                    self.marker_assignments(soft, "CURRENT_TIMESTAMP")?
                ),
                "soft",
            ),
            None => (format!("DELETE FROM {table} WHERE {where_pk}"), "hard"),
        };
        let affected = self.exec.execute(&sql, &params)?;
        info!(
            "event=repo_delete module=repo status=ok table={} mode={mode} affected={affected}",
            self.def.table()
        );
        Ok(affected)
    }

    /// Clears the soft-delete marker; `0` without a marker column.
    ///
    /// Fails with a unique violation when a live row already holds the
    /// restored row's key.
    pub fn restore_by_id(&self, id: impl Into<RecordId>) -> RepoResult<usize> {
        let id_map = self.pk_map(&id.into())?;
        let Some(soft) = self.def.soft_delete_column() else {
            return Ok(0);
        };
        let mut params = SqlParams::new();
        let where_pk = pk_where(self.dialect(), None, &id_map, &mut params, "pk_")?;
        let sql = format!(
            "UPDATE {} SET {} WHERE {where_pk}",
            self.table_sql()?,
            self.marker_assignments(soft, "NULL")?
        );
        let affected = self.exec.execute(&sql, &params)?;
        info!(
            "event=repo_restore module=repo status=ok table={} affected={affected}",
            self.def.table()
        );
        Ok(affected)
    }

    fn marker_assignments(&self, soft: &str, marker: &str) -> RepoResult<String> {
        let mut set = format!("{} = {marker}", quote_ident(self.dialect(), soft)?);
        if let Some(updated_at) = self.def.updated_at_column().filter(|column| *column != soft) {
            set.push_str(&format!(
                ", {} = CURRENT_TIMESTAMP",
                quote_ident(self.dialect(), updated_at)?
            ));
        }
        Ok(set)
    }

    fn upsert_with(&self, row: RawRow, revive: bool) -> RepoResult<usize> {
        let row = normalize_row(self.def, row);
        if row.is_empty() {
            return Ok(0);
        }
        let keys = self
            .def
            .unique_keys()
            .iter()
            .find(|group| !group.is_empty())
            .cloned()
            .unwrap_or_else(|| self.def.pk().to_vec());
        let update_columns = self.default_update_columns(&row, &keys);
        let (row, update_columns) = self.apply_revive(row, update_columns, revive);
        if revive {
            self.reclaim_trashed(&row, &keys)?;
        }

        let (sql, params) = self.upsert_builder().build_row(&row, &keys, &update_columns)?;
        let affected = self.exec.execute(&sql, &params)?;
        info!(
            "event=repo_upsert module=repo status=ok table={} revive={revive} affected={affected}",
            self.def.table()
        );
        Ok(affected)
    }

    fn upsert_by_keys_with(
        &self,
        row: RawRow,
        keys: ConflictKeys,
        update_columns: &[&str],
        revive: bool,
    ) -> RepoResult<usize> {
        let mut row = normalize_row(self.def, row);
        if row.is_empty() && keys.is_empty() {
            return Ok(0);
        }

        let key_columns: Vec<String> = match keys {
            ConflictKeys::Columns(columns) => columns.iter().map(|c| snake_case(c)).collect(),
            ConflictKeys::Values(values) => {
                let mut columns = Vec::with_capacity(values.len());
                for (column, value) in values {
                    let column = snake_case(&column);
                    if self.def.is_writable(&column) {
                        row.entry(column.clone()).or_insert(value);
                    }
                    columns.push(column);
                }
                columns
            }
        };
        if let Some(unknown) = key_columns.iter().find(|c| !self.def.has_column(c)) {
            return Err(RepoError::UnknownColumn(unknown.clone()));
        }

        let update_columns = if update_columns.is_empty() {
            self.default_update_columns(&row, &key_columns)
        } else {
            let mut out = Vec::with_capacity(update_columns.len());
            for column in update_columns {
                let column = snake_case(column);
                if !self.def.has_column(&column) {
                    return Err(RepoError::UnknownColumn(column));
                }
                if !self.def.pk().contains(&column) && !key_columns.contains(&column) {
                    out.push(column);
                }
            }
            out
        };
        let (row, update_columns) = self.apply_revive(row, update_columns, revive);
        if revive {
            self.reclaim_trashed(&row, &key_columns)?;
        }

        let (sql, params) =
            self.upsert_builder()
                .build_by_keys(&row, &key_columns, &update_columns)?;
        let affected = self.exec.execute(&sql, &params)?;
        info!(
            "event=repo_upsert_by_keys module=repo status=ok table={} revive={revive} affected={affected}",
            self.def.table()
        );
        Ok(affected)
    }

    fn upsert_many_with(&self, rows: Vec<RawRow>, revive: bool) -> RepoResult<usize> {
        let mut processed = 0usize;
        for row in rows {
            let row = normalize_row(self.def, row);
            if row.is_empty() {
                continue;
            }
            self.upsert_with(row, revive)?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Payload columns minus primary and conflict keys.
    fn default_update_columns(&self, row: &RawRow, keys: &[String]) -> Vec<String> {
        row.keys()
            .filter(|column| !self.def.pk().contains(column) && !keys.contains(column))
            .cloned()
            .collect()
    }

    /// Revive forces `soft = NULL` into the row and the update set.
    fn apply_revive(
        &self,
        mut row: RawRow,
        mut update_columns: Vec<String>,
        revive: bool,
    ) -> (RawRow, Vec<String>) {
        if let Some(soft) = self.def.soft_delete_column().filter(|_| revive) {
            row.insert(soft.to_string(), Value::Null);
            if !update_columns.iter().any(|column| column == soft) {
                update_columns.push(soft.to_string());
            }
        }
        (row, update_columns)
    }

    /// Makes the newest trashed row holding the key live again, so the
    /// following upsert conflicts with it instead of inserting a twin.
    ///
    /// Only needed when a generated key column takes soft-deleted rows out of
    /// the unique index. Skipped when a live row already holds the key or a
    /// written key value is missing or `NULL`.
    fn reclaim_trashed(&self, row: &RawRow, keys: &[String]) -> RepoResult<usize> {
        let Some(soft) = self.def.soft_delete_column() else {
            return Ok(0);
        };
        if !keys.iter().any(|key| self.def.is_generated(key)) {
            return Ok(0);
        }
        let mut key_map = RawRow::new();
        for key in keys.iter().filter(|key| self.def.is_writable(key)) {
            match row.get(key) {
                Some(value) if *value != Value::Null => {
                    key_map.insert(key.clone(), value.clone());
                }
                _ => return Ok(0),
            }
        }
        if key_map.is_empty() {
            return Ok(0);
        }

        let dialect = self.dialect();
        let table = self.table_sql()?;
        let mut params = SqlParams::new();
        let trashed_keys = pk_where(dialect, Some("t"), &key_map, &mut params, "rk_")?;
        let live_keys = pk_where(dialect, Some("live"), &key_map, &mut SqlParams::new(), "rk_")?;
        let pk_columns = self
            .def
            .pk()
            .iter()
            .map(|column| column_sql(dialect, Some("t"), column))
            .collect::<RepoResult<Vec<_>>>()?;
        let order = std::iter::once(column_sql(dialect, Some("t"), soft)?)
            .chain(pk_columns.iter().cloned())
            .map(|column| format!("{column} DESC"))
            .collect::<Vec<_>>();
        let sql = format!(
            "SELECT {} FROM {table} t WHERE {trashed_keys} AND {} IS NOT NULL              AND NOT EXISTS (SELECT 1 FROM {table} live WHERE {live_keys} AND {} IS NULL)              ORDER BY {} LIMIT 1",
            pk_columns.join(", "),
            column_sql(dialect, Some("t"), soft)?,
            column_sql(dialect, Some("live"), soft)?,
            order.join(", ")
        );
        let Some(id_map) = self.exec.fetch(&sql, &params)? else {
            return Ok(0);
        };

        let mut params = SqlParams::new();
        let where_pk = pk_where(dialect, None, &id_map, &mut params, "pk_")?;
        let sql = format!(
            "UPDATE {table} SET {} WHERE {where_pk}",
            self.marker_assignments(soft, "NULL")?
        );
        let affected = self.exec.execute(&sql, &params)?;
        info!(
            "event=repo_reclaim module=repo status=ok table={} affected={affected}",
            self.def.table()
        );
        Ok(affected)
    }

    fn upsert_builder(&self) -> UpsertBuilder<'a> {
        let def: &'a TableDefinition = self.def;
        let version = def.version_column().filter(|_| def.is_numeric_version());
        UpsertBuilder::new(self.dialect(), def.table())
            .updated_at(def.updated_at_column())
            .version(version)
            .columns(&def.columns)
    }
}
