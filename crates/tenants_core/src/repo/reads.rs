//! Repository read path: lookups, existence checks, offset and seek pages,
//! row locks.
//!
//! # Invariants
//! - Reads target the contract view aliased as `t`; only `find_by_id`
//!   (when the view is unavailable), `find_all_by_ids` and `lock_by_id` read
//!   the base table.
//! - Every read appends the soft-delete guard for its visibility.

use super::keys::{column_sql, pk_where, soft_guard};
use super::keyset::{KeysetPaginator, SeekCursor, SeekOrder, SeekPage, SeekQuery};
use super::{RecordId, RepoError, RepoResult, Repository};
use crate::db::{quote_ident, DbError, Executor, LockMode, LockStrength, RawRow, SqlParams};
use crate::model::{value_as_i64, Hydrate};
use crate::query::{parse_order, render_order_by, OrderTerm, QuerySpecification, Visibility, BASE_ALIAS};
use log::{debug, warn};
use rusqlite::types::Value;

/// Outcome of reading one row through the contract view.
#[derive(Debug)]
pub enum ViewLookup {
    Found(RawRow),
    NotFound,
    /// The view could not be read (e.g. not installed yet).
    Unavailable(DbError),
}

/// One offset page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T = RawRow> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Converts every item, keeping the paging metadata.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        })
    }
}

impl<X: Executor + ?Sized> Repository<'_, X> {
    /// Reads one active row by id, view first.
    ///
    /// Falls back to the base table only when the view is unavailable; a view
    /// miss is final.
    pub fn find_by_id(&self, id: impl Into<RecordId>) -> RepoResult<Option<RawRow>> {
        let id_map = self.pk_map(&id.into())?;
        match self.lookup_view(&id_map)? {
            ViewLookup::Found(row) => Ok(Some(row)),
            ViewLookup::NotFound => Ok(None),
            ViewLookup::Unavailable(err) => {
                warn!(
                    "event=repo_view_fallback module=repo status=degraded view={} table={} missing_relation={} error={}",
                    self.def.contract_view(),
                    self.def.table(),
                    err.is_missing_relation(),
                    err
                );
                self.find_in_table(&id_map)
            }
        }
    }

    /// Single view read for `find_by_id`.
    pub fn lookup_view(&self, id_map: &RawRow) -> RepoResult<ViewLookup> {
        let mut params = SqlParams::new();
        let where_pk = pk_where(self.dialect(), Some(BASE_ALIAS), id_map, &mut params, "pk_")?;
        let guard = self.guard(Some(BASE_ALIAS), Visibility::Active)?;
        let sql = format!(
            "SELECT {BASE_ALIAS}.* FROM {} {BASE_ALIAS} WHERE {where_pk} AND {guard} LIMIT 1",
            self.view_sql()?
        );
        Ok(match self.exec.fetch(&sql, &params) {
            Ok(Some(row)) => ViewLookup::Found(row),
            Ok(None) => ViewLookup::NotFound,
            Err(err) => ViewLookup::Unavailable(err),
        })
    }

    /// `find_by_id` hydrated into a typed record.
    pub fn get_typed_by_id<T: Hydrate>(&self, id: impl Into<RecordId>) -> RepoResult<Option<T>> {
        match self.find_by_id(id)? {
            Some(row) => Ok(Some(T::hydrate(&row)?)),
            None => Ok(None),
        }
    }

    pub fn exists_by_id(&self, id: impl Into<RecordId>) -> RepoResult<bool> {
        let id_map = self.pk_map(&id.into())?;
        let mut params = SqlParams::new();
        let where_pk = pk_where(self.dialect(), Some(BASE_ALIAS), &id_map, &mut params, "pk_")?;
        self.exists(&where_pk, params)
    }

    /// Batch lookup by ids against the base table.
    ///
    /// Single-column keys run `IN (...)` chunks; composite keys run one
    /// OR-combined statement. Empty input issues no statement.
    pub fn find_all_by_ids(&self, ids: &[RecordId]) -> RepoResult<Vec<RawRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.table_sql()?;
        let guard = self.table_guard()?;
        let pk = self.def.pk();

        if let [pk_column] = pk {
            let column = quote_ident(self.dialect(), pk_column)?;
            let values = ids
                .iter()
                .map(|id| {
                    self.pk_map(id)?.remove(pk_column).ok_or_else(|| {
                        RepoError::InvalidInput(format!("id is missing key column `{pk_column}`"))
                    })
                })
                .collect::<RepoResult<Vec<Value>>>()?;

            let chunk_len = self.options.id_chunk_len();
            let mut rows = Vec::new();
            for (chunk_index, chunk) in values.chunks(chunk_len).enumerate() {
                let offset = chunk_index * chunk_len;
                let mut params = SqlParams::new();
                let mut placeholders = Vec::with_capacity(chunk.len());
                for (j, value) in chunk.iter().enumerate() {
                    let name = format!("p{offset}_{j}");
                    placeholders.push(format!(":{name}"));
                    params.push(name, value.clone());
                }
                let sql = format!(
                    "SELECT * FROM {table} WHERE {column} IN ({}){guard}",
                    placeholders.join(", ")
                );
                rows.extend(self.exec.fetch_all(&sql, &params)?);
            }
            return Ok(rows);
        }

        let mut params = SqlParams::new();
        let mut branches = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            let id_map = self.pk_map(id)?;
            let predicate = pk_where(self.dialect(), None, &id_map, &mut params, &format!("b{i}_"))?;
            branches.push(format!("({predicate})"));
        }
        let sql = format!(
            "SELECT * FROM {table} WHERE ({}){guard}",
            branches.join(" OR ")
        );
        Ok(self.exec.fetch_all(&sql, &params)?)
    }

    /// First active row matching every `column = value` (`NULL` → `IS NULL`).
    ///
    /// An empty map matches nothing and issues no statement.
    pub fn get_by_unique(&self, key_values: &RawRow) -> RepoResult<Option<RawRow>> {
        if key_values.is_empty() {
            return Ok(None);
        }
        let mut params = SqlParams::new();
        let mut parts = Vec::with_capacity(key_values.len());
        for (column, value) in key_values {
            if !self.def.has_column(column) {
                return Err(RepoError::UnknownColumn(column.clone()));
            }
            let column_sql = column_sql(self.dialect(), Some(BASE_ALIAS), column)?;
            if *value == Value::Null {
                parts.push(format!("{column_sql} IS NULL"));
            } else {
                let name = format!("u_{column}");
                parts.push(format!("{column_sql} = :{name}"));
                params.push(name, value.clone());
            }
        }
        let guard = self.guard(Some(BASE_ALIAS), Visibility::Active)?;
        let sql = format!(
            "SELECT {BASE_ALIAS}.* FROM {} {BASE_ALIAS} WHERE ({}) AND {guard} LIMIT 1",
            self.view_sql()?,
            parts.join(" AND ")
        );
        Ok(self.exec.fetch(&sql, &params)?)
    }

    /// Whether an active view row matches the caller predicate.
    ///
    /// `where_sql` references the view through alias `t`.
    pub fn exists(&self, where_sql: &str, params: SqlParams) -> RepoResult<bool> {
        let guard = self.guard(Some(BASE_ALIAS), Visibility::Active)?;
        let sql = format!(
            "SELECT 1 FROM {} {BASE_ALIAS} WHERE ({where_sql}) AND {guard} LIMIT 1",
            self.view_sql()?
        );
        Ok(self.exec.fetch_one(&sql, &params)?.is_some())
    }

    /// Number of active view rows matching the caller predicate.
    pub fn count(&self, where_sql: &str, params: SqlParams) -> RepoResult<u64> {
        let guard = self.guard(Some(BASE_ALIAS), Visibility::Active)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} {BASE_ALIAS} WHERE ({where_sql}) AND {guard}",
            self.view_sql()?
        );
        Ok(self.scalar_count(&sql, &params)?)
    }

    /// Offset page over the view.
    ///
    /// Without a requested order the definition default applies, else
    /// `<pk> DESC`.
    pub fn paginate<Q: QuerySpecification>(&self, criteria: &Q) -> RepoResult<Page> {
        let parts = criteria.to_sql(true)?;
        let guard = self.guard(Some(BASE_ALIAS), criteria.visibility())?;
        let where_sql = format!("({}) AND {guard}", parts.where_sql);
        let order = if parts.order.is_empty() {
            self.default_order()?
        } else {
            parts.order
        };
        let order_sql = render_order_by(self.dialect(), BASE_ALIAS, &order, &self.def.columns())?;

        let view = self.view_sql()?;
        let joins = if parts.join_sql.is_empty() {
            String::new()
        } else {
            format!(" {}", parts.join_sql)
        };
        let total = self.scalar_count(
            &format!("SELECT COUNT(*) FROM {view} {BASE_ALIAS}{joins} WHERE {where_sql}"),
            &parts.params,
        )?;
        let items = self.exec.fetch_all(
            &format!(
                "SELECT {BASE_ALIAS}.* FROM {view} {BASE_ALIAS}{joins} WHERE {where_sql} {order_sql} LIMIT {} OFFSET {}",
                parts.limit, parts.offset
            ),
            &parts.params,
        )?;
        debug!(
            "event=repo_paginate module=repo status=ok view={} total={total} rows={}",
            self.def.contract_view(),
            items.len()
        );
        Ok(Page {
            items,
            total,
            page: criteria.page(),
            per_page: criteria.per_page(),
        })
    }

    /// Locking read of one active row from the base table.
    ///
    /// SQLite has no row-lock clause; call this inside a `BEGIN IMMEDIATE`
    /// transaction there.
    pub fn lock_by_id(
        &self,
        id: impl Into<RecordId>,
        mode: LockMode,
        strength: LockStrength,
    ) -> RepoResult<Option<RawRow>> {
        let id_map = self.pk_map(&id.into())?;
        let mut params = SqlParams::new();
        let where_pk = pk_where(self.dialect(), None, &id_map, &mut params, "pk_")?;
        let mut sql = format!(
            "SELECT * FROM {} WHERE {where_pk}{}",
            self.table_sql()?,
            self.table_guard()?
        );
        if let Some(clause) = self.dialect().lock_clause(strength, mode) {
            sql.push(' ');
            sql.push_str(&clause);
        }
        Ok(self.exec.fetch(&sql, &params)?)
    }

    /// Keyset page over the view, ordered by `(order.column, order.pk)`.
    pub fn paginate_by_seek<Q: QuerySpecification>(
        &self,
        criteria: &Q,
        order: &SeekOrder,
        cursor: Option<&SeekCursor>,
        limit: u32,
    ) -> RepoResult<SeekPage> {
        for column in [&order.column, &order.pk] {
            if !self.def.has_column(column) {
                return Err(RepoError::UnknownColumn(column.clone()));
            }
        }
        let parts = criteria.to_sql(true)?;
        let guard = self.guard(Some(BASE_ALIAS), criteria.visibility())?;
        let query = SeekQuery {
            view: self.def.contract_view(),
            where_sql: &parts.where_sql,
            params: parts.params,
            join_sql: &parts.join_sql,
            soft_guard: &guard,
        };
        KeysetPaginator::new(self.exec).paginate(query, order, cursor, limit)
    }

    fn find_in_table(&self, id_map: &RawRow) -> RepoResult<Option<RawRow>> {
        let mut params = SqlParams::new();
        let where_pk = pk_where(self.dialect(), None, id_map, &mut params, "pk_")?;
        let sql = format!(
            "SELECT * FROM {} WHERE {where_pk}{}",
            self.table_sql()?,
            self.table_guard()?
        );
        Ok(self.exec.fetch(&sql, &params)?)
    }

    fn guard(&self, alias: Option<&str>, visibility: Visibility) -> RepoResult<String> {
        soft_guard(self.def, self.dialect(), alias, visibility)
    }

    /// Unaliased active guard as an ` AND ..` suffix; empty when it is `1=1`.
    fn table_guard(&self) -> RepoResult<String> {
        let guard = self.guard(None, Visibility::Active)?;
        Ok(if guard == "1=1" {
            String::new()
        } else {
            format!(" AND {guard}")
        })
    }

    fn default_order(&self) -> RepoResult<Vec<OrderTerm>> {
        match self.def.default_order() {
            Some(order) => parse_order(order),
            None => parse_order(
                &self
                    .def
                    .pk()
                    .iter()
                    .map(|column| format!("{column} DESC"))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        }
    }

    fn scalar_count(&self, sql: &str, params: &SqlParams) -> RepoResult<u64> {
        let count = self
            .exec
            .fetch_one(sql, params)?
            .as_ref()
            .and_then(value_as_i64)
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
