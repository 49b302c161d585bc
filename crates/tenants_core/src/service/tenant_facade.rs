//! Tenants facade: stable entry points over the tenants repository.
//!
//! # Responsibility
//! - Expose every repository operation under one tenant-specific surface.
//! - Degrade optional statements according to explicit `Capabilities`.
//!
//! # Invariants
//! - Without upsert support, upserts become plain inserts.
//! - Without revive support, revive upserts become plain upserts.
//! - Without keyset support, seek pagination returns the first offset page
//!   sized by `limit` and no cursor. Rows past that page are not reachable
//!   through the seek API in that mode.

use crate::db::{quote_ident, Dialect, Executor, LockMode, LockStrength, RawRow, SqlParams};
use crate::model::TenantRecord;
use crate::query::{Criteria, QuerySpecification};
use crate::repo::{
    ConflictKeys, Page, RecordId, RepoOptions, RepoResult, Repository, SeekCursor, SeekOrder,
    SeekPage,
};
use log::debug;
use rusqlite::types::Value;

/// First SQLite release with `INSERT .. ON CONFLICT DO UPDATE`.
const SQLITE_UPSERT_MIN_VERSION: i32 = 3_024_000;

/// Optional statement shapes supported by the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub upsert: bool,
    pub revive: bool,
    pub keyset: bool,
}

impl Capabilities {
    pub const ALL: Self = Self {
        upsert: true,
        revive: true,
        keyset: true,
    };

    pub const NONE: Self = Self {
        upsert: false,
        revive: false,
        keyset: false,
    };

    /// Capabilities of a dialect; SQLite depends on the linked library.
    pub fn detect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Sqlite => {
                let upsert = rusqlite::version_number() >= SQLITE_UPSERT_MIN_VERSION;
                Self {
                    upsert,
                    revive: upsert,
                    keyset: true,
                }
            }
            Dialect::Postgres | Dialect::MySql | Dialect::MariaDb => Self::ALL,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

/// Tenant-facing pass-through over `Repository`.
pub struct TenantsFacade<'a, X: Executor + ?Sized> {
    repo: Repository<'a, X>,
    capabilities: Capabilities,
}

impl<'a, X: Executor + ?Sized> TenantsFacade<'a, X> {
    /// Facade over the tenants table with detected capabilities.
    pub fn new(exec: &'a X) -> Self {
        let capabilities = Capabilities::detect(exec.dialect());
        Self {
            repo: Repository::tenants(exec),
            capabilities,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_options(mut self, options: RepoOptions) -> Self {
        self.repo = self.repo.with_options(options);
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn repository(&self) -> &Repository<'a, X> {
        &self.repo
    }

    /// Criteria preconfigured for tenants in this store's dialect.
    pub fn criteria(&self) -> Criteria {
        Criteria::tenants(self.repo.dialect())
    }

    pub fn insert(&self, row: RawRow) -> RepoResult<usize> {
        self.repo.insert(row)
    }

    pub fn insert_many(&self, rows: Vec<RawRow>) -> RepoResult<()> {
        self.repo.insert_many(rows)
    }

    pub fn upsert(&self, row: RawRow) -> RepoResult<usize> {
        if !self.capabilities.upsert {
            debug!("event=facade_fallback module=service op=upsert to=insert");
            return self.repo.insert(row);
        }
        self.repo.upsert(row)
    }

    pub fn upsert_revive(&self, row: RawRow) -> RepoResult<usize> {
        if !self.capabilities.revive {
            debug!("event=facade_fallback module=service op=upsert_revive to=upsert");
            return self.upsert(row);
        }
        self.repo.upsert_revive(row)
    }

    pub fn upsert_by_keys(
        &self,
        row: RawRow,
        keys: ConflictKeys,
        update_columns: &[&str],
    ) -> RepoResult<usize> {
        if !self.capabilities.upsert {
            debug!("event=facade_fallback module=service op=upsert_by_keys to=insert");
            return self.repo.insert(backfill_keys(row, keys));
        }
        self.repo.upsert_by_keys(row, keys, update_columns)
    }

    pub fn upsert_by_keys_revive(
        &self,
        row: RawRow,
        keys: ConflictKeys,
        update_columns: &[&str],
    ) -> RepoResult<usize> {
        if !self.capabilities.revive {
            debug!("event=facade_fallback module=service op=upsert_by_keys_revive to=upsert_by_keys");
            return self.upsert_by_keys(row, keys, update_columns);
        }
        self.repo.upsert_by_keys_revive(row, keys, update_columns)
    }

    pub fn upsert_many(&self, rows: Vec<RawRow>) -> RepoResult<usize> {
        if !self.capabilities.upsert {
            debug!("event=facade_fallback module=service op=upsert_many to=insert");
            let mut processed = 0;
            for row in rows {
                if self.repo.insert(row)? > 0 {
                    processed += 1;
                }
            }
            return Ok(processed);
        }
        self.repo.upsert_many(rows)
    }

    pub fn upsert_many_revive(&self, rows: Vec<RawRow>) -> RepoResult<usize> {
        if !self.capabilities.revive {
            debug!("event=facade_fallback module=service op=upsert_many_revive to=upsert_many");
            return self.upsert_many(rows);
        }
        self.repo.upsert_many_revive(rows)
    }

    pub fn update_by_id(&self, id: impl Into<RecordId>, row: RawRow) -> RepoResult<usize> {
        self.repo.update_by_id(id, row)
    }

    pub fn delete_by_id(&self, id: impl Into<RecordId>) -> RepoResult<usize> {
        self.repo.delete_by_id(id)
    }

    pub fn restore_by_id(&self, id: impl Into<RecordId>) -> RepoResult<usize> {
        self.repo.restore_by_id(id)
    }

    pub fn find_by_id(&self, id: impl Into<RecordId>) -> RepoResult<Option<RawRow>> {
        self.repo.find_by_id(id)
    }

    pub fn get_by_id(&self, id: impl Into<RecordId>) -> RepoResult<Option<RawRow>> {
        self.repo.find_by_id(id)
    }

    pub fn get_record_by_id(&self, id: impl Into<RecordId>) -> RepoResult<Option<TenantRecord>> {
        self.repo.get_typed_by_id(id)
    }

    pub fn exists_by_id(&self, id: impl Into<RecordId>) -> RepoResult<bool> {
        self.repo.exists_by_id(id)
    }

    pub fn find_all_by_ids(&self, ids: &[i64]) -> RepoResult<Vec<RawRow>> {
        let ids: Vec<RecordId> = ids.iter().copied().map(RecordId::from).collect();
        self.repo.find_all_by_ids(&ids)
    }

    pub fn get_by_unique(&self, key_values: &RawRow) -> RepoResult<Option<RawRow>> {
        self.repo.get_by_unique(key_values)
    }

    pub fn get_by_slug_ci_and_is_live(
        &self,
        slug_ci: &str,
        is_live: i64,
    ) -> RepoResult<Option<RawRow>> {
        self.repo.get_by_unique(&slug_live_key(slug_ci, is_live))
    }

    pub fn get_record_by_slug_ci_and_is_live(
        &self,
        slug_ci: &str,
        is_live: i64,
    ) -> RepoResult<Option<TenantRecord>> {
        match self.get_by_slug_ci_and_is_live(slug_ci, is_live)? {
            Some(row) => Ok(Some(TenantRecord::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub fn exists_by_slug_ci_and_is_live(&self, slug_ci: &str, is_live: i64) -> RepoResult<bool> {
        let dialect = self.repo.dialect();
        let where_sql = format!(
            "{} = :uniq_slug_ci AND {} = :uniq_is_live",
            quote_ident(dialect, "t.slug_ci")?,
            quote_ident(dialect, "t.is_live")?
        );
        let params: SqlParams = [
            ("uniq_slug_ci", Value::Text(slug_ci.to_string())),
            ("uniq_is_live", Value::Integer(is_live)),
        ]
        .into_iter()
        .collect();
        self.repo.exists(&where_sql, params)
    }

    pub fn get_id_by_slug_ci_and_is_live(
        &self,
        slug_ci: &str,
        is_live: i64,
    ) -> RepoResult<Option<i64>> {
        Ok(self
            .get_by_slug_ci_and_is_live(slug_ci, is_live)?
            .and_then(|row| match row.get("id") {
                Some(Value::Integer(id)) => Some(*id),
                _ => None,
            }))
    }

    pub fn exists(&self, where_sql: &str, params: SqlParams) -> RepoResult<bool> {
        self.repo.exists(where_sql, params)
    }

    pub fn count(&self, where_sql: &str, params: SqlParams) -> RepoResult<u64> {
        self.repo.count(where_sql, params)
    }

    pub fn paginate<Q: QuerySpecification>(&self, criteria: &Q) -> RepoResult<Page> {
        self.repo.paginate(criteria)
    }

    /// `paginate` with items hydrated into records.
    pub fn paginate_records<Q: QuerySpecification>(
        &self,
        criteria: &Q,
    ) -> RepoResult<Page<TenantRecord>> {
        let page = self.repo.paginate(criteria)?;
        Ok(page.try_map(|row| TenantRecord::from_row(&row))?)
    }

    pub fn lock_by_id(
        &self,
        id: impl Into<RecordId>,
        mode: LockMode,
        strength: LockStrength,
    ) -> RepoResult<Option<RawRow>> {
        self.repo.lock_by_id(id, mode, strength)
    }

    pub fn paginate_by_seek<Q: QuerySpecification>(
        &self,
        criteria: &Q,
        order: &SeekOrder,
        cursor: Option<&SeekCursor>,
        limit: u32,
    ) -> RepoResult<SeekPage> {
        if !self.capabilities.keyset {
            debug!("event=facade_fallback module=service op=paginate_by_seek to=paginate");
            let page = self.repo.paginate(&criteria.paged(1, limit))?;
            return Ok(SeekPage {
                items: page.items,
                next_cursor: None,
            });
        }
        self.repo.paginate_by_seek(criteria, order, cursor, limit)
    }
}

fn slug_live_key(slug_ci: &str, is_live: i64) -> RawRow {
    [
        ("slug_ci".to_string(), Value::Text(slug_ci.to_string())),
        ("is_live".to_string(), Value::Integer(is_live)),
    ]
    .into_iter()
    .collect()
}

/// Copies keyed values into `row` where the row lacks them.
fn backfill_keys(mut row: RawRow, keys: ConflictKeys) -> RawRow {
    if let ConflictKeys::Values(values) = keys {
        for (column, value) in values {
            row.entry(column).or_insert(value);
        }
    }
    row
}
