//! Data-access layer for the versioned, soft-deletable `tenants` entity.
//! Repositories here own the concurrency, soft-delete and pagination rules.

pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod schema;
pub mod service;

pub use db::{
    open_db, open_db_in_memory, schema_status, DbError, DbResult, Dialect, Executor, LockMode,
    LockStrength, RawRow, SchemaStatus, SqlParams,
};
pub use logging::{init_logging, logging_status, LogLevel, LoggingConfig, LoggingError};
pub use model::{Hydrate, MapError, TenantRecord};
pub use query::{Criteria, OrderDirection, QuerySpecification, Visibility};
pub use repo::{
    ConflictKeys, Page, RecordId, RepoError, RepoOptions, RepoResult, Repository, SeekCursor,
    SeekOrder, SeekPage, ViewLookup,
};
pub use schema::{ColumnDef, ColumnKind, TableDefinition};
pub use service::tenant_facade::{Capabilities, TenantsFacade};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
