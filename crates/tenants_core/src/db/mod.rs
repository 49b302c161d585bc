//! SQLite storage bootstrap, statement execution and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the tenants package.
//! - Apply schema migrations in deterministic order.
//! - Define the statement-execution contract (`Executor`) used by repositories.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Repositories must not read/write tenant data before migrations succeed.
//! - Every statement goes through `Executor`; repositories never touch
//!   `rusqlite::Statement` directly.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod dialect;
mod executor;
pub mod migrations;
mod open;
mod status;

pub(crate) use dialect::is_plain_identifier;
pub use dialect::{quote_ident, Dialect, LockMode, LockStrength};
pub use executor::{Executor, RawRow, SqlParams};
pub use open::{open_db, open_db_in_memory};
pub use status::{schema_status, SchemaStatus};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Returns whether the failure means a referenced table/view is absent.
    ///
    /// `find_by_id` falls back to the base table on any view failure; this
    /// only tags the fallback log line.
    pub fn is_missing_relation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(_, Some(message))) => {
                message.starts_with("no such table") || message.starts_with("no such view")
            }
            _ => false,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
