//! Repository layer: write path, read path and pagination for one table.
//!
//! # Responsibility
//! - Compose single statements into concurrency-aware operations
//!   (optimistic updates, soft delete/restore, revive upserts, chunked bulk
//!   inserts, offset and keyset pagination).
//! - Keep SQL text generation inside the persistence boundary.
//!
//! # Invariants
//! - One `Executor` call per statement; no retries, no caching.
//! - Optimistic conflicts surface as an affected count of `0`, never as an
//!   error.
//! - Argument-shape errors are raised before any statement is issued.

mod config;
mod keys;
mod keyset;
mod reads;
mod repository;
mod upsert;

pub use config::RepoOptions;
pub use keys::{normalize_row, snake_case, ConflictKeys, RecordId};
pub use keyset::{KeysetPaginator, SeekCursor, SeekOrder, SeekPage, SeekQuery};
pub use reads::{Page, ViewLookup};
pub use repository::Repository;
pub use upsert::UpsertBuilder;

use crate::db::DbError;
use crate::model::MapError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for tenant persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Statement execution failure, propagated unchanged.
    Db(DbError),
    /// Wrong argument shape; raised before any statement runs.
    InvalidInput(String),
    /// Column outside the definition or a criteria whitelist.
    UnknownColumn(String),
    /// Stored row could not be hydrated into a typed record.
    Mapping(MapError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownColumn(column) => write!(f, "unknown column `{column}`"),
            Self::Mapping(err) => write!(f, "invalid stored row: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Mapping(err) => Some(err),
            Self::InvalidInput(_) | Self::UnknownColumn(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<MapError> for RepoError {
    fn from(value: MapError) -> Self {
        Self::Mapping(value)
    }
}
