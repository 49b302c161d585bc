//! Query specification contract and the criteria builder that implements it.
//!
//! # Responsibility
//! - Turn caller filters/sorting/paging into `(where, params, order, limit,
//!   offset, joins)` parts consumed by repository read paths.
//! - Carry soft-delete visibility chosen by the caller.
//!
//! # Invariants
//! - Columns are whitelisted; every emitted column is qualified with the
//!   `t` alias used by repository reads.
//! - Builder misuse is reported by `to_sql` before any statement runs.

mod criteria;
mod order;

pub use criteria::{CompareOp, Criteria};
pub use order::{parse_order, render_order_by, OrderDirection, OrderTerm};

use crate::db::SqlParams;
use crate::repo::RepoResult;

/// Alias used for the base relation in every repository read.
pub const BASE_ALIAS: &str = "t";

/// Soft-delete visibility requested by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Only rows without a soft-delete marker.
    #[default]
    Active,
    /// Active and soft-deleted rows.
    WithTrashed,
    /// Only soft-deleted rows.
    OnlyTrashed,
}

/// SQL fragments produced by a query specification.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParts {
    /// Predicate body; `1=1` when unfiltered.
    pub where_sql: String,
    pub params: SqlParams,
    /// Requested ordering; empty means "use the table default".
    pub order: Vec<OrderTerm>,
    pub limit: u32,
    pub offset: u64,
    /// Join fragments; empty unless requested with `include_joins`.
    pub join_sql: String,
}

/// Contract every query specification handed to a repository must satisfy.
pub trait QuerySpecification {
    fn to_sql(&self, include_joins: bool) -> RepoResult<SqlParts>;
    fn page(&self) -> u32;
    fn per_page(&self) -> u32;
    fn visibility(&self) -> Visibility;
    /// Same filters, positioned on another page.
    fn paged(&self, page: u32, per_page: u32) -> Self
    where
        Self: Sized;
}
