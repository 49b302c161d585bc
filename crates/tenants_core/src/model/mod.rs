//! Typed projections of tenant rows and the raw-row mapping rules.
//!
//! # Responsibility
//! - Hydrate immutable typed records from raw column maps.
//! - Serialize typed records back to raw rows.
//! - Compute minimal column diffs with per-column comparison strategies.
//!
//! # Invariants
//! - Typed records are never mutated after hydration.
//! - Timestamps are stored as UTC text (`YYYY-MM-DD HH:MM:SS[.fff]`).

pub mod compare;
pub mod tenant;
mod value;

pub use compare::{diff_rows, values_equal, CompareStrategy};
pub use tenant::TenantRecord;
pub use value::{
    parse_timestamp, timestamp_value, value_as_bool, value_as_f64, value_as_i64, MapError,
    MapResult,
};

use crate::db::RawRow;

/// Typed projection that can be built from a raw row.
pub trait Hydrate: Sized {
    fn hydrate(row: &RawRow) -> MapResult<Self>;
}
