//! Static table metadata consumed by repositories, criteria and mappers.
//!
//! # Responsibility
//! - Describe one table: name, read view, keys, optional soft-delete,
//!   version and updated-at columns, and the known column whitelist.
//! - Declare per-column value kinds that drive casting and diffing.
//!
//! # Invariants
//! - Every key/marker column referenced by a definition is a known column.
//! - Every identifier is a plain SQL identifier.

mod definition;
pub mod tenants;

pub use definition::{ColumnDef, ColumnKind, TableDefinition};
