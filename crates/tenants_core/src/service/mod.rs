//! Caller-facing services.
//!
//! # Responsibility
//! - Give external callers stable entry points over repository operations.
//! - Keep capability fallbacks out of the repository core.

pub mod tenant_facade;
