//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `tenants_core` linkage and run one write cycle against an
//!   in-memory database.
//! - Keep output deterministic for quick local sanity checks.

use rusqlite::types::Value;
use std::error::Error;
use tenants_core::{open_db_in_memory, RawRow, TenantsFacade};

fn main() -> Result<(), Box<dyn Error>> {
    println!("tenants_core version={}", tenants_core::core_version());

    let conn = open_db_in_memory()?;
    let facade = TenantsFacade::new(&conn);

    let inserted = facade.insert(row(&[
        ("name", Value::Text("Smoke Tenant".to_string())),
        ("slug", Value::Text("smoke".to_string())),
        ("slug_ci", Value::Text("smoke".to_string())),
    ]))?;
    println!("insert affected={inserted}");

    let id = facade
        .get_id_by_slug_ci_and_is_live("smoke", 1)?
        .ok_or("inserted tenant is not readable")?;

    let updated = facade.update_by_id(
        id,
        row(&[
            ("name", Value::Text("Smoke Tenant Renamed".to_string())),
            ("version", Value::Integer(1)),
        ]),
    )?;
    println!("update affected={updated}");

    let deleted = facade.delete_by_id(id)?;
    println!("delete affected={deleted}");

    let restored = facade.restore_by_id(id)?;
    println!("restore affected={restored}");

    let record = facade
        .get_record_by_id(id)?
        .ok_or("restored tenant is not readable")?;
    println!("tenant id={} version={}", record.id(), record.version());
    Ok(())
}

fn row(pairs: &[(&str, Value)]) -> RawRow {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect()
}
