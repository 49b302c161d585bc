//! Installation status check for one table definition.

use super::DbResult;
use crate::schema::TableDefinition;
use rusqlite::Connection;

/// Presence report for a table, its read view and expected indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaStatus {
    pub table: bool,
    pub view: bool,
    pub missing_indexes: Vec<String>,
    pub schema_version: u32,
}

impl SchemaStatus {
    /// Table, view and every expected index are present.
    pub fn is_complete(&self) -> bool {
        self.table && self.view && self.missing_indexes.is_empty()
    }
}

/// Inspects `sqlite_master` for the objects a definition expects.
pub fn schema_status(conn: &Connection, def: &TableDefinition) -> DbResult<SchemaStatus> {
    let table = object_exists(conn, "table", def.table())?;
    let view = object_exists(conn, "view", def.contract_view())?;

    let mut missing_indexes = Vec::new();
    for index in &def.indexes {
        if !table || !object_exists(conn, "index", index)? {
            missing_indexes.push(index.clone());
        }
    }

    let schema_version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;

    Ok(SchemaStatus {
        table,
        view,
        missing_indexes,
        schema_version,
    })
}

fn object_exists(conn: &Connection, kind: &str, name: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = ?1 AND name = ?2
        );",
        [kind, name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
