use rusqlite::Connection;
use tenants_core::db::migrations::latest_version;
use tenants_core::db::{open_db, open_db_in_memory, schema_status, DbError};
use tenants_core::schema::tenants;

#[test]
fn open_db_in_memory_installs_table_view_and_indexes() {
    let conn = open_db_in_memory().unwrap();

    let status = schema_status(&conn, tenants::shared()).unwrap();
    assert!(status.table);
    assert!(status.view);
    assert!(status.missing_indexes.is_empty());
    assert_eq!(status.schema_version, latest_version());
    assert!(status.is_complete());
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tenants.db");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    assert!(schema_status(&second, tenants::shared()).unwrap().is_complete());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn status_reports_dropped_view_and_index() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "DROP VIEW vw_tenants;
         DROP INDEX ux_tenants_slug_live_ci;",
    )
    .unwrap();

    let status = schema_status(&conn, tenants::shared()).unwrap();
    assert!(status.table);
    assert!(!status.view);
    assert_eq!(status.missing_indexes, vec![tenants::UNIQUE_SLUG_LIVE_INDEX]);
    assert!(!status.is_complete());
}

#[test]
fn missing_relation_errors_are_recognized() {
    let conn = Connection::open_in_memory().unwrap();
    let err: DbError = conn
        .prepare("SELECT * FROM vw_tenants")
        .map(|_| ())
        .unwrap_err()
        .into();
    assert!(err.is_missing_relation());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}
