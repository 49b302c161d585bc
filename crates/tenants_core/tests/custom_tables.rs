use rusqlite::types::Value;
use rusqlite::Connection;
use tenants_core::{
    ColumnDef, ColumnKind, RawRow, RecordId, RepoError, RepoOptions, Repository, TableDefinition,
};

fn row(pairs: &[(&str, Value)]) -> RawRow {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect()
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

/// Composite-key table without a soft-delete marker.
fn memberships() -> (Connection, TableDefinition) {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE memberships (
             org_id INTEGER NOT NULL,
             user_id INTEGER NOT NULL,
             role TEXT NOT NULL,
             version INTEGER NOT NULL DEFAULT 1,
             PRIMARY KEY (org_id, user_id)
         );
         CREATE VIEW vw_memberships AS SELECT * FROM memberships;",
    )
    .unwrap();
    let def = TableDefinition {
        table: "memberships".to_string(),
        contract_view: "vw_memberships".to_string(),
        primary_key: vec!["org_id".to_string(), "user_id".to_string()],
        unique_keys: Vec::new(),
        soft_delete_column: None,
        version_column: Some("version".to_string()),
        updated_at_column: None,
        columns: vec![
            ColumnDef::new("org_id", ColumnKind::Int),
            ColumnDef::new("user_id", ColumnKind::Int),
            ColumnDef::new("role", ColumnKind::Text),
            ColumnDef::new("version", ColumnKind::Int),
        ],
        default_order: Some("org_id ASC, user_id ASC".to_string()),
        indexes: Vec::new(),
    };
    def.validate().unwrap();
    (conn, def)
}

fn member(org: i64, user: i64) -> RecordId {
    RecordId::from(row(&[
        ("org_id", Value::Integer(org)),
        ("user_id", Value::Integer(user)),
    ]))
}

fn seed_members(repo: &Repository<'_, Connection>) {
    repo.insert_many(vec![
        row(&[("org_id", Value::Integer(1)), ("user_id", Value::Integer(10)), ("role", text("owner"))]),
        row(&[("org_id", Value::Integer(1)), ("user_id", Value::Integer(11)), ("role", text("member"))]),
        row(&[("org_id", Value::Integer(2)), ("user_id", Value::Integer(10)), ("role", text("member"))]),
    ])
    .unwrap();
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn delete_without_marker_column_removes_the_row() {
    let (conn, def) = memberships();
    let repo = Repository::new(&conn, &def);
    seed_members(&repo);

    assert_eq!(repo.delete_by_id(member(1, 11)).unwrap(), 1);

    assert_eq!(count(&conn, "memberships"), 2);
    assert!(repo.find_by_id(member(1, 11)).unwrap().is_none());
    assert_eq!(repo.delete_by_id(member(1, 11)).unwrap(), 0);
}

#[test]
fn restore_without_marker_column_is_zero() {
    let (conn, def) = memberships();
    let repo = Repository::new(&conn, &def);
    seed_members(&repo);
    repo.delete_by_id(member(2, 10)).unwrap();

    assert_eq!(repo.restore_by_id(member(2, 10)).unwrap(), 0);
    assert_eq!(repo.restore_by_id(member(1, 10)).unwrap(), 0);
    assert_eq!(count(&conn, "memberships"), 2);
}

#[test]
fn composite_ids_batch_read_through_or_branches() {
    let (conn, def) = memberships();
    let repo = Repository::new(&conn, &def);
    seed_members(&repo);
    repo.delete_by_id(member(1, 11)).unwrap();

    let mut found: Vec<(i64, i64)> = repo
        .find_all_by_ids(&[member(1, 10), member(1, 11), member(2, 10)])
        .unwrap()
        .iter()
        .map(|row| match (row.get("org_id"), row.get("user_id")) {
            (Some(Value::Integer(org)), Some(Value::Integer(user))) => (*org, *user),
            other => panic!("unexpected key: {other:?}"),
        })
        .collect();
    found.sort_unstable();
    assert_eq!(found, vec![(1, 10), (2, 10)]);
}

#[test]
fn composite_ids_accept_camel_case_keys() {
    let (conn, def) = memberships();
    let repo = Repository::new(&conn, &def);
    seed_members(&repo);

    let id = RecordId::from(row(&[("orgId", Value::Integer(2)), ("userId", Value::Integer(10))]));
    let found = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(found.get("role"), Some(&text("member")));
}

#[test]
fn composite_update_checks_the_version() {
    let (conn, def) = memberships();
    let repo = Repository::new(&conn, &def);
    seed_members(&repo);
    let change = || row(&[("role", text("admin")), ("version", Value::Integer(1))]);

    assert_eq!(repo.update_by_id(member(1, 11), change()).unwrap(), 1);
    assert_eq!(repo.update_by_id(member(1, 11), change()).unwrap(), 0);

    let stored = repo.find_by_id(member(1, 11)).unwrap().unwrap();
    assert_eq!(stored.get("role"), Some(&text("admin")));
    assert_eq!(stored.get("version"), Some(&Value::Integer(2)));
    // The sibling sharing org_id is untouched.
    let sibling = repo.find_by_id(member(1, 10)).unwrap().unwrap();
    assert_eq!(sibling.get("version"), Some(&Value::Integer(1)));
}

#[test]
fn composite_table_rejects_scalar_ids() {
    let (conn, def) = memberships();
    let repo = Repository::new(&conn, &def);

    assert!(matches!(repo.delete_by_id(1), Err(RepoError::InvalidInput(_))));
    assert!(matches!(
        repo.update_by_id(1, row(&[("role", text("x"))])),
        Err(RepoError::InvalidInput(_))
    ));
}

#[test]
fn failing_insert_chunk_keeps_earlier_chunks_and_skips_later_ones() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);
         CREATE VIEW vw_notes AS SELECT * FROM notes;",
    )
    .unwrap();
    let def = TableDefinition {
        table: "notes".to_string(),
        contract_view: "vw_notes".to_string(),
        primary_key: vec!["id".to_string()],
        unique_keys: Vec::new(),
        soft_delete_column: None,
        version_column: None,
        updated_at_column: None,
        columns: vec![
            ColumnDef::new("id", ColumnKind::Int),
            ColumnDef::new("body", ColumnKind::Text),
        ],
        default_order: None,
        indexes: Vec::new(),
    };
    // Two columns under a four-parameter ceiling: two rows per statement.
    let repo = Repository::new(&conn, &def).with_options(RepoOptions {
        max_params: 4,
        ..RepoOptions::default()
    });
    let note = |id: i64| row(&[("id", Value::Integer(id)), ("body", text(&format!("note {id}")))]);

    let err = repo
        .insert_many(vec![note(1), note(2), note(3), note(1), note(5)])
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));

    let stored: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT id FROM notes ORDER BY id").unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    };
    assert_eq!(stored, vec![1, 2]);
}
