use rusqlite::types::Value;
use tenants_core::db::open_db_in_memory;
use tenants_core::{RawRow, Repository, TenantRecord};

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn seeded_repo_row(conn: &rusqlite::Connection) -> RawRow {
    let repo = Repository::tenants(conn);
    repo.insert(
        [
            ("name".to_string(), text("Acme")),
            ("slug".to_string(), text("Acme")),
            ("slug_ci".to_string(), text("acme")),
            ("is_live".to_string(), Value::Integer(1)),
        ]
        .into_iter()
        .collect(),
    )
    .unwrap();
    repo.find_by_id(1).unwrap().unwrap()
}

#[test]
fn stored_rows_hydrate_with_defaults() {
    let conn = open_db_in_memory().unwrap();
    let row = seeded_repo_row(&conn);

    let record = TenantRecord::from_row(&row).unwrap();
    assert_eq!(record.id(), 1);
    assert_eq!(record.slug(), "Acme");
    assert_eq!(record.slug_ci(), Some("acme"));
    assert_eq!(record.status(), "active");
    assert_eq!(record.version(), 1);
    assert_eq!(record.deleted_at(), None);
    assert!(record.created_at() <= record.updated_at());
}

#[test]
fn record_written_back_compares_equal_to_stored_row() {
    let conn = open_db_in_memory().unwrap();
    let row = seeded_repo_row(&conn);
    let record = TenantRecord::from_row(&row).unwrap();

    // Timestamps render differently but denote the same instant.
    assert!(record.diff(&row, &[]).is_empty());
}

#[test]
fn diff_against_previous_row_yields_update_payload() {
    let conn = open_db_in_memory().unwrap();
    let before = seeded_repo_row(&conn);
    let repo = Repository::tenants(&conn);
    repo.update_by_id(
        1,
        [("name".to_string(), text("Acme Corp"))]
            .into_iter()
            .collect(),
    )
    .unwrap();

    let after = TenantRecord::from_row(&repo.find_by_id(1).unwrap().unwrap()).unwrap();
    let changes = after.diff(&before, &["updated_at"]);

    assert_eq!(changes.get("name"), Some(&text("Acme Corp")));
    assert_eq!(changes.get("version"), Some(&Value::Integer(2)));
    assert!(!changes.contains_key("updated_at"));
    assert!(!changes.contains_key("slug"));
}

#[test]
fn soft_deleted_rows_hydrate_as_inactive() {
    let conn = open_db_in_memory().unwrap();
    seeded_repo_row(&conn);
    Repository::tenants(&conn).delete_by_id(1).unwrap();

    let raw: RawRow = {
        let mut stmt = conn.prepare("SELECT * FROM tenants WHERE id = 1").unwrap();
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        stmt.query_row([], |row| {
            let mut out = RawRow::new();
            for (index, name) in names.iter().enumerate() {
                out.insert(name.clone(), row.get::<_, Value>(index)?);
            }
            Ok(out)
        })
        .unwrap()
    };

    let record = TenantRecord::from_row(&raw).unwrap();
    assert!(record.deleted_at().is_some());
    assert!(!record.is_active());
    let list = TenantRecord::hydrate_list(&[raw]).unwrap();
    assert_eq!(list.len(), 1);
}

#[test]
fn json_output_uses_rfc3339_timestamps() {
    let conn = open_db_in_memory().unwrap();
    let record = TenantRecord::from_row(&seeded_repo_row(&conn)).unwrap();

    let json = serde_json::to_value(&record).unwrap();
    let created = json["created_at"].as_str().unwrap();
    assert!(created.contains('T'));
    assert_eq!(json["is_live"], serde_json::Value::Bool(true));
}
