//! Schema installer for the tenants table and its read view.
//!
//! # Responsibility
//! - Register the table migration before the view migration that reads it.
//! - Install every pending step in one transaction and report what ran.
//!
//! # Invariants
//! - Steps are strictly ascending by version, starting at 1.
//! - The installed version lives in `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, Transaction};

#[derive(Debug, Clone, Copy)]
struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "tenants",
        sql: include_str!("0001_tenants.sql"),
    },
    Step {
        version: 2,
        name: "vw_tenants",
        sql: include_str!("0002_vw_tenants.sql"),
    },
];

/// Outcome of one `apply_migrations` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    /// Names of the steps installed by this call, in order.
    pub applied: Vec<&'static str>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Highest schema version this build can install.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Installs every step above the stored version.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database is newer than this build.
/// - `Sqlite` when a step fails; nothing from this call is kept.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<MigrationReport> {
    let from_version = stored_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Step> = STEPS
        .iter()
        .filter(|step| step.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(MigrationReport {
            from_version,
            to_version: from_version,
            applied: Vec::new(),
        });
    }

    let tx = conn.transaction()?;
    let mut applied = Vec::with_capacity(pending.len());
    for step in pending {
        install(&tx, step)?;
        applied.push(step.name);
    }
    tx.commit()?;

    Ok(MigrationReport {
        from_version,
        to_version: latest,
        applied,
    })
}

fn install(tx: &Transaction<'_>, step: &Step) -> DbResult<()> {
    tx.execute_batch(step.sql)?;
    tx.pragma_update(None, "user_version", step.version)?;
    info!(
        "event=db_migrate module=db status=ok version={} name={}",
        step.version, step.name
    );
    Ok(())
}

fn stored_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, STEPS};
    use rusqlite::Connection;

    #[test]
    fn steps_are_contiguous_from_one() {
        for (index, step) in STEPS.iter().enumerate() {
            assert_eq!(step.version as usize, index + 1);
        }
    }

    #[test]
    fn second_run_is_a_noop() {
        let mut conn = Connection::open_in_memory().unwrap();

        let first = apply_migrations(&mut conn).unwrap();
        assert_eq!(first.from_version, 0);
        assert_eq!(first.to_version, latest_version());
        assert_eq!(first.applied, vec!["tenants", "vw_tenants"]);

        let second = apply_migrations(&mut conn).unwrap();
        assert!(second.is_noop());
        assert_eq!(second.to_version, latest_version());
    }

    #[test]
    fn resumes_from_partial_install() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(super::STEPS[0].sql).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();

        let report = apply_migrations(&mut conn).unwrap();
        assert_eq!(report.applied, vec!["vw_tenants"]);
    }
}
