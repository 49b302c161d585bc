//! SQL dialect helpers: identifier quoting and row-lock clauses.

use crate::repo::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// SQL dialect spoken by an `Executor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
    MariaDb,
}

/// Lock-wait behavior for `lock_by_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    #[default]
    Wait,
    NoWait,
    SkipLocked,
}

/// Lock strength for `lock_by_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockStrength {
    /// Exclusive row lock.
    #[default]
    Update,
    /// Shared row lock.
    Share,
}

impl FromStr for LockMode {
    type Err = RepoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wait" => Ok(Self::Wait),
            "nowait" => Ok(Self::NoWait),
            "skip_locked" => Ok(Self::SkipLocked),
            other => Err(RepoError::InvalidInput(format!(
                "unsupported lock mode `{other}`; expected wait|nowait|skip_locked"
            ))),
        }
    }
}

impl FromStr for LockStrength {
    type Err = RepoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "update" => Ok(Self::Update),
            "share" => Ok(Self::Share),
            other => Err(RepoError::InvalidInput(format!(
                "unsupported lock strength `{other}`; expected update|share"
            ))),
        }
    }
}

impl Dialect {
    /// Compiles the trailing row-lock clause for a locking read.
    ///
    /// Returns `None` for SQLite: it has no row locks, so a locking read is a
    /// plain read that must run inside a caller-held `BEGIN IMMEDIATE`
    /// transaction.
    pub fn lock_clause(self, strength: LockStrength, mode: LockMode) -> Option<String> {
        let base = match (self, strength) {
            (Self::Sqlite, _) => return None,
            (_, LockStrength::Update) => "FOR UPDATE",
            (Self::Postgres | Self::MySql, LockStrength::Share) => "FOR SHARE",
            (Self::MariaDb, LockStrength::Share) => "LOCK IN SHARE MODE",
        };
        let wait = match mode {
            LockMode::Wait => "",
            LockMode::NoWait => " NOWAIT",
            LockMode::SkipLocked => " SKIP LOCKED",
        };
        Some(format!("{base}{wait}"))
    }

    /// Quote character used around identifiers.
    pub fn quote_char(self) -> char {
        match self {
            Self::Sqlite | Self::Postgres => '"',
            Self::MySql | Self::MariaDb => '`',
        }
    }
}

/// Validates and quotes one identifier (`name` or `alias.name`).
pub fn quote_ident(dialect: Dialect, ident: &str) -> RepoResult<String> {
    let quote = dialect.quote_char();
    let mut parts = Vec::new();
    for part in ident.split('.') {
        if !IDENTIFIER_RE.is_match(part) {
            return Err(RepoError::InvalidInput(format!(
                "invalid SQL identifier `{ident}`"
            )));
        }
        parts.push(format!("{quote}{part}{quote}"));
    }
    Ok(parts.join("."))
}

/// Returns whether `ident` is a plain, safe SQL identifier.
pub(crate) fn is_plain_identifier(ident: &str) -> bool {
    IDENTIFIER_RE.is_match(ident)
}

#[cfg(test)]
mod tests {
    use super::{quote_ident, Dialect, LockMode, LockStrength};

    #[test]
    fn quotes_per_dialect() {
        assert_eq!(quote_ident(Dialect::Sqlite, "tenants").unwrap(), "\"tenants\"");
        assert_eq!(quote_ident(Dialect::MySql, "t.slug").unwrap(), "`t`.`slug`");
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        assert!(quote_ident(Dialect::Postgres, "slug; DROP TABLE x").is_err());
        assert!(quote_ident(Dialect::Postgres, "").is_err());
        assert!(quote_ident(Dialect::Postgres, "1abc").is_err());
    }

    #[test]
    fn lock_clause_follows_strength_and_mode() {
        assert_eq!(
            Dialect::Postgres.lock_clause(LockStrength::Share, LockMode::NoWait),
            Some("FOR SHARE NOWAIT".to_string())
        );
        assert_eq!(
            Dialect::MySql.lock_clause(LockStrength::Update, LockMode::SkipLocked),
            Some("FOR UPDATE SKIP LOCKED".to_string())
        );
        assert_eq!(
            Dialect::MariaDb.lock_clause(LockStrength::Share, LockMode::Wait),
            Some("LOCK IN SHARE MODE".to_string())
        );
        assert_eq!(
            Dialect::Sqlite.lock_clause(LockStrength::Update, LockMode::Wait),
            None
        );
    }

    #[test]
    fn parses_lock_options() {
        assert_eq!("skip_locked".parse::<LockMode>().unwrap(), LockMode::SkipLocked);
        assert_eq!(" SHARE ".parse::<LockStrength>().unwrap(), LockStrength::Share);
        assert!("forever".parse::<LockMode>().is_err());
    }
}
