use crate::db::is_plain_identifier;
use crate::repo::{RepoError, RepoResult};
use serde::{Deserialize, Serialize};

/// Value kind of one column; selects casting and comparison rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Int,
    Float,
    Text,
    Bool,
    Timestamp,
    Json,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

/// One known column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    #[serde(default)]
    pub nullable: bool,
    /// Computed by the database; never written.
    #[serde(default)]
    pub generated: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            generated: false,
        }
    }

    pub fn nullable(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            generated: false,
        }
    }

    /// A database-computed column. Readable, filterable, never written.
    pub fn generated(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            generated: true,
            ..Self::nullable(name, kind)
        }
    }
}

/// Schema description for one versioned, optionally soft-deletable table.
///
/// Loaded either from code (see `schema::tenants::definition`) or from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub table: String,
    pub contract_view: String,
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub unique_keys: Vec<Vec<String>>,
    #[serde(default)]
    pub soft_delete_column: Option<String>,
    #[serde(default)]
    pub version_column: Option<String>,
    #[serde(default)]
    pub updated_at_column: Option<String>,
    pub columns: Vec<ColumnDef>,
    /// Fallback `ORDER BY` body, e.g. `created_at DESC, id DESC`.
    #[serde(default)]
    pub default_order: Option<String>,
    /// Index names expected after installation.
    #[serde(default)]
    pub indexes: Vec<String>,
}

impl TableDefinition {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn contract_view(&self) -> &str {
        &self.contract_view
    }

    pub fn pk(&self) -> &[String] {
        &self.primary_key
    }

    pub fn unique_keys(&self) -> &[Vec<String>] {
        &self.unique_keys
    }

    pub fn soft_delete_column(&self) -> Option<&str> {
        self.soft_delete_column.as_deref()
    }

    pub fn version_column(&self) -> Option<&str> {
        self.version_column.as_deref()
    }

    pub fn updated_at_column(&self) -> Option<&str> {
        self.updated_at_column.as_deref()
    }

    pub fn default_order(&self) -> Option<&str> {
        self.default_order.as_deref()
    }

    /// Known column names in declaration order.
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Known and not computed by the database.
    pub fn is_writable(&self, name: &str) -> bool {
        self.column(name).is_some_and(|column| !column.generated)
    }

    pub fn is_generated(&self, name: &str) -> bool {
        self.column(name).is_some_and(|column| column.generated)
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.column(name).map(|column| column.kind)
    }

    /// Whether the version column can be bumped with `version = version + 1`.
    pub fn is_numeric_version(&self) -> bool {
        self.version_column()
            .and_then(|column| self.column_kind(column))
            .is_some_and(ColumnKind::is_numeric)
    }

    /// Checks identifier safety and that every referenced column is known.
    pub fn validate(&self) -> RepoResult<()> {
        for name in [&self.table, &self.contract_view] {
            if !is_plain_identifier(name) {
                return Err(RepoError::InvalidInput(format!(
                    "invalid table/view identifier `{name}`"
                )));
            }
        }
        for column in &self.columns {
            if !is_plain_identifier(&column.name) {
                return Err(RepoError::InvalidInput(format!(
                    "invalid column identifier `{}`",
                    column.name
                )));
            }
        }
        if self.primary_key.is_empty() {
            return Err(RepoError::InvalidInput(format!(
                "table `{}` declares no primary key",
                self.table
            )));
        }

        let referenced = self
            .primary_key
            .iter()
            .chain(self.unique_keys.iter().flatten())
            .map(String::as_str)
            .chain(self.soft_delete_column())
            .chain(self.version_column())
            .chain(self.updated_at_column());
        for column in referenced {
            if !self.has_column(column) {
                return Err(RepoError::UnknownColumn(column.to_string()));
            }
        }

        let written = self
            .primary_key
            .iter()
            .map(String::as_str)
            .chain(self.soft_delete_column())
            .chain(self.version_column())
            .chain(self.updated_at_column());
        for column in written {
            if self.is_generated(column) {
                return Err(RepoError::InvalidInput(format!(
                    "generated column `{column}` cannot be a key or marker column"
                )));
            }
        }
        Ok(())
    }
}
