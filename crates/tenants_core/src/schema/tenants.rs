//! Schema definition for the `tenants` table and its `vw_tenants` read view.

use super::{ColumnDef, ColumnKind, TableDefinition};
use once_cell::sync::Lazy;

static DEFINITION: Lazy<TableDefinition> = Lazy::new(definition);

pub const TABLE: &str = "tenants";
pub const CONTRACT_VIEW: &str = "vw_tenants";
pub const UNIQUE_SLUG_LIVE_INDEX: &str = "ux_tenants_slug_live_ci";

/// Builds the tenants table definition.
pub fn definition() -> TableDefinition {
    TableDefinition {
        table: TABLE.to_string(),
        contract_view: CONTRACT_VIEW.to_string(),
        primary_key: vec!["id".to_string()],
        unique_keys: vec![vec!["slug_ci".to_string(), "is_live".to_string()]],
        soft_delete_column: Some("deleted_at".to_string()),
        version_column: Some("version".to_string()),
        updated_at_column: Some("updated_at".to_string()),
        columns: vec![
            ColumnDef::new("id", ColumnKind::Int),
            ColumnDef::new("name", ColumnKind::Text),
            ColumnDef::new("slug", ColumnKind::Text),
            ColumnDef::nullable("slug_ci", ColumnKind::Text),
            ColumnDef::new("status", ColumnKind::Text),
            ColumnDef::new("created_at", ColumnKind::Timestamp),
            ColumnDef::new("updated_at", ColumnKind::Timestamp),
            ColumnDef::new("version", ColumnKind::Int),
            ColumnDef::nullable("deleted_at", ColumnKind::Timestamp),
            ColumnDef::generated("is_live", ColumnKind::Bool),
        ],
        default_order: Some("created_at DESC, id DESC".to_string()),
        indexes: vec![UNIQUE_SLUG_LIVE_INDEX.to_string()],
    }
}

/// Process-wide tenants definition.
pub fn shared() -> &'static TableDefinition {
    &DEFINITION
}

/// Columns safe to use inside criteria filters.
pub const FILTERABLE: &[&str] = &[
    "id",
    "name",
    "slug",
    "slug_ci",
    "status",
    "created_at",
    "updated_at",
    "version",
    "deleted_at",
    "is_live",
];

/// Columns matched by criteria text search.
pub const SEARCHABLE: &[&str] = &["name", "slug", "slug_ci"];

/// Columns allowed in criteria ordering.
pub const SORTABLE: &[&str] = FILTERABLE;

pub const DEFAULT_PER_PAGE: u32 = 50;
pub const MAX_PER_PAGE: u32 = 500;

#[cfg(test)]
mod tests {
    use super::definition;

    #[test]
    fn tenants_definition_is_valid() {
        let def = definition();
        def.validate().unwrap();
        assert!(def.is_numeric_version());
        assert_eq!(def.unique_keys()[0], vec!["slug_ci", "is_live"]);
        assert!(def.is_generated("is_live"));
    }
}
