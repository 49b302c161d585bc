//! Fluent criteria builder for repository reads.
//!
//! # Responsibility
//! - Collect filters, text search, ordering, paging and visibility.
//! - Emit alias-qualified, parameterized SQL parts.
//!
//! # Invariants
//! - Only whitelisted columns reach SQL; violations surface from `to_sql`.
//! - Parameter names are namespaced `c_{n}` and never collide.
//! - `page >= 1` and `1 <= per_page <= max_per_page`.

use super::{OrderDirection, OrderTerm, QuerySpecification, SqlParts, Visibility, BASE_ALIAS};
use crate::db::{quote_ident, Dialect, SqlParams};
use crate::model::timestamp_value;
use crate::repo::{RepoError, RepoResult};
use crate::schema::tenants;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;

/// Comparison operators accepted by `Criteria::where_op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
        }
    }
}

/// Criteria builder; implements `QuerySpecification`.
#[derive(Debug, Clone)]
pub struct Criteria {
    dialect: Dialect,
    filterable: Vec<String>,
    searchable: Vec<String>,
    sortable: Vec<String>,
    conditions: Vec<String>,
    joins: Vec<String>,
    params: SqlParams,
    order: Vec<OrderTerm>,
    page: u32,
    per_page: u32,
    max_per_page: u32,
    visibility: Visibility,
    next_param: usize,
    error: Option<BuildError>,
}

/// First builder misuse, replayed by `to_sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BuildError {
    UnknownColumn(String),
    Invalid(String),
}

impl From<BuildError> for RepoError {
    fn from(value: BuildError) -> Self {
        match value {
            BuildError::UnknownColumn(column) => Self::UnknownColumn(column),
            BuildError::Invalid(message) => Self::InvalidInput(message),
        }
    }
}

impl Criteria {
    /// Creates an empty criteria with explicit whitelists and paging limits.
    pub fn new(
        dialect: Dialect,
        filterable: &[&str],
        searchable: &[&str],
        sortable: &[&str],
        default_per_page: u32,
        max_per_page: u32,
    ) -> Self {
        let max_per_page = max_per_page.max(1);
        Self {
            dialect,
            filterable: filterable.iter().map(|c| c.to_string()).collect(),
            searchable: searchable.iter().map(|c| c.to_string()).collect(),
            sortable: if sortable.is_empty() {
                filterable.iter().map(|c| c.to_string()).collect()
            } else {
                sortable.iter().map(|c| c.to_string()).collect()
            },
            conditions: Vec::new(),
            joins: Vec::new(),
            params: SqlParams::new(),
            order: Vec::new(),
            page: 1,
            per_page: default_per_page.clamp(1, max_per_page),
            max_per_page,
            visibility: Visibility::Active,
            next_param: 0,
            error: None,
        }
    }

    /// Criteria preconfigured with the tenants whitelists and limits.
    pub fn tenants(dialect: Dialect) -> Self {
        Self::new(
            dialect,
            tenants::FILTERABLE,
            tenants::SEARCHABLE,
            tenants::SORTABLE,
            tenants::DEFAULT_PER_PAGE,
            tenants::MAX_PER_PAGE,
        )
    }

    pub fn where_eq(self, column: &str, value: Value) -> Self {
        self.where_op(column, CompareOp::Eq, value)
    }

    pub fn where_op(mut self, column: &str, op: CompareOp, value: Value) -> Self {
        let Some(column_sql) = self.filter_column(column) else {
            return self;
        };
        if value == Value::Null {
            match op {
                CompareOp::Eq => self.conditions.push(format!("{column_sql} IS NULL")),
                CompareOp::Ne => self.conditions.push(format!("{column_sql} IS NOT NULL")),
                _ => self.fail(format!("operator {} does not accept NULL", op.as_sql())),
            }
            return self;
        }
        let placeholder = self.bind(value);
        self.conditions
            .push(format!("{column_sql} {} {placeholder}", op.as_sql()));
        self
    }

    /// `column IN (...)`; an empty list matches nothing.
    pub fn where_in(mut self, column: &str, values: Vec<Value>) -> Self {
        let Some(column_sql) = self.filter_column(column) else {
            return self;
        };
        if values.is_empty() {
            self.conditions.push("1=0".to_string());
            return self;
        }
        let placeholders: Vec<String> = values.into_iter().map(|v| self.bind(v)).collect();
        self.conditions
            .push(format!("{column_sql} IN ({})", placeholders.join(",")));
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        if let Some(column_sql) = self.filter_column(column) {
            self.conditions.push(format!("{column_sql} IS NULL"));
        }
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        if let Some(column_sql) = self.filter_column(column) {
            self.conditions.push(format!("{column_sql} IS NOT NULL"));
        }
        self
    }

    /// Raw predicate with its own named parameters (names without `:`).
    pub fn where_raw(mut self, sql: impl Into<String>, params: SqlParams) -> Self {
        self.conditions.push(format!("({})", sql.into()));
        self.params.extend(params);
        self
    }

    /// Inclusive range; open ends are skipped.
    pub fn between(self, column: &str, from: Option<Value>, to: Option<Value>) -> Self {
        let criteria = match from {
            Some(value) => self.where_op(column, CompareOp::Ge, value),
            None => self,
        };
        match to {
            Some(value) => criteria.where_op(column, CompareOp::Le, value),
            None => criteria,
        }
    }

    /// Substring match across every searchable column; blank text is ignored.
    pub fn search(mut self, text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() || self.searchable.is_empty() {
            return self;
        }
        let pattern = Value::Text(format!("%{}%", like_escape(text)));
        let placeholder = self.bind(pattern);
        let like = match self.dialect {
            Dialect::Postgres => "ILIKE",
            _ => "LIKE",
        };

        let mut parts = Vec::new();
        for column in self.searchable.clone() {
            match quote_ident(self.dialect, &format!("{BASE_ALIAS}.{column}")) {
                Ok(column_sql) => {
                    parts.push(format!("{column_sql} {like} {placeholder} ESCAPE '\\'"))
                }
                Err(err) => {
                    self.fail(err.to_string());
                    return self;
                }
            }
        }
        self.conditions.push(format!("({})", parts.join(" OR ")));
        self
    }

    /// Scopes rows to one tenant partition value.
    pub fn tenant(self, value: Value, column: &str) -> Self {
        self.where_eq(column, value)
    }

    /// Adds a join fragment that references the base alias `t`.
    pub fn join_raw(mut self, sql: impl Into<String>, params: SqlParams) -> Self {
        self.joins.push(sql.into());
        self.params.extend(params);
        self
    }

    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        if !self.sortable.iter().any(|c| c == column) {
            self.fail_column(column);
            return self;
        }
        self.order.push(OrderTerm::new(column, direction));
        self
    }

    pub fn set_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Sets page size, clamped to `[1, max_per_page]`.
    pub fn set_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, self.max_per_page);
        self
    }

    pub fn with_trashed(mut self, on: bool) -> Self {
        self.visibility = if on {
            Visibility::WithTrashed
        } else {
            Visibility::Active
        };
        self
    }

    pub fn only_trashed(mut self, on: bool) -> Self {
        self.visibility = if on {
            Visibility::OnlyTrashed
        } else {
            Visibility::Active
        };
        self
    }

    pub fn by_id(self, id: i64) -> Self {
        self.where_eq("id", Value::Integer(id))
    }

    pub fn by_ids(self, ids: &[i64]) -> Self {
        self.where_in("id", ids.iter().map(|id| Value::Integer(*id)).collect())
    }

    pub fn by_status(self, status: &str) -> Self {
        self.where_eq("status", Value::Text(status.to_string()))
    }

    pub fn by_statuses(self, statuses: &[&str]) -> Self {
        self.where_in(
            "status",
            statuses
                .iter()
                .map(|status| Value::Text(status.to_string()))
                .collect(),
        )
    }

    pub fn created_between(self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.between(
            "created_at",
            from.as_ref().map(timestamp_value),
            to.as_ref().map(timestamp_value),
        )
    }

    pub fn updated_since(self, since: DateTime<Utc>) -> Self {
        self.where_op("updated_at", CompareOp::Ge, timestamp_value(&since))
    }

    pub fn by_slug(self, slug: &str) -> Self {
        self.where_eq("slug", Value::Text(slug.to_string()))
    }

    fn filter_column(&mut self, column: &str) -> Option<String> {
        if !self.filterable.iter().any(|c| c == column) {
            self.fail_column(column);
            return None;
        }
        match quote_ident(self.dialect, &format!("{BASE_ALIAS}.{column}")) {
            Ok(sql) => Some(sql),
            Err(err) => {
                self.fail(err.to_string());
                None
            }
        }
    }

    fn bind(&mut self, value: Value) -> String {
        let name = format!("c_{}", self.next_param);
        self.next_param += 1;
        let placeholder = format!(":{name}");
        self.params.push(name, value);
        placeholder
    }

    fn fail(&mut self, message: String) {
        self.error.get_or_insert(BuildError::Invalid(message));
    }

    fn fail_column(&mut self, column: &str) {
        self.error
            .get_or_insert_with(|| BuildError::UnknownColumn(column.to_string()));
    }
}

impl QuerySpecification for Criteria {
    fn to_sql(&self, include_joins: bool) -> RepoResult<SqlParts> {
        if let Some(err) = &self.error {
            return Err(err.clone().into());
        }
        let where_sql = if self.conditions.is_empty() {
            "1=1".to_string()
        } else {
            self.conditions.join(" AND ")
        };
        let join_sql = if include_joins {
            self.joins.join(" ")
        } else {
            String::new()
        };
        Ok(SqlParts {
            where_sql,
            params: self.params.clone(),
            order: self.order.clone(),
            limit: self.per_page,
            offset: u64::from(self.page - 1) * u64::from(self.per_page),
            join_sql,
        })
    }

    fn page(&self) -> u32 {
        self.page
    }

    fn per_page(&self) -> u32 {
        self.per_page
    }

    fn visibility(&self) -> Visibility {
        self.visibility
    }

    fn paged(&self, page: u32, per_page: u32) -> Self {
        self.clone().set_page(page).set_per_page(per_page)
    }
}

fn like_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
