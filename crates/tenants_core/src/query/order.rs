use crate::db::{quote_ident, Dialect};
use crate::repo::{RepoError, RepoResult};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl Display for OrderDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for OrderDirection {
    type Err = RepoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(RepoError::InvalidInput(format!(
                "unsupported sort direction `{other}`; expected asc|desc"
            ))),
        }
    }
}

/// One `column direction` ordering term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub direction: OrderDirection,
}

impl OrderTerm {
    pub fn new(column: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

/// Parses an `ORDER BY` body such as `created_at DESC, id`.
pub fn parse_order(spec: &str) -> RepoResult<Vec<OrderTerm>> {
    let mut terms = Vec::new();
    for part in spec.split(',') {
        let mut tokens = part.split_whitespace();
        let Some(column) = tokens.next() else {
            continue;
        };
        let direction = match tokens.next() {
            Some(token) => token.parse()?,
            None => OrderDirection::Asc,
        };
        if tokens.next().is_some() {
            return Err(RepoError::InvalidInput(format!(
                "invalid order term `{}`",
                part.trim()
            )));
        }
        terms.push(OrderTerm::new(column, direction));
    }
    Ok(terms)
}

/// Renders `ORDER BY alias.col DIR, ...`, rejecting columns outside `allowed`.
///
/// Returns an empty string for an empty term list.
pub fn render_order_by(
    dialect: Dialect,
    alias: &str,
    terms: &[OrderTerm],
    allowed: &[&str],
) -> RepoResult<String> {
    if terms.is_empty() {
        return Ok(String::new());
    }
    let mut rendered = Vec::with_capacity(terms.len());
    for term in terms {
        if !allowed.contains(&term.column.as_str()) {
            return Err(RepoError::UnknownColumn(term.column.clone()));
        }
        let column = quote_ident(dialect, &format!("{alias}.{}", term.column))?;
        rendered.push(format!("{column} {}", term.direction.as_sql()));
    }
    Ok(format!("ORDER BY {}", rendered.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::{parse_order, render_order_by, OrderDirection, OrderTerm};
    use crate::db::Dialect;
    use crate::repo::RepoError;

    #[test]
    fn parses_multi_term_order() {
        let terms = parse_order("created_at DESC, id").unwrap();
        assert_eq!(
            terms,
            vec![
                OrderTerm::new("created_at", OrderDirection::Desc),
                OrderTerm::new("id", OrderDirection::Asc),
            ]
        );
    }

    #[test]
    fn rejects_garbage_direction() {
        assert!(matches!(
            parse_order("id sideways"),
            Err(RepoError::InvalidInput(_))
        ));
    }

    #[test]
    fn renders_whitelisted_terms_only() {
        let terms = vec![OrderTerm::new("slug", OrderDirection::Desc)];
        let sql = render_order_by(Dialect::Sqlite, "t", &terms, &["slug"]).unwrap();
        assert_eq!(sql, "ORDER BY \"t\".\"slug\" DESC");

        let err = render_order_by(Dialect::Sqlite, "t", &terms, &["id"]).unwrap_err();
        assert!(matches!(err, RepoError::UnknownColumn(column) if column == "slug"));
    }
}
