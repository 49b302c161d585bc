//! Keyset (seek) pagination over a read view.
//!
//! Rows are walked in `(column, pk)` order. The resume predicate is the
//! lexicographic OR-chain:
//!
//! - ascending: `col > :seek_col OR (col = :seek_col AND pk > :seek_pk)`
//! - descending: `col < :seek_col OR (col = :seek_col AND pk < :seek_pk)`
//!
//! The sort column must not hold `NULL`; `NULL` never satisfies either branch.

use super::keys::column_sql;
use super::{RepoError, RepoResult};
use crate::db::{quote_ident, Executor, RawRow, SqlParams};
use crate::query::{OrderDirection, BASE_ALIAS};
use log::debug;
use rusqlite::types::Value;

/// Sort column, direction and tie-breaking primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekOrder {
    pub column: String,
    pub direction: OrderDirection,
    pub pk: String,
}

impl SeekOrder {
    pub fn new(column: impl Into<String>, direction: OrderDirection, pk: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction,
            pk: pk.into(),
        }
    }
}

/// Resume point: sort-column and primary-key values of the last row seen.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekCursor {
    pub col_value: Value,
    pub pk_value: Value,
}

/// One seek page; `next_cursor` is `None` once the stream is exhausted.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekPage<T = RawRow> {
    pub items: Vec<T>,
    pub next_cursor: Option<SeekCursor>,
}

impl<T> SeekPage<T> {
    /// Converts every item, keeping the cursor.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<SeekPage<U>, E> {
        Ok(SeekPage {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            next_cursor: self.next_cursor,
        })
    }
}

/// Base relation and filter a seek page is cut from.
///
/// `view` is a bare relation name; `where_sql`, `join_sql` and `soft_guard`
/// reference the base alias `t`.
#[derive(Debug, Clone)]
pub struct SeekQuery<'q> {
    pub view: &'q str,
    pub where_sql: &'q str,
    pub params: SqlParams,
    pub join_sql: &'q str,
    pub soft_guard: &'q str,
}

pub struct KeysetPaginator<'a, X: Executor + ?Sized> {
    exec: &'a X,
}

impl<'a, X: Executor + ?Sized> KeysetPaginator<'a, X> {
    pub fn new(exec: &'a X) -> Self {
        Self { exec }
    }

    /// Fetches up to `limit` rows after `cursor` (or from the start).
    pub fn paginate(
        &self,
        query: SeekQuery<'_>,
        order: &SeekOrder,
        cursor: Option<&SeekCursor>,
        limit: u32,
    ) -> RepoResult<SeekPage> {
        if limit == 0 {
            return Err(RepoError::InvalidInput("seek limit must be > 0".to_string()));
        }
        let dialect = self.exec.dialect();
        let view = quote_ident(dialect, query.view)?;
        let col = column_sql(dialect, Some(BASE_ALIAS), &order.column)?;
        let pk = column_sql(dialect, Some(BASE_ALIAS), &order.pk)?;
        let dir = order.direction.as_sql();

        let mut params = query.params;
        let mut predicates = vec![
            format!("({})", query.where_sql),
            format!("({})", query.soft_guard),
        ];
        if let Some(cursor) = cursor {
            let cmp = match order.direction {
                OrderDirection::Asc => ">",
                OrderDirection::Desc => "<",
            };
            predicates.push(format!(
                "({col} {cmp} :seek_col OR ({col} = :seek_col AND {pk} {cmp} :seek_pk))"
            ));
            params.push("seek_col", cursor.col_value.clone());
            params.push("seek_pk", cursor.pk_value.clone());
        }

        let joins = if query.join_sql.is_empty() {
            String::new()
        } else {
            format!(" {}", query.join_sql)
        };
        let sql = format!(
            "SELECT {BASE_ALIAS}.* FROM {view} {BASE_ALIAS}{joins} WHERE {} \
             ORDER BY {col} {dir}, {pk} {dir} LIMIT {limit}",
            predicates.join(" AND ")
        );
        let items = self.exec.fetch_all(&sql, &params)?;

        let next_cursor = if items.len() < limit as usize {
            None
        } else {
            items
                .last()
                .map(|last| cursor_from_row(last, order))
                .transpose()?
        };
        debug!(
            "event=seek_page module=repo status=ok view={} rows={} has_next={}",
            query.view,
            items.len(),
            next_cursor.is_some()
        );
        Ok(SeekPage { items, next_cursor })
    }
}

fn cursor_from_row(row: &RawRow, order: &SeekOrder) -> RepoResult<SeekCursor> {
    let value = |column: &str| {
        row.get(column).cloned().ok_or_else(|| {
            RepoError::InvalidInput(format!("seek column `{column}` missing from page rows"))
        })
    };
    Ok(SeekCursor {
        col_value: value(&order.column)?,
        pk_value: value(&order.pk)?,
    })
}
