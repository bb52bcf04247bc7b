//! Offset/limit pagination and row counting over arbitrary SELECT queries
//!
//! The base query text is wrapped, never rewritten: the count runs as
//! `SELECT COUNT(*) FROM (base)` and the page as `base LIMIT n OFFSET m`, so
//! the page contents are exactly the underlying query's rows in its own order.

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::config::ShelfConfig;
use crate::error::{Entity, ShelfError, ShelfResult};
use crate::executor::query_rows;
use crate::schema::SchemaInspector;
use crate::statement::{
    StatementClass, classify, has_statement_separator, has_top_level_limit, leading_keyword,
    strip_trailing_semicolons,
};
use crate::validation::quote_identifier;
use crate::value::{QueryParams, Row};

/// One page of a query's rows plus paging totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub page: u64,
    pub page_size: u64,
    pub total_rows: u64,
    pub total_pages: u64,
}

/// Computes pages within the configured page-size limit
#[derive(Debug, Clone)]
pub struct Paginator {
    max_page_size: u64,
}

impl Paginator {
    pub fn new(config: &ShelfConfig) -> Self {
        Self {
            max_page_size: config.max_page_size(),
        }
    }

    /// Return page `page` (1-based) of `base_query`
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for `page < 1`, `page_size < 1`, a page size above
    ///   the configured maximum, a base query with its own LIMIT/OFFSET, or
    ///   one holding more than one statement
    /// - `NotAllowed` if the base query is not a SELECT
    pub fn paginate(
        &self,
        conn: &Connection,
        base_query: &str,
        params: &QueryParams,
        page: i64,
        page_size: i64,
    ) -> ShelfResult<PaginatedResult> {
        let (page, page_size) = self.check_bounds(page, page_size)?;
        let base = select_base(base_query)?;
        if has_top_level_limit(base) {
            return Err(ShelfError::InvalidArgument(
                "paginated queries must not contain their own LIMIT or OFFSET".to_string(),
            ));
        }

        let offset = (page - 1).checked_mul(page_size).ok_or_else(|| {
            ShelfError::InvalidArgument("page offset is out of range".to_string())
        })?;
        if offset > i64::MAX as u64 {
            return Err(ShelfError::InvalidArgument(
                "page offset is out of range".to_string(),
            ));
        }

        let total_rows = count_rows(conn, base, params)?;
        let total_pages = if total_rows == 0 {
            0
        } else {
            total_rows.div_ceil(page_size)
        };

        // Newline so a trailing line comment cannot swallow the clause
        let paged = format!("{}\nLIMIT {} OFFSET {}", base, page_size, offset);
        let set = query_rows(conn, &paged, params)?;

        debug!(page, page_size, total_rows, returned = set.rows.len(), "paginated query");

        Ok(PaginatedResult {
            columns: set.columns,
            rows: set.rows,
            page,
            page_size,
            total_rows,
            total_pages,
        })
    }

    fn check_bounds(&self, page: i64, page_size: i64) -> ShelfResult<(u64, u64)> {
        if page < 1 {
            return Err(ShelfError::InvalidArgument(format!(
                "page must be at least 1, got {}",
                page
            )));
        }
        if page_size < 1 {
            return Err(ShelfError::InvalidArgument(format!(
                "page_size must be at least 1, got {}",
                page_size
            )));
        }
        let (page, page_size) = (page as u64, page_size as u64);
        if page_size > self.max_page_size {
            return Err(ShelfError::InvalidArgument(format!(
                "page_size {} exceeds the maximum of {}",
                page_size, self.max_page_size
            )));
        }
        Ok((page, page_size))
    }
}

/// Count the rows of a table (by name) or of a SELECT statement
///
/// # Errors
///
/// - `NotFound` if a bare name does not match an existing table
/// - `NotAllowed` for statements other than SELECT
pub fn row_count(conn: &Connection, sql_or_table: &str, params: &QueryParams) -> ShelfResult<u64> {
    let input = sql_or_table.trim();

    if leading_keyword(input) == "SELECT" {
        return count_rows(conn, select_base(input)?, params);
    }
    if classify(input) != StatementClass::Other {
        return Err(ShelfError::NotAllowed(
            "row_count accepts a table name or a SELECT statement".to_string(),
        ));
    }

    let table = SchemaInspector::new(conn)
        .find_table(input)?
        .ok_or_else(|| ShelfError::not_found(Entity::Table, input))?;
    count_rows(
        conn,
        &format!("SELECT * FROM {}", quote_identifier(&table)),
        &QueryParams::None,
    )
}

fn select_base(base_query: &str) -> ShelfResult<&str> {
    let base = strip_trailing_semicolons(base_query.trim_start());
    if leading_keyword(base) != "SELECT" {
        return Err(ShelfError::NotAllowed(
            "paginated queries must be SELECT statements".to_string(),
        ));
    }
    if has_statement_separator(base) {
        return Err(ShelfError::InvalidArgument(
            "expected a single SELECT statement".to_string(),
        ));
    }
    Ok(base)
}

fn count_rows(conn: &Connection, base: &str, params: &QueryParams) -> ShelfResult<u64> {
    let counted = format!("SELECT COUNT(*) FROM (\n{}\n)", base);
    let set = query_rows(conn, &counted, params)?;

    let count = set
        .rows
        .first()
        .and_then(|row| row.values().next())
        .and_then(|value| value.as_i64())
        .ok_or_else(|| ShelfError::Query("count query returned no value".to_string()))?;

    Ok(count.max(0) as u64)
}
