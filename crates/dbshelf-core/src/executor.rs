//! Query execution with statement-class gating
//!
//! The read entry point accepts only `Read`-class statements and the write
//! entry point only `Write`-class ones. The engine decides everything else:
//! its error messages are surfaced verbatim.

use rusqlite::{Connection, Statement};
use serde::Serialize;
use tracing::debug;

use crate::config::ShelfConfig;
use crate::error::{ShelfError, ShelfResult};
use crate::statement::{StatementClass, classify, leading_keyword, strip_trailing_semicolons};
use crate::value::{QueryParams, Row, RowSet, SqlValue};

/// Outcome of a single statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    /// Ordered rows from a row-producing statement
    Rows(RowSet),
    /// Outcome of a mutating statement
    Mutation {
        rows_affected: u64,
        /// Set for INSERT and REPLACE only
        last_insert_rowid: Option<i64>,
    },
}

impl QueryResult {
    pub fn rows_affected(&self) -> u64 {
        match self {
            QueryResult::Rows(_) => 0,
            QueryResult::Mutation { rows_affected, .. } => *rows_affected,
        }
    }
}

/// Runs SQL against an open connection
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    max_query_length: usize,
}

impl QueryExecutor {
    pub fn new(config: &ShelfConfig) -> Self {
        Self {
            max_query_length: config.max_query_length(),
        }
    }

    /// Reject SQL longer than the configured maximum, in characters
    pub fn check_length(&self, sql: &str) -> ShelfResult<()> {
        let length = sql.chars().count();
        if length > self.max_query_length {
            return Err(ShelfError::InvalidArgument(format!(
                "query is {} characters long, maximum is {}",
                length, self.max_query_length
            )));
        }
        Ok(())
    }

    /// Gate for the read entry point
    pub fn check_read(&self, sql: &str) -> ShelfResult<()> {
        let class = classify(sql);
        if class != StatementClass::Read {
            return Err(ShelfError::NotAllowed(format!(
                "read_query only accepts SELECT, PRAGMA or EXPLAIN statements, got a {} statement",
                class
            )));
        }
        Ok(())
    }

    /// Gate for the write entry point
    pub fn check_write(&self, sql: &str) -> ShelfResult<()> {
        let class = classify(sql);
        if class != StatementClass::Write {
            return Err(ShelfError::NotAllowed(format!(
                "write_query only accepts INSERT, UPDATE, DELETE or REPLACE statements, got a {} statement",
                class
            )));
        }
        Ok(())
    }

    /// Run a `Read`-class statement and return its rows
    ///
    /// # Errors
    ///
    /// `NotAllowed` for any other statement class, before the engine sees it.
    pub fn execute_read(
        &self,
        conn: &Connection,
        sql: &str,
        params: &QueryParams,
    ) -> ShelfResult<RowSet> {
        self.check_read(sql)?;
        query_rows(conn, sql, params)
    }

    /// Run a `Write`-class statement and return its mutation outcome
    ///
    /// # Errors
    ///
    /// `NotAllowed` for any other statement class, before the engine sees it.
    pub fn execute_write(
        &self,
        conn: &Connection,
        sql: &str,
        params: &QueryParams,
    ) -> ShelfResult<QueryResult> {
        self.check_write(sql)?;
        mutate(conn, sql, params)
    }

    /// Run any statement
    ///
    /// Schema and other statements report `rows_affected = 0`, unless they
    /// produce rows, in which case the rows are returned.
    pub fn execute(
        &self,
        conn: &Connection,
        sql: &str,
        params: &QueryParams,
    ) -> ShelfResult<QueryResult> {
        match classify(sql) {
            StatementClass::Read => query_rows(conn, sql, params).map(QueryResult::Rows),
            StatementClass::Write => mutate(conn, sql, params),
            class => {
                debug!(class = %class, "executing statement through generic path");
                let mut stmt = conn.prepare(strip_trailing_semicolons(sql))?;
                params.bind(&mut stmt)?;
                if stmt.column_count() > 0 {
                    return collect_rows(&mut stmt).map(QueryResult::Rows);
                }
                stmt.raw_execute()?;
                Ok(QueryResult::Mutation {
                    rows_affected: 0,
                    last_insert_rowid: None,
                })
            }
        }
    }
}

/// Prepare, bind and collect every row of a statement
pub(crate) fn query_rows(
    conn: &Connection,
    sql: &str,
    params: &QueryParams,
) -> ShelfResult<RowSet> {
    let mut stmt = conn.prepare(strip_trailing_semicolons(sql))?;
    params.bind(&mut stmt)?;
    collect_rows(&mut stmt)
}

fn collect_rows(stmt: &mut Statement<'_>) -> ShelfResult<RowSet> {
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    let mut cursor = stmt.raw_query();
    while let Some(row) = cursor.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            cells.push((column.clone(), SqlValue::from(row.get_ref(i)?)));
        }
        rows.push(Row::new(cells));
    }

    debug!(rows = rows.len(), "collected rows");
    Ok(RowSet { columns, rows })
}

fn mutate(conn: &Connection, sql: &str, params: &QueryParams) -> ShelfResult<QueryResult> {
    let mut stmt = conn.prepare(strip_trailing_semicolons(sql))?;
    params.bind(&mut stmt)?;

    let rows_affected = if stmt.column_count() > 0 {
        // RETURNING clauses produce rows; drain them so the statement completes
        let mut cursor = stmt.raw_query();
        while cursor.next()?.is_some() {}
        conn.changes() as u64
    } else {
        stmt.raw_execute()? as u64
    };

    let last_insert_rowid = match leading_keyword(sql).as_str() {
        "INSERT" | "REPLACE" => Some(conn.last_insert_rowid()),
        _ => None,
    };

    Ok(QueryResult::Mutation {
        rows_affected,
        last_insert_rowid,
    })
}
