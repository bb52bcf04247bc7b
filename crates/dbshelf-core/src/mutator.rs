//! Table and index DDL with existence pre-checks
//!
//! Each operation checks the catalog first and fails with `AlreadyExists` or
//! `NotFound` before any DDL runs. Engine errors only surface for problems
//! the pre-checks cannot see (bad column definitions and the like).

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Entity, ShelfError, ShelfResult};
use crate::schema::SchemaInspector;
use crate::statement::{created_index_names, created_table_name, strip_trailing_semicolons};
use crate::validation::{quote_identifier, validate_identifier};

/// Applies DDL to a write connection
pub struct TableMutator<'c> {
    conn: &'c Connection,
    inspector: SchemaInspector<'c>,
}

impl<'c> TableMutator<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            inspector: SchemaInspector::new(conn),
        }
    }

    /// Run a raw `CREATE TABLE` statement, returning the table name
    ///
    /// An existing table fails with `AlreadyExists` even when the statement
    /// says `IF NOT EXISTS`.
    pub fn create_table(&self, sql: &str) -> ShelfResult<String> {
        let table = created_table_name(sql)?;
        if self.inspector.object_exists(&table)? {
            return Err(ShelfError::already_exists(Entity::Table, table));
        }

        self.run(sql)?;
        debug!(table = %table, "created table");
        Ok(table)
    }

    pub fn drop_table(&self, name: &str) -> ShelfResult<()> {
        let table = self.require_table(name)?;
        self.run(&format!("DROP TABLE {}", quote_identifier(&table)))?;
        debug!(table = %table, "dropped table");
        Ok(())
    }

    pub fn rename_table(&self, name: &str, new_name: &str) -> ShelfResult<()> {
        validate_identifier(new_name)?;
        let table = self.require_table(name)?;
        if self.inspector.object_exists(new_name)? {
            return Err(ShelfError::already_exists(Entity::Table, new_name));
        }

        self.run(&format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_identifier(&table),
            quote_identifier(new_name)
        ))?;
        debug!(table = %table, new_name = %new_name, "renamed table");
        Ok(())
    }

    /// Run a raw `CREATE [UNIQUE] INDEX ... ON table` statement, returning the index name
    pub fn create_index(&self, sql: &str) -> ShelfResult<String> {
        let (index, table) = created_index_names(sql)?;
        self.require_table(&table)?;
        if self.inspector.object_exists(&index)? {
            return Err(ShelfError::already_exists(Entity::Index, index));
        }

        self.run(sql)?;
        debug!(index = %index, table = %table, "created index");
        Ok(index)
    }

    /// Create a single-column index, named `idx_{table}_{column}` unless given
    pub fn create_index_simple(
        &self,
        table: &str,
        column: &str,
        name: Option<&str>,
        unique: bool,
    ) -> ShelfResult<String> {
        validate_identifier(table)?;
        validate_identifier(column)?;
        let index = match name {
            Some(name) => name.to_string(),
            None => format!("idx_{}_{}", table, column),
        };
        validate_identifier(&index)?;

        let table = self.require_table(table)?;
        if !self.inspector.column_exists(&table, column)? {
            return Err(ShelfError::not_found(
                Entity::Column,
                format!("{}.{}", table, column),
            ));
        }
        if self.inspector.object_exists(&index)? {
            return Err(ShelfError::already_exists(Entity::Index, index));
        }

        self.run(&format!(
            "CREATE {}INDEX {} ON {} ({})",
            if unique { "UNIQUE " } else { "" },
            quote_identifier(&index),
            quote_identifier(&table),
            quote_identifier(column)
        ))?;
        debug!(index = %index, table = %table, column = %column, unique, "created index");
        Ok(index)
    }

    pub fn drop_index(&self, name: &str) -> ShelfResult<()> {
        if !self.inspector.index_exists(name)? {
            return Err(ShelfError::not_found(Entity::Index, name));
        }
        self.run(&format!("DROP INDEX {}", quote_identifier(name)))?;
        debug!(index = %name, "dropped index");
        Ok(())
    }

    fn require_table(&self, name: &str) -> ShelfResult<String> {
        self.inspector
            .find_table(name)?
            .ok_or_else(|| ShelfError::not_found(Entity::Table, name))
    }

    // `execute` prepares a single statement, so trailing extra statements are refused
    fn run(&self, sql: &str) -> ShelfResult<()> {
        self.conn.execute(strip_trailing_semicolons(sql), [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();
        conn
    }

    #[test]
    fn test_create_table_prechecks() {
        let conn = conn();
        let mutator = TableMutator::new(&conn);

        assert_eq!(
            mutator.create_table("CREATE TABLE posts (id INTEGER);").unwrap(),
            "posts"
        );
        assert!(SchemaInspector::new(&conn).table_exists("posts").unwrap());

        let err = mutator
            .create_table("CREATE TABLE IF NOT EXISTS users (id INTEGER)")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let err = mutator.create_table("DROP TABLE users").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = mutator
            .create_table("CREATE TABLE broken (id INTEGER,)")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryError);
    }

    #[test]
    fn test_create_temporary_table_is_refused() {
        let conn = conn();
        let mutator = TableMutator::new(&conn);

        for sql in [
            "CREATE TEMP TABLE scratch (x INTEGER)",
            "CREATE TEMPORARY TABLE scratch (x INTEGER)",
            "CREATE TABLE temp.scratch (x INTEGER)",
        ] {
            let err = mutator.create_table(sql).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{sql}");
        }

        let temp_objects: i64 = conn
            .query_row("SELECT COUNT(*) FROM temp.sqlite_master", [], |row| row.get(0))
            .unwrap();
        assert_eq!(temp_objects, 0);
    }

    #[test]
    fn test_create_table_refuses_trailing_statement() {
        let conn = conn();
        let err = TableMutator::new(&conn)
            .create_table("CREATE TABLE a (x); DROP TABLE users")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryError);
        assert!(SchemaInspector::new(&conn).table_exists("users").unwrap());
    }

    #[test]
    fn test_drop_and_rename() {
        let conn = conn();
        let mutator = TableMutator::new(&conn);

        assert_eq!(
            mutator.drop_table("missing").unwrap_err().kind(),
            ErrorKind::NotFound
        );

        mutator.rename_table("users", "people").unwrap();
        let inspector = SchemaInspector::new(&conn);
        assert!(inspector.table_exists("people").unwrap());
        assert!(!inspector.table_exists("users").unwrap());

        mutator
            .create_table("CREATE TABLE users (id INTEGER)")
            .unwrap();
        assert_eq!(
            mutator.rename_table("users", "people").unwrap_err().kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            mutator.rename_table("users", "bad name").unwrap_err().kind(),
            ErrorKind::InvalidName
        );

        mutator.drop_table("people").unwrap();
        assert!(!inspector.table_exists("people").unwrap());
    }

    #[test]
    fn test_index_lifecycle() {
        let conn = conn();
        let mutator = TableMutator::new(&conn);

        assert_eq!(
            mutator.create_index_simple("users", "name", None, false).unwrap(),
            "idx_users_name"
        );
        assert_eq!(
            mutator
                .create_index_simple("users", "name", None, false)
                .unwrap_err()
                .kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            mutator
                .create_index_simple("users", "nope", None, false)
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            mutator
                .create_index_simple("ghosts", "name", None, false)
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );

        assert_eq!(
            mutator
                .create_index("CREATE UNIQUE INDEX by_id ON users (id, name)")
                .unwrap(),
            "by_id"
        );
        assert_eq!(
            mutator
                .create_index("CREATE INDEX x ON ghosts (a)")
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );

        let indexes = SchemaInspector::new(&conn).list_indexes(Some("users")).unwrap();
        assert_eq!(indexes.len(), 2);
        assert!(indexes.iter().any(|i| i.name == "by_id" && i.unique));

        mutator.drop_index("by_id").unwrap();
        assert_eq!(
            mutator.drop_index("by_id").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
