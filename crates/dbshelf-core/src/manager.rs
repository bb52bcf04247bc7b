//! The operation facade
//!
//! Every operation follows the same pipeline: pick the database name (or the
//! configured default), check the SQL length, resolve the name, open a scoped
//! connection, run the component, record the outcome in the query log, and
//! release the connection.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::backup::{BackupArtifact, BackupManager};
use crate::config::ShelfConfig;
use crate::connection::{AccessMode, ConnectionProvider, ScopedConnection};
use crate::error::{ShelfError, ShelfResult};
use crate::executor::{QueryExecutor, QueryResult};
use crate::files::{DatabaseFile, DatabaseFiles};
use crate::health::HealthReport;
use crate::mutator::TableMutator;
use crate::pagination::{PaginatedResult, Paginator, row_count};
use crate::path::{Existence, PathResolver};
use crate::query_log::QueryLogger;
use crate::schema::{IndexDescriptor, ObjectKind, SchemaInspector, SchemaObject, TableDescriptor};
use crate::value::{QueryParams, RowSet};

/// Entry point for every database management operation
#[derive(Debug, Clone)]
pub struct DatabaseManager {
    config: Arc<ShelfConfig>,
    databases: PathResolver,
    provider: ConnectionProvider,
    executor: QueryExecutor,
    paginator: Paginator,
    files: DatabaseFiles,
    backups: BackupManager,
    log: QueryLogger,
}

impl DatabaseManager {
    pub fn new(config: Arc<ShelfConfig>) -> Self {
        Self {
            databases: PathResolver::databases(&config),
            provider: ConnectionProvider::new(&config),
            executor: QueryExecutor::new(&config),
            paginator: Paginator::new(&config),
            files: DatabaseFiles::new(&config),
            backups: BackupManager::new(&config),
            log: QueryLogger::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &ShelfConfig {
        &self.config
    }

    // Database files

    pub fn list_database_files(&self) -> ShelfResult<Vec<DatabaseFile>> {
        self.files.list()
    }

    pub fn create_database_file(&self, name: &str) -> ShelfResult<DatabaseFile> {
        let result = self.files.create(name);
        self.record("create_database_file", name, None, &result);
        result
    }

    pub fn delete_database_file(&self, name: &str) -> ShelfResult<()> {
        let result = self.files.delete(name);
        self.record("delete_database_file", name, None, &result);
        result
    }

    pub fn rename_database_file(&self, name: &str, new_name: &str) -> ShelfResult<DatabaseFile> {
        let result = self.files.rename(name, new_name);
        self.record("rename_database_file", name, None, &result);
        result
    }

    // Queries

    /// Run a SELECT, PRAGMA or EXPLAIN statement on a read-only connection
    pub fn read_query(
        &self,
        db_name: Option<&str>,
        sql: &str,
        params: &QueryParams,
    ) -> ShelfResult<RowSet> {
        self.run("read_query", db_name, Some(sql), |name| {
            self.executor.check_read(sql)?;
            let conn = self.connect(name, AccessMode::Read)?;
            self.executor.execute_read(&conn, sql, params)
        })
    }

    /// Run an INSERT, UPDATE, DELETE or REPLACE statement
    pub fn write_query(
        &self,
        db_name: Option<&str>,
        sql: &str,
        params: &QueryParams,
    ) -> ShelfResult<QueryResult> {
        self.run("write_query", db_name, Some(sql), |name| {
            self.executor.check_write(sql)?;
            let conn = self.connect(name, AccessMode::Write)?;
            self.executor.execute_write(&conn, sql, params)
        })
    }

    pub fn read_query_paginated(
        &self,
        db_name: Option<&str>,
        sql: &str,
        params: &QueryParams,
        page: i64,
        page_size: i64,
    ) -> ShelfResult<PaginatedResult> {
        self.run("read_query_paginated", db_name, Some(sql), |name| {
            let conn = self.connect(name, AccessMode::Read)?;
            self.paginator.paginate(&conn, sql, params, page, page_size)
        })
    }

    /// Count the rows of a table or of a SELECT statement
    pub fn row_count(
        &self,
        db_name: Option<&str>,
        sql_or_table: &str,
        params: &QueryParams,
    ) -> ShelfResult<u64> {
        self.run("row_count", db_name, Some(sql_or_table), |name| {
            let conn = self.connect(name, AccessMode::Read)?;
            row_count(&conn, sql_or_table, params)
        })
    }

    // Tables

    pub fn create_table(&self, db_name: Option<&str>, sql: &str) -> ShelfResult<String> {
        self.run("create_table", db_name, Some(sql), |name| {
            let conn = self.connect(name, AccessMode::Write)?;
            TableMutator::new(&conn).create_table(sql)
        })
    }

    pub fn drop_table(&self, db_name: Option<&str>, table: &str) -> ShelfResult<()> {
        self.run("drop_table", db_name, None, |name| {
            let conn = self.connect(name, AccessMode::Write)?;
            TableMutator::new(&conn).drop_table(table)
        })
    }

    pub fn rename_table(
        &self,
        db_name: Option<&str>,
        table: &str,
        new_name: &str,
    ) -> ShelfResult<()> {
        self.run("rename_table", db_name, None, |name| {
            let conn = self.connect(name, AccessMode::Write)?;
            TableMutator::new(&conn).rename_table(table, new_name)
        })
    }

    pub fn table_exists(&self, db_name: Option<&str>, table: &str) -> ShelfResult<bool> {
        self.run("table_exists", db_name, None, |name| {
            let conn = self.connect(name, AccessMode::Read)?;
            SchemaInspector::new(&conn).table_exists(table)
        })
    }

    pub fn list_tables(
        &self,
        db_name: Option<&str>,
        kind: Option<ObjectKind>,
    ) -> ShelfResult<Vec<SchemaObject>> {
        self.run("list_tables", db_name, None, |name| {
            let conn = self.connect(name, AccessMode::Read)?;
            SchemaInspector::new(&conn).list_objects(kind)
        })
    }

    pub fn describe_table(
        &self,
        db_name: Option<&str>,
        table: &str,
    ) -> ShelfResult<TableDescriptor> {
        self.run("describe_table", db_name, None, |name| {
            let conn = self.connect(name, AccessMode::Read)?;
            SchemaInspector::new(&conn).describe_table(table)
        })
    }

    pub fn export_schema(&self, db_name: Option<&str>) -> ShelfResult<Vec<String>> {
        self.run("export_schema", db_name, None, |name| {
            let conn = self.connect(name, AccessMode::Read)?;
            SchemaInspector::new(&conn).export_schema()
        })
    }

    // Indexes

    pub fn create_index(&self, db_name: Option<&str>, sql: &str) -> ShelfResult<String> {
        self.run("create_index", db_name, Some(sql), |name| {
            let conn = self.connect(name, AccessMode::Write)?;
            TableMutator::new(&conn).create_index(sql)
        })
    }

    pub fn create_index_simple(
        &self,
        db_name: Option<&str>,
        table: &str,
        column: &str,
        index_name: Option<&str>,
        unique: bool,
    ) -> ShelfResult<String> {
        self.run("create_index_simple", db_name, None, |name| {
            let conn = self.connect(name, AccessMode::Write)?;
            TableMutator::new(&conn).create_index_simple(table, column, index_name, unique)
        })
    }

    pub fn drop_index(&self, db_name: Option<&str>, index_name: &str) -> ShelfResult<()> {
        self.run("drop_index", db_name, None, |name| {
            let conn = self.connect(name, AccessMode::Write)?;
            TableMutator::new(&conn).drop_index(index_name)
        })
    }

    pub fn list_indexes(
        &self,
        db_name: Option<&str>,
        table: Option<&str>,
    ) -> ShelfResult<Vec<IndexDescriptor>> {
        self.run("list_indexes", db_name, None, |name| {
            let conn = self.connect(name, AccessMode::Read)?;
            SchemaInspector::new(&conn).list_indexes(table)
        })
    }

    // Backups

    pub fn backup_database(&self, db_name: Option<&str>) -> ShelfResult<BackupArtifact> {
        self.run("backup_database", db_name, None, |name| self.backups.backup(name))
    }

    /// Restore an artifact, by default over the database it was taken from
    pub fn restore_database(
        &self,
        artifact: &str,
        target: Option<&str>,
        overwrite: bool,
    ) -> ShelfResult<DatabaseFile> {
        let parsed = self.backups.parse_name(artifact)?;
        let target = target.unwrap_or(parsed.source());

        let result = self.backups.restore(artifact, target, overwrite);
        self.record("restore_database", target, None, &result);
        result
    }

    /// Artifacts newest first; `db_name = None` lists every database's artifacts
    pub fn list_backups(
        &self,
        db_name: Option<&str>,
        verify: bool,
    ) -> ShelfResult<Vec<BackupArtifact>> {
        self.backups.list(db_name, verify)
    }

    pub fn verify_backup(&self, artifact: &str) -> ShelfResult<bool> {
        let result = self.backups.verify(artifact);
        self.record_artifact("verify_backup", artifact, &result);
        result
    }

    pub fn delete_backup(&self, artifact: &str) -> ShelfResult<()> {
        let result = self.backups.delete(artifact);
        self.record_artifact("delete_backup", artifact, &result);
        result
    }

    pub fn health_check(&self) -> HealthReport {
        HealthReport::assess(&self.config, &self.files)
    }

    fn database_name<'a>(&'a self, db_name: Option<&'a str>) -> ShelfResult<&'a str> {
        db_name
            .filter(|name| !name.is_empty())
            .or(self.config.default_database())
            .ok_or_else(|| {
                ShelfError::InvalidArgument(
                    "db_name is required when no default database is configured".to_string(),
                )
            })
    }

    fn connect(&self, name: &str, mode: AccessMode) -> ShelfResult<ScopedConnection> {
        let target = self.databases.resolve(name, Existence::MustExist)?;
        self.provider.open(&target, mode)
    }

    fn run<T, F>(&self, tool: &str, db_name: Option<&str>, query: Option<&str>, op: F) -> ShelfResult<T>
    where
        T: Serialize,
        F: FnOnce(&str) -> ShelfResult<T>,
    {
        let name = self.database_name(db_name)?;
        debug!(tool = %tool, db = %name, "running operation");

        let result = match query {
            Some(sql) => self.executor.check_length(sql),
            None => Ok(()),
        }
        .and_then(|()| op(name));

        self.record(tool, name, query, &result);
        result
    }

    fn record<T: Serialize>(
        &self,
        tool: &str,
        db_name: &str,
        query: Option<&str>,
        result: &ShelfResult<T>,
    ) {
        if let Err(e) = result {
            debug!(tool = %tool, db = %db_name, kind = %e.kind(), error = %e, "operation failed");
        }
        // Never derive a log file name from a name that failed validation
        if self.databases.validate(db_name).is_ok() {
            self.log.record(db_name, tool, query, result);
        }
    }

    fn record_artifact<T: Serialize>(&self, tool: &str, artifact: &str, result: &ShelfResult<T>) {
        if let Ok(parsed) = self.backups.parse_name(artifact) {
            self.record(tool, parsed.source(), None, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShelfConfigBuilder;
    use crate::error::ErrorKind;
    use crate::value::SqlValue;
    use tempfile::tempdir;

    fn manager(dir: &std::path::Path) -> DatabaseManager {
        let config = ShelfConfigBuilder::new()
            .database_dir(dir)
            .query_logging(true)
            .build()
            .unwrap();
        DatabaseManager::new(Arc::new(config))
    }

    #[test]
    fn test_default_database() {
        let dir = tempdir().unwrap();
        let config = ShelfConfigBuilder::new()
            .database_dir(dir.path())
            .default_database("main.db")
            .build()
            .unwrap();
        let manager = DatabaseManager::new(Arc::new(config));
        manager.create_database_file("main.db").unwrap();

        let rows = manager
            .read_query(None, "SELECT 1 AS one", &QueryParams::None)
            .unwrap();
        assert_eq!(rows.rows[0].get("one"), Some(&SqlValue::Integer(1)));

        let without_default = self::manager(dir.path());
        let err = without_default
            .read_query(None, "SELECT 1", &QueryParams::None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_read_gate_runs_before_open() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());

        let err = manager
            .read_query(Some("absent.db"), "DELETE FROM t", &QueryParams::None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAllowed);
        assert!(!dir.path().join("absent.db").exists());
    }

    #[test]
    fn test_queries_never_create_files() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());

        let err = manager
            .write_query(Some("ghost.db"), "INSERT INTO t VALUES (1)", &QueryParams::None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!dir.path().join("ghost.db").exists());
    }

    #[test]
    fn test_operations_are_logged() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());
        manager.create_database_file("t.db").unwrap();
        manager
            .create_table(Some("t.db"), "CREATE TABLE a (x INTEGER)")
            .unwrap();
        let _ = manager.read_query(Some("t.db"), "DELETE FROM a", &QueryParams::None);
        let _ = manager.read_query(Some("../evil.db"), "SELECT 1", &QueryParams::None);

        let log = std::fs::read_to_string(manager.config().logs_dir().join("t.db.log")).unwrap();
        let tools: Vec<String> = log
            .lines()
            .map(|line| {
                let entry: serde_json::Value = serde_json::from_str(line).unwrap();
                entry["tool"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(tools, ["create_database_file", "create_table", "read_query"]);

        let entries = std::fs::read_dir(manager.config().logs_dir()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_long_query_rejected() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());
        manager.create_database_file("t.db").unwrap();

        let sql = format!("SELECT '{}'", "x".repeat(5000));
        let err = manager
            .read_query(Some("t.db"), &sql, &QueryParams::None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_restore_defaults_to_source() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());
        manager.create_database_file("t.db").unwrap();
        manager
            .create_table(Some("t.db"), "CREATE TABLE a (x INTEGER)")
            .unwrap();
        let artifact = manager.backup_database(Some("t.db")).unwrap();

        manager.delete_database_file("t.db").unwrap();
        manager.restore_database(&artifact.name, None, false).unwrap();
        assert!(manager.table_exists(Some("t.db"), "a").unwrap());

        let listed = manager.list_backups(Some("t.db"), false).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(manager.verify_backup(&artifact.name).unwrap());
        manager.delete_backup(&artifact.name).unwrap();
        assert!(manager.list_backups(None, false).unwrap().is_empty());
    }
}
