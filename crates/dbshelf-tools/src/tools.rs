//! The catalog of named operations
//!
//! Each operation carries its name, a description, behavior annotations and
//! a JSON input schema. Argument names follow the schemas below; the older
//! spellings (`query`, `table_name`, `old_name`, ...) are accepted as aliases
//! by the argument types in [`crate::args`].

use serde_json::{Map, Value, json};

use crate::adapter::ToolAnnotations;

/// Every operation exposed by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListDatabaseFiles,
    CreateDatabaseFile,
    DeleteDatabaseFile,
    RenameDatabaseFile,
    ReadQuery,
    WriteQuery,
    ReadQueryPaginated,
    RowCount,
    CreateTable,
    DropTable,
    RenameTable,
    TableExists,
    ListTables,
    DescribeTable,
    ExportSchema,
    CreateIndex,
    CreateIndexSimple,
    DropIndex,
    ListIndexes,
    BackupDatabase,
    RestoreDatabase,
    ListBackups,
    VerifyBackup,
    DeleteBackup,
    HealthCheck,
    GetDocs,
}

impl Operation {
    /// Registration order
    pub const ALL: [Operation; 26] = [
        Operation::ListDatabaseFiles,
        Operation::CreateDatabaseFile,
        Operation::DeleteDatabaseFile,
        Operation::RenameDatabaseFile,
        Operation::ReadQuery,
        Operation::WriteQuery,
        Operation::ReadQueryPaginated,
        Operation::RowCount,
        Operation::CreateTable,
        Operation::DropTable,
        Operation::RenameTable,
        Operation::TableExists,
        Operation::ListTables,
        Operation::DescribeTable,
        Operation::ExportSchema,
        Operation::CreateIndex,
        Operation::CreateIndexSimple,
        Operation::DropIndex,
        Operation::ListIndexes,
        Operation::BackupDatabase,
        Operation::RestoreDatabase,
        Operation::ListBackups,
        Operation::VerifyBackup,
        Operation::DeleteBackup,
        Operation::HealthCheck,
        Operation::GetDocs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListDatabaseFiles => "list_database_files",
            Operation::CreateDatabaseFile => "create_database_file",
            Operation::DeleteDatabaseFile => "delete_database_file",
            Operation::RenameDatabaseFile => "rename_database_file",
            Operation::ReadQuery => "read_query",
            Operation::WriteQuery => "write_query",
            Operation::ReadQueryPaginated => "read_query_paginated",
            Operation::RowCount => "row_count",
            Operation::CreateTable => "create_table",
            Operation::DropTable => "drop_table",
            Operation::RenameTable => "rename_table",
            Operation::TableExists => "table_exists",
            Operation::ListTables => "list_tables",
            Operation::DescribeTable => "describe_table",
            Operation::ExportSchema => "export_schema",
            Operation::CreateIndex => "create_index",
            Operation::CreateIndexSimple => "create_index_simple",
            Operation::DropIndex => "drop_index",
            Operation::ListIndexes => "list_indexes",
            Operation::BackupDatabase => "backup_database",
            Operation::RestoreDatabase => "restore_database",
            Operation::ListBackups => "list_backups",
            Operation::VerifyBackup => "verify_backup",
            Operation::DeleteBackup => "delete_backup",
            Operation::HealthCheck => "health_check",
            Operation::GetDocs => "get_docs",
        }
    }

    /// Look up an operation by its exact name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Operation::ListDatabaseFiles => "List database files",
            Operation::CreateDatabaseFile => "Create database file",
            Operation::DeleteDatabaseFile => "Delete database file",
            Operation::RenameDatabaseFile => "Rename database file",
            Operation::ReadQuery => "Read query",
            Operation::WriteQuery => "Write query",
            Operation::ReadQueryPaginated => "Paginated read query",
            Operation::RowCount => "Row count",
            Operation::CreateTable => "Create table",
            Operation::DropTable => "Drop table",
            Operation::RenameTable => "Rename table",
            Operation::TableExists => "Table exists",
            Operation::ListTables => "List schema objects",
            Operation::DescribeTable => "Describe table",
            Operation::ExportSchema => "Export schema",
            Operation::CreateIndex => "Create index",
            Operation::CreateIndexSimple => "Create single-column index",
            Operation::DropIndex => "Drop index",
            Operation::ListIndexes => "List indexes",
            Operation::BackupDatabase => "Back up database",
            Operation::RestoreDatabase => "Restore database",
            Operation::ListBackups => "List backups",
            Operation::VerifyBackup => "Verify backup",
            Operation::DeleteBackup => "Delete backup",
            Operation::HealthCheck => "Health check",
            Operation::GetDocs => "Operation documentation",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Operation::ListDatabaseFiles => {
                "List the database files in the database directory with their sizes and modification times."
            }
            Operation::CreateDatabaseFile => "Create a new, empty database file.",
            Operation::DeleteDatabaseFile => {
                "Delete a database file together with its -wal, -shm and -journal files."
            }
            Operation::RenameDatabaseFile => "Rename a database file.",
            Operation::ReadQuery => {
                "Run a SELECT, PRAGMA or EXPLAIN statement on a read-only connection and return the rows."
            }
            Operation::WriteQuery => {
                "Run an INSERT, UPDATE, DELETE or REPLACE statement and return the number of affected rows."
            }
            Operation::ReadQueryPaginated => {
                "Return one page of a SELECT statement together with the total row and page counts. The statement must not carry its own LIMIT or OFFSET."
            }
            Operation::RowCount => "Count the rows of a table or of a SELECT statement.",
            Operation::CreateTable => {
                "Create a table from a CREATE TABLE statement. Fails if the table already exists."
            }
            Operation::DropTable => "Drop an existing table.",
            Operation::RenameTable => "Rename an existing table.",
            Operation::TableExists => "Check whether a table exists.",
            Operation::ListTables => {
                "List catalog objects (tables, views, indexes, triggers), optionally filtered by type."
            }
            Operation::DescribeTable => "Describe the columns and indexes of a table.",
            Operation::ExportSchema => {
                "Export the CREATE statements needed to rebuild the schema, in replayable order."
            }
            Operation::CreateIndex => "Create an index from a CREATE INDEX statement.",
            Operation::CreateIndexSimple => {
                "Create an index on a single column. The name defaults to idx_{table}_{column}."
            }
            Operation::DropIndex => "Drop an existing index.",
            Operation::ListIndexes => "List indexes, optionally only those of one table.",
            Operation::BackupDatabase => {
                "Create a verified backup of a database in the backups directory."
            }
            Operation::RestoreDatabase => {
                "Restore a backup artifact, by default over the database it was taken from."
            }
            Operation::ListBackups => {
                "List backup artifacts, newest first, optionally verifying each one."
            }
            Operation::VerifyBackup => "Check the integrity of a backup artifact.",
            Operation::DeleteBackup => "Delete a backup artifact.",
            Operation::HealthCheck => "Report whether the database and backup directories are usable.",
            Operation::GetDocs => "Describe every operation and its input schema.",
        }
    }

    pub fn annotations(&self) -> ToolAnnotations {
        match self {
            Operation::ListDatabaseFiles
            | Operation::ReadQuery
            | Operation::ReadQueryPaginated
            | Operation::RowCount
            | Operation::TableExists
            | Operation::ListTables
            | Operation::DescribeTable
            | Operation::ExportSchema
            | Operation::ListIndexes
            | Operation::ListBackups
            | Operation::VerifyBackup
            | Operation::HealthCheck
            | Operation::GetDocs => ToolAnnotations::read_only(),
            Operation::CreateDatabaseFile
            | Operation::CreateTable
            | Operation::CreateIndex
            | Operation::CreateIndexSimple
            | Operation::BackupDatabase => ToolAnnotations::additive(),
            Operation::WriteQuery => ToolAnnotations::destructive(false),
            Operation::RenameDatabaseFile | Operation::RenameTable => {
                ToolAnnotations::destructive(false)
            }
            Operation::DeleteDatabaseFile
            | Operation::DropTable
            | Operation::DropIndex
            | Operation::RestoreDatabase
            | Operation::DeleteBackup => ToolAnnotations::destructive(true),
        }
    }

    /// JSON Schema of the operation's argument object
    pub fn input_schema(&self) -> Value {
        match self {
            Operation::ListDatabaseFiles | Operation::HealthCheck | Operation::GetDocs => {
                object(&[], &[])
            }
            Operation::CreateDatabaseFile | Operation::DeleteDatabaseFile => {
                object(&[("name", file_name())], &["name"])
            }
            Operation::RenameDatabaseFile => object(
                &[("name", file_name()), ("new_name", file_name())],
                &["name", "new_name"],
            ),
            Operation::ReadQuery | Operation::WriteQuery => object(
                &[("sql", sql()), ("db_name", db_name()), ("params", params())],
                &["sql"],
            ),
            Operation::ReadQueryPaginated => object(
                &[
                    ("sql", sql()),
                    ("db_name", db_name()),
                    ("params", params()),
                    ("page", positive("1-based page number")),
                    ("page_size", positive("Rows per page")),
                ],
                &["sql", "page", "page_size"],
            ),
            Operation::RowCount => object(
                &[
                    (
                        "sql_or_table",
                        string("A table name or a SELECT statement"),
                    ),
                    ("db_name", db_name()),
                    ("params", params()),
                ],
                &["sql_or_table"],
            ),
            Operation::CreateTable | Operation::CreateIndex => {
                object(&[("sql", sql()), ("db_name", db_name())], &["sql"])
            }
            Operation::DropTable
            | Operation::TableExists
            | Operation::DescribeTable => object(
                &[("table", string("Table name")), ("db_name", db_name())],
                &["table"],
            ),
            Operation::RenameTable => object(
                &[
                    ("table", string("Current table name")),
                    ("new_name", string("New table name")),
                    ("db_name", db_name()),
                ],
                &["table", "new_name"],
            ),
            Operation::ListTables => object(
                &[
                    ("db_name", db_name()),
                    (
                        "kind",
                        json!({
                            "type": "string",
                            "enum": ["table", "view", "index", "trigger"],
                            "description": "Only list objects of this type"
                        }),
                    ),
                ],
                &[],
            ),
            Operation::ExportSchema | Operation::BackupDatabase => {
                object(&[("db_name", db_name())], &[])
            }
            Operation::CreateIndexSimple => object(
                &[
                    ("table", string("Table name")),
                    ("column", string("Column to index")),
                    (
                        "index_name",
                        string("Index name, defaults to idx_{table}_{column}"),
                    ),
                    ("unique", boolean("Create a UNIQUE index")),
                    ("db_name", db_name()),
                ],
                &["table", "column"],
            ),
            Operation::DropIndex => object(
                &[("index_name", string("Index name")), ("db_name", db_name())],
                &["index_name"],
            ),
            Operation::ListIndexes => object(
                &[
                    ("table", string("Only list indexes of this table")),
                    ("db_name", db_name()),
                ],
                &[],
            ),
            Operation::RestoreDatabase => object(
                &[
                    ("artifact", artifact()),
                    (
                        "target",
                        string("Database file to restore into, defaults to the artifact's source"),
                    ),
                    ("overwrite", boolean("Replace the target if it exists")),
                ],
                &["artifact"],
            ),
            Operation::ListBackups => object(
                &[
                    (
                        "db_name",
                        string("Only list artifacts of this database file"),
                    ),
                    ("verify", boolean("Verify each artifact while listing")),
                ],
                &[],
            ),
            Operation::VerifyBackup | Operation::DeleteBackup => {
                object(&[("artifact", artifact())], &["artifact"])
            }
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn object(properties: &[(&str, Value)], required: &[&str]) -> Value {
    let properties: Map<String, Value> = properties
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

fn string(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn boolean(description: &str) -> Value {
    json!({"type": "boolean", "default": false, "description": description})
}

fn positive(description: &str) -> Value {
    json!({"type": "integer", "minimum": 1, "description": description})
}

fn file_name() -> Value {
    string("Database file name, e.g. app.db")
}

fn db_name() -> Value {
    string("Database file name; the configured default database when omitted")
}

fn sql() -> Value {
    string("A single SQL statement")
}

fn artifact() -> Value {
    string("Backup artifact name as returned by backup_database or list_backups")
}

fn params() -> Value {
    json!({
        "description": "Positional parameters as an array or named parameters as an object. Blobs are written as {\"$base64\": \"...\"}.",
        "oneOf": [{"type": "array"}, {"type": "object"}]
    })
}
