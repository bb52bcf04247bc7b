//! Server that exposes database management operations over line-delimited JSON
//!
//! Each request is one line `{"id", "tool", "arguments"}`; each response is one
//! line `{"id", "ok": true, "result"}` or `{"id", "ok": false, "error": {kind, message}}`.

use std::sync::Arc;

use dbshelf_core::{DatabaseManager, ErrorPayload};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::adapter::{ToolDefinition, list_definitions};
use crate::args::{self, parse};
use crate::error::{ToolError, ToolResult};
use crate::tools::Operation;

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "dbshelf".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Sandboxed SQLite database management".to_string(),
        }
    }
}

const ENCODE_FAILURE: &str = r#"{"id":null,"ok":false,"error":{"kind":"InvalidArgument","message":"response could not be encoded"}}"#;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct Response {
    id: Value,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorPayload>,
}

impl Response {
    fn from_outcome(id: Value, outcome: ToolResult<Value>) -> Self {
        match outcome {
            Ok(result) => Self {
                id,
                ok: true,
                result: Some(result),
                error: None,
            },
            Err(e) => Self {
                id,
                ok: false,
                result: None,
                error: Some(e.to_payload()),
            },
        }
    }
}

/// Dispatches named operations to a [`DatabaseManager`]
pub struct ToolServer {
    manager: Arc<DatabaseManager>,
    server_info: ServerInfo,
}

impl ToolServer {
    pub fn new(manager: DatabaseManager) -> Self {
        Self {
            manager: Arc::new(manager),
            server_info: ServerInfo::default(),
        }
    }

    /// Create a new server with custom server info
    pub fn with_info(manager: DatabaseManager, server_info: ServerInfo) -> Self {
        let mut server = Self::new(manager);
        server.server_info = server_info;
        server
    }

    pub fn info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn manager(&self) -> &DatabaseManager {
        &self.manager
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        list_definitions()
    }

    /// Call an operation by name
    ///
    /// Operations run on the calling task; each one opens and closes its own
    /// short-lived connection.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult<Value> {
        debug!(tool = %name, "Calling tool");

        let operation =
            Operation::from_name(name).ok_or_else(|| ToolError::ToolNotFound(name.to_string()))?;
        let result = self.dispatch(operation, arguments);

        debug!(tool = %name, success = result.is_ok(), "Tool execution completed");
        result
    }

    /// Handle one request line and produce its response line
    ///
    /// Returns `None` for blank lines.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                let outcome = self.call_tool(&request.tool, request.arguments).await;
                Response::from_outcome(request.id, outcome)
            }
            Err(e) => {
                warn!(error = %e, "Malformed request");
                Response::from_outcome(Value::Null, Err(ToolError::SerializationError(e)))
            }
        };

        Some(serde_json::to_string(&response).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to encode response");
            ENCODE_FAILURE.to_string()
        }))
    }

    /// Serve requests from `reader`, writing responses to `writer`, until EOF
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> ToolResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(response) = self.handle_line(&line).await {
                writer.write_all(response.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Serve via stdio (stdin/stdout)
    pub async fn serve_stdio(self) -> ToolResult<()> {
        info!(
            server = %self.server_info.name,
            version = %self.server_info.version,
            tools = Operation::ALL.len(),
            database_dir = %self.manager.config().database_dir().display(),
            "Starting server on stdio"
        );

        let stdin = BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await?;

        info!("stdin closed, shutting down");
        Ok(())
    }

    fn dispatch(&self, operation: Operation, arguments: Value) -> ToolResult<Value> {
        let manager = &self.manager;

        match operation {
            Operation::ListDatabaseFiles => {
                parse::<args::NoArgs>(arguments)?;
                encode(manager.list_database_files()?)
            }
            Operation::CreateDatabaseFile => {
                let a: args::FileArgs = parse(arguments)?;
                encode(manager.create_database_file(&a.name)?)
            }
            Operation::DeleteDatabaseFile => {
                let a: args::FileArgs = parse(arguments)?;
                manager.delete_database_file(&a.name)?;
                Ok(json!({"deleted": a.name}))
            }
            Operation::RenameDatabaseFile => {
                let a: args::RenameFileArgs = parse(arguments)?;
                encode(manager.rename_database_file(&a.name, &a.new_name)?)
            }
            Operation::ReadQuery => {
                let a: args::QueryArgs = parse(arguments)?;
                encode(manager.read_query(a.db_name.as_deref(), &a.sql, &a.params()?)?)
            }
            Operation::WriteQuery => {
                let a: args::QueryArgs = parse(arguments)?;
                encode(manager.write_query(a.db_name.as_deref(), &a.sql, &a.params()?)?)
            }
            Operation::ReadQueryPaginated => {
                let a: args::PaginatedQueryArgs = parse(arguments)?;
                encode(manager.read_query_paginated(
                    a.db_name.as_deref(),
                    &a.sql,
                    &a.params()?,
                    a.page,
                    a.page_size,
                )?)
            }
            Operation::RowCount => {
                let a: args::RowCountArgs = parse(arguments)?;
                let count =
                    manager.row_count(a.db_name.as_deref(), &a.sql_or_table, &a.params()?)?;
                Ok(json!({"count": count}))
            }
            Operation::CreateTable => {
                let a: args::DdlArgs = parse(arguments)?;
                let table = manager.create_table(a.db_name.as_deref(), &a.sql)?;
                Ok(json!({"table": table}))
            }
            Operation::DropTable => {
                let a: args::TableArgs = parse(arguments)?;
                manager.drop_table(a.db_name.as_deref(), &a.table)?;
                Ok(json!({"dropped": a.table}))
            }
            Operation::RenameTable => {
                let a: args::RenameTableArgs = parse(arguments)?;
                manager.rename_table(a.db_name.as_deref(), &a.table, &a.new_name)?;
                Ok(json!({"table": a.new_name}))
            }
            Operation::TableExists => {
                let a: args::TableArgs = parse(arguments)?;
                let exists = manager.table_exists(a.db_name.as_deref(), &a.table)?;
                Ok(json!({"exists": exists}))
            }
            Operation::ListTables => {
                let a: args::ListTablesArgs = parse(arguments)?;
                encode(manager.list_tables(a.db_name.as_deref(), a.kind)?)
            }
            Operation::DescribeTable => {
                let a: args::TableArgs = parse(arguments)?;
                encode(manager.describe_table(a.db_name.as_deref(), &a.table)?)
            }
            Operation::ExportSchema => {
                let a: args::DatabaseArgs = parse(arguments)?;
                let statements = manager.export_schema(a.db_name.as_deref())?;
                Ok(json!({"statements": statements}))
            }
            Operation::CreateIndex => {
                let a: args::DdlArgs = parse(arguments)?;
                let index = manager.create_index(a.db_name.as_deref(), &a.sql)?;
                Ok(json!({"index": index}))
            }
            Operation::CreateIndexSimple => {
                let a: args::CreateIndexSimpleArgs = parse(arguments)?;
                let index = manager.create_index_simple(
                    a.db_name.as_deref(),
                    &a.table,
                    &a.column,
                    a.index_name.as_deref(),
                    a.unique,
                )?;
                Ok(json!({"index": index}))
            }
            Operation::DropIndex => {
                let a: args::IndexArgs = parse(arguments)?;
                manager.drop_index(a.db_name.as_deref(), &a.index_name)?;
                Ok(json!({"dropped": a.index_name}))
            }
            Operation::ListIndexes => {
                let a: args::ListIndexesArgs = parse(arguments)?;
                encode(manager.list_indexes(a.db_name.as_deref(), a.table.as_deref())?)
            }
            Operation::BackupDatabase => {
                let a: args::DatabaseArgs = parse(arguments)?;
                encode(manager.backup_database(a.db_name.as_deref())?)
            }
            Operation::RestoreDatabase => {
                let a: args::RestoreArgs = parse(arguments)?;
                encode(manager.restore_database(&a.artifact, a.target.as_deref(), a.overwrite)?)
            }
            Operation::ListBackups => {
                let a: args::ListBackupsArgs = parse(arguments)?;
                encode(manager.list_backups(a.db_name.as_deref(), a.verify)?)
            }
            Operation::VerifyBackup => {
                let a: args::ArtifactArgs = parse(arguments)?;
                let valid = manager.verify_backup(&a.artifact)?;
                Ok(json!({"artifact": a.artifact, "valid": valid}))
            }
            Operation::DeleteBackup => {
                let a: args::ArtifactArgs = parse(arguments)?;
                manager.delete_backup(&a.artifact)?;
                Ok(json!({"deleted": a.artifact}))
            }
            Operation::HealthCheck => {
                parse::<args::NoArgs>(arguments)?;
                encode(manager.health_check())
            }
            Operation::GetDocs => {
                parse::<args::NoArgs>(arguments)?;
                encode(self.list_tools())
            }
        }
    }
}

fn encode<T: Serialize>(value: T) -> ToolResult<Value> {
    Ok(serde_json::to_value(value)?)
}
