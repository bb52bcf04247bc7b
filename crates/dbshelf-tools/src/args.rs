//! Typed argument bags for each operation

use dbshelf_core::{ObjectKind, QueryParams};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ToolError, ToolResult};

/// Deserialize an argument bag, treating `null` as an empty object
pub fn parse<T: DeserializeOwned>(arguments: Value) -> ToolResult<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidParameters(e.to_string()))
}

fn query_params(params: Option<&Value>) -> ToolResult<QueryParams> {
    Ok(QueryParams::from_json(params)?)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileArgs {
    #[serde(alias = "db_name")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameFileArgs {
    #[serde(alias = "old_name")]
    pub name: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseArgs {
    #[serde(default)]
    pub db_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryArgs {
    #[serde(alias = "query")]
    pub sql: String,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl QueryArgs {
    pub fn params(&self) -> ToolResult<QueryParams> {
        query_params(self.params.as_ref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaginatedQueryArgs {
    #[serde(alias = "query")]
    pub sql: String,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    pub page: i64,
    pub page_size: i64,
}

impl PaginatedQueryArgs {
    pub fn params(&self) -> ToolResult<QueryParams> {
        query_params(self.params.as_ref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowCountArgs {
    #[serde(alias = "query", alias = "table")]
    pub sql_or_table: String,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl RowCountArgs {
    pub fn params(&self) -> ToolResult<QueryParams> {
        query_params(self.params.as_ref())
    }
}

/// Raw DDL for `create_table` and `create_index`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DdlArgs {
    #[serde(alias = "table_sql", alias = "index_sql")]
    pub sql: String,
    #[serde(default)]
    pub db_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableArgs {
    #[serde(alias = "table_name")]
    pub table: String,
    #[serde(default)]
    pub db_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameTableArgs {
    #[serde(alias = "table_name")]
    pub table: String,
    pub new_name: String,
    #[serde(default)]
    pub db_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListTablesArgs {
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default, alias = "type")]
    pub kind: Option<ObjectKind>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateIndexSimpleArgs {
    #[serde(alias = "table_name")]
    pub table: String,
    #[serde(alias = "column_name")]
    pub column: String,
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub db_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexArgs {
    pub index_name: String,
    #[serde(default)]
    pub db_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListIndexesArgs {
    #[serde(default, alias = "table_name")]
    pub table: Option<String>,
    #[serde(default)]
    pub db_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestoreArgs {
    #[serde(alias = "artifact_name", alias = "backup_name")]
    pub artifact: String,
    #[serde(default, alias = "target_db_name")]
    pub target: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListBackupsArgs {
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub verify: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactArgs {
    #[serde(alias = "artifact_name", alias = "backup_name")]
    pub artifact: String,
}
