//! Integration tests for the operation surface

use dbshelf_core::{DatabaseManager, ShelfConfigBuilder};
use dbshelf_tools::{ToolError, ToolServer, Operation};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::BufReader;

fn server() -> (TempDir, ToolServer) {
    let dir = tempfile::tempdir().unwrap();
    let config = ShelfConfigBuilder::new()
        .database_dir(dir.path())
        .build()
        .unwrap();
    (dir, ToolServer::new(DatabaseManager::new(Arc::new(config))))
}

async fn call(server: &ToolServer, tool: &str, arguments: Value) -> Value {
    server
        .call_tool(tool, arguments)
        .await
        .unwrap_or_else(|e| panic!("{} failed: {}", tool, e))
}

async fn call_err(server: &ToolServer, tool: &str, arguments: Value) -> Value {
    let err = server.call_tool(tool, arguments).await.unwrap_err();
    serde_json::to_value(err.to_payload()).unwrap()
}

#[tokio::test]
async fn test_every_operation_is_listed() {
    let (_dir, server) = server();
    let docs = call(&server, "get_docs", Value::Null).await;

    let names: Vec<&str> = docs
        .as_array()
        .unwrap()
        .iter()
        .map(|def| def["name"].as_str().unwrap())
        .collect();
    let expected: Vec<&str> = Operation::ALL.iter().map(Operation::name).collect();
    assert_eq!(names, expected);
    assert!(docs[0]["input_schema"].is_object());
}

#[tokio::test]
async fn test_table_lifecycle() {
    let (_dir, server) = server();
    call(&server, "create_database_file", json!({"name": "shop.db"})).await;

    let created = call(
        &server,
        "create_table",
        json!({
            "db_name": "shop.db",
            "sql": "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT NOT NULL, price REAL)"
        }),
    )
    .await;
    assert_eq!(created["table"], "products");

    let err = call_err(
        &server,
        "create_table",
        json!({
            "db_name": "shop.db",
            "sql": "CREATE TABLE IF NOT EXISTS products (id INTEGER)"
        }),
    )
    .await;
    assert_eq!(err["kind"], "AlreadyExists");

    let index = call(
        &server,
        "create_index_simple",
        json!({"db_name": "shop.db", "table": "products", "column": "name", "unique": true}),
    )
    .await;
    assert_eq!(index["index"], "idx_products_name");

    let described = call(
        &server,
        "describe_table",
        json!({"db_name": "shop.db", "table_name": "products"}),
    )
    .await;
    assert_eq!(described["columns"].as_array().unwrap().len(), 3);
    assert_eq!(described["columns"][1]["name"], "name");

    let indexes = call(
        &server,
        "list_indexes",
        json!({"db_name": "shop.db", "table": "products"}),
    )
    .await;
    assert_eq!(indexes[0]["name"], "idx_products_name");
    assert_eq!(indexes[0]["unique"], true);

    call(
        &server,
        "rename_table",
        json!({"db_name": "shop.db", "table": "products", "new_name": "items"}),
    )
    .await;
    let exists = call(
        &server,
        "table_exists",
        json!({"db_name": "shop.db", "table": "items"}),
    )
    .await;
    assert_eq!(exists["exists"], true);

    call(
        &server,
        "drop_index",
        json!({"db_name": "shop.db", "index_name": "idx_products_name"}),
    )
    .await;
    call(
        &server,
        "drop_table",
        json!({"db_name": "shop.db", "table": "items"}),
    )
    .await;

    let err = call_err(
        &server,
        "drop_table",
        json!({"db_name": "shop.db", "table": "items"}),
    )
    .await;
    assert_eq!(err["kind"], "NotFound");
}

#[tokio::test]
async fn test_queries_with_params_and_blobs() {
    let (_dir, server) = server();
    call(&server, "create_database_file", json!({"name": "q.db"})).await;
    call(
        &server,
        "create_table",
        json!({"db_name": "q.db", "sql": "CREATE TABLE files (id INTEGER PRIMARY KEY, name TEXT, data BLOB)"}),
    )
    .await;

    let inserted = call(
        &server,
        "write_query",
        json!({
            "db_name": "q.db",
            "sql": "INSERT INTO files (name, data) VALUES (:name, :data)",
            "params": {"name": "hello.bin", "data": {"$base64": "AAEC"}}
        }),
    )
    .await;
    assert_eq!(inserted["rows_affected"], 1);
    assert_eq!(inserted["last_insert_rowid"], 1);

    let rows = call(
        &server,
        "read_query",
        json!({"db_name": "q.db", "query": "SELECT data, name FROM files WHERE id = ?", "params": [1]}),
    )
    .await;
    assert_eq!(rows["columns"], json!(["data", "name"]));
    assert_eq!(rows["rows"][0]["data"], json!({"$base64": "AAEC"}));

    let err = call_err(
        &server,
        "read_query",
        json!({"db_name": "q.db", "sql": "SELECT ?", "params": [1, 2]}),
    )
    .await;
    assert_eq!(err["kind"], "InvalidArgument");

    let err = call_err(
        &server,
        "write_query",
        json!({"db_name": "q.db", "sql": "SELECT * FROM files"}),
    )
    .await;
    assert_eq!(err["kind"], "NotAllowed");

    let count = call(
        &server,
        "row_count",
        json!({"db_name": "q.db", "sql_or_table": "files"}),
    )
    .await;
    assert_eq!(count["count"], 1);
}

#[tokio::test]
async fn test_pagination_and_listing() {
    let (_dir, server) = server();
    call(&server, "create_database_file", json!({"name": "p.db"})).await;
    call(
        &server,
        "create_table",
        json!({"db_name": "p.db", "sql": "CREATE TABLE n (v INTEGER)"}),
    )
    .await;
    call(
        &server,
        "write_query",
        json!({
            "db_name": "p.db",
            "sql": "INSERT INTO n (v) WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 25) SELECT x FROM c"
        }),
    )
    .await;

    let page = call(
        &server,
        "read_query_paginated",
        json!({"db_name": "p.db", "sql": "SELECT v FROM n ORDER BY v", "page": 3, "page_size": 10}),
    )
    .await;
    assert_eq!(page["rows"].as_array().unwrap().len(), 5);
    assert_eq!(page["total_rows"], 25);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["rows"][0]["v"], 21);

    let err = call_err(
        &server,
        "read_query_paginated",
        json!({"db_name": "p.db", "sql": "SELECT v FROM n", "page": 0, "page_size": 10}),
    )
    .await;
    assert_eq!(err["kind"], "InvalidArgument");

    let objects = call(
        &server,
        "list_tables",
        json!({"db_name": "p.db", "kind": "table"}),
    )
    .await;
    assert_eq!(objects[0]["name"], "n");
    assert_eq!(objects[0]["type"], "table");

    let files = call(&server, "list_database_files", json!({})).await;
    assert_eq!(files[0]["name"], "p.db");
    assert!(files[0].get("path").is_none());
}

#[tokio::test]
async fn test_backup_operations() {
    let (_dir, server) = server();
    call(&server, "create_database_file", json!({"name": "b.db"})).await;
    call(
        &server,
        "create_table",
        json!({"db_name": "b.db", "sql": "CREATE TABLE t (x TEXT)"}),
    )
    .await;

    let artifact = call(&server, "backup_database", json!({"db_name": "b.db"})).await;
    let name = artifact["name"].as_str().unwrap().to_string();
    assert!(name.starts_with("b.db_"));
    assert_eq!(artifact["source_database"], "b.db");

    let verified = call(&server, "verify_backup", json!({"artifact": name})).await;
    assert_eq!(verified["valid"], true);

    let err = call_err(
        &server,
        "restore_database",
        json!({"artifact": name}),
    )
    .await;
    assert_eq!(err["kind"], "AlreadyExists");

    call(
        &server,
        "restore_database",
        json!({"artifact": name, "target": "copy.db"}),
    )
    .await;
    let exists = call(
        &server,
        "table_exists",
        json!({"db_name": "copy.db", "table": "t"}),
    )
    .await;
    assert_eq!(exists["exists"], true);

    let listed = call(&server, "list_backups", json!({"verify": true})).await;
    assert_eq!(listed[0]["name"], name.as_str());
    assert_eq!(listed[0]["valid"], true);

    call(&server, "delete_backup", json!({"artifact": name})).await;
    let err = call_err(&server, "delete_backup", json!({"artifact": name})).await;
    assert_eq!(err["kind"], "NotFound");
}

#[tokio::test]
async fn test_names_are_contained() {
    let (_dir, server) = server();

    for name in ["../escape.db", "/etc/passwd.db", "sub/dir.db", ""] {
        let err = call_err(&server, "create_database_file", json!({"name": name})).await;
        assert_eq!(err["kind"], "InvalidName", "{}", name);
    }

    let err = call_err(
        &server,
        "verify_backup",
        json!({"artifact": "../b.db_20240101T000000000Z"}),
    )
    .await;
    assert_eq!(err["kind"], "InvalidName");
}

#[tokio::test]
async fn test_error_kinds_for_bad_requests() {
    let (_dir, server) = server();

    let err = server.call_tool("vacuum_everything", json!({})).await.unwrap_err();
    assert!(matches!(err, ToolError::ToolNotFound(_)));
    assert_eq!(
        serde_json::to_value(err.to_payload()).unwrap()["kind"],
        "NotFound"
    );

    let err = call_err(&server, "read_query", json!({"db_name": "x.db"})).await;
    assert_eq!(err["kind"], "InvalidArgument");

    let err = call_err(&server, "read_query", json!({"sql": "SELECT 1"})).await;
    assert_eq!(err["kind"], "InvalidArgument");
}

#[test]
fn test_stdio_protocol() {
    tokio_test::block_on(async {
        let (_dir, server) = server();
        let input = concat!(
            r#"{"id": 1, "tool": "create_database_file", "arguments": {"name": "s.db"}}"#,
            "\n\n",
            r#"{"id": "two", "tool": "read_query", "arguments": {"db_name": "s.db", "sql": "DELETE FROM x"}}"#,
            "\n",
            r#"{"id": 3, "tool": "nope"}"#,
            "\n",
        );

        let mut output = Vec::new();
        server
            .serve(BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["ok"], true);
        assert_eq!(responses[0]["result"]["name"], "s.db");
        assert_eq!(responses[1]["id"], "two");
        assert_eq!(responses[1]["error"]["kind"], "NotAllowed");
        assert_eq!(responses[2]["error"]["kind"], "NotFound");
    });
}
