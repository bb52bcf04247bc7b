//! Catalog inspection: objects, table descriptors, indexes and schema export

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::error::{Entity, ShelfError, ShelfResult};

/// Kinds of catalog objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Table,
    View,
    Index,
    Trigger,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
            ObjectKind::Index => "index",
            ObjectKind::Trigger => "trigger",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "table" => Some(ObjectKind::Table),
            "view" => Some(ObjectKind::View),
            "index" => Some(ObjectKind::Index),
            "trigger" => Some(ObjectKind::Trigger),
            _ => None,
        }
    }
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaObject {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub tbl_name: String,
    pub sql: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub cid: i64,
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    /// Names of indexes on this table, including automatic ones
    pub indexes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub table: String,
    pub unique: bool,
    /// Indexed columns in key order; expression terms appear as `<expression>`
    pub columns: Vec<String>,
    pub sql: Option<String>,
}

// Internal objects (sqlite_sequence, sqlite_autoindex_*, ...) are never listed or exported
const USER_OBJECTS: &str = "name NOT LIKE 'sqlite\\_%' ESCAPE '\\'";

/// Read-only view over a connection's catalog
pub struct SchemaInspector<'c> {
    conn: &'c Connection,
}

impl<'c> SchemaInspector<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Catalog name of a table, matched case-insensitively
    pub fn find_table(&self, name: &str) -> ShelfResult<Option<String>> {
        self.find_object(name, Some(ObjectKind::Table))
    }

    pub fn table_exists(&self, name: &str) -> ShelfResult<bool> {
        Ok(self.find_table(name)?.is_some())
    }

    pub fn index_exists(&self, name: &str) -> ShelfResult<bool> {
        Ok(self.find_object(name, Some(ObjectKind::Index))?.is_some())
    }

    /// Whether any object (table, view, index or trigger) uses this name
    pub fn object_exists(&self, name: &str) -> ShelfResult<bool> {
        Ok(self.find_object(name, None)?.is_some())
    }

    pub fn column_exists(&self, table: &str, column: &str) -> ShelfResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2 COLLATE NOCASE",
                params![table, column],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Catalog objects in declaration order, optionally filtered by kind
    pub fn list_objects(&self, kind: Option<ObjectKind>) -> ShelfResult<Vec<SchemaObject>> {
        let sql = format!(
            "SELECT name, type, tbl_name, sql FROM sqlite_master \
             WHERE type IN ('table', 'view', 'index', 'trigger') AND {} \
             AND (?1 IS NULL OR type = ?1) ORDER BY rowid",
            USER_OBJECTS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![kind.map(|k| k.as_str())], |row| {
            let kind: String = row.get(1)?;
            Ok((
                row.get::<_, String>(0)?,
                kind,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut objects = Vec::new();
        for row in rows {
            let (name, kind, tbl_name, sql) = row?;
            if let Some(kind) = ObjectKind::from_name(&kind) {
                objects.push(SchemaObject {
                    name,
                    kind,
                    tbl_name,
                    sql,
                });
            }
        }
        Ok(objects)
    }

    /// Describe a table's columns and indexes
    ///
    /// # Errors
    ///
    /// `NotFound` if no such table exists.
    pub fn describe_table(&self, name: &str) -> ShelfResult<TableDescriptor> {
        let table = self
            .find_table(name)?
            .ok_or_else(|| ShelfError::not_found(Entity::Table, name))?;

        let mut stmt = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk \
             FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map([&table], |row| {
                Ok(ColumnDescriptor {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                    declared_type: row.get(2)?,
                    nullable: row.get::<_, i64>(3)? == 0,
                    primary_key: row.get::<_, i64>(5)? > 0,
                    default_value: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_index_list(?1) ORDER BY name")?;
        let indexes = stmt
            .query_map([&table], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(TableDescriptor {
            name: table,
            columns,
            indexes,
        })
    }

    /// User indexes in declaration order, optionally limited to one table
    pub fn list_indexes(&self, table: Option<&str>) -> ShelfResult<Vec<IndexDescriptor>> {
        let table = match table {
            Some(name) => Some(
                self.find_table(name)?
                    .ok_or_else(|| ShelfError::not_found(Entity::Table, name))?,
            ),
            None => None,
        };

        let sql = format!(
            "SELECT name, tbl_name, sql FROM sqlite_master \
             WHERE type = 'index' AND {} AND (?1 IS NULL OR tbl_name = ?1) ORDER BY rowid",
            USER_OBJECTS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut indexes = Vec::with_capacity(entries.len());
        for (name, table, sql) in entries {
            let unique = self
                .conn
                .query_row(
                    "SELECT \"unique\" FROM pragma_index_list(?1) WHERE name = ?2",
                    params![table, name],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?
                .unwrap_or(0)
                != 0;

            let mut stmt = self
                .conn
                .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
            let columns = stmt
                .query_map([&name], |row| row.get::<_, Option<String>>(0))?
                .map(|column| column.map(|c| c.unwrap_or_else(|| "<expression>".to_string())))
                .collect::<Result<Vec<_>, _>>()?;

            indexes.push(IndexDescriptor {
                name,
                table,
                unique,
                columns,
                sql,
            });
        }
        Ok(indexes)
    }

    /// Every CREATE statement needed to rebuild the schema on an empty database
    ///
    /// Tables come first, then indexes, views and triggers, each group in
    /// catalog order. Statements carry no trailing semicolon.
    pub fn export_schema(&self) -> ShelfResult<Vec<String>> {
        let sql = format!(
            "SELECT sql FROM sqlite_master WHERE sql IS NOT NULL AND {} \
             ORDER BY CASE type \
                WHEN 'table' THEN 0 WHEN 'index' THEN 1 \
                WHEN 'view' THEN 2 WHEN 'trigger' THEN 3 ELSE 4 END, rowid",
            USER_OBJECTS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let statements = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(statements)
    }

    fn find_object(&self, name: &str, kind: Option<ObjectKind>) -> ShelfResult<Option<String>> {
        let found = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master \
                 WHERE name = ?1 COLLATE NOCASE AND (?2 IS NULL OR type = ?2) \
                 ORDER BY rowid LIMIT 1",
                params![name, kind.map(|k| k.as_str())],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn catalog() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL DEFAULT 'anon', email TEXT UNIQUE);
             CREATE VIEW named AS SELECT name FROM users;
             CREATE INDEX idx_users_name ON users (name);
             CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id), body TEXT);
             CREATE UNIQUE INDEX idx_posts_user ON posts (user_id, id);
             CREATE TRIGGER trg AFTER INSERT ON posts BEGIN SELECT 1; END;
             INSERT INTO users (name) VALUES ('a');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_existence_checks() {
        let conn = catalog();
        let inspector = SchemaInspector::new(&conn);

        assert!(inspector.table_exists("users").unwrap());
        assert!(inspector.table_exists("USERS").unwrap());
        assert_eq!(inspector.find_table("Users").unwrap().as_deref(), Some("users"));
        assert!(!inspector.table_exists("named").unwrap());
        assert!(inspector.object_exists("named").unwrap());
        assert!(inspector.index_exists("idx_users_name").unwrap());
        assert!(inspector.column_exists("users", "email").unwrap());
        assert!(!inspector.column_exists("users", "missing").unwrap());
    }

    #[test]
    fn test_list_objects_hides_internal_tables() {
        let conn = catalog();
        let inspector = SchemaInspector::new(&conn);

        let names: Vec<_> = inspector
            .list_objects(None)
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(
            names,
            ["users", "named", "idx_users_name", "posts", "idx_posts_user", "trg"]
        );

        let tables = inspector.list_objects(Some(ObjectKind::Table)).unwrap();
        assert_eq!(tables.len(), 2);
        assert!(tables.iter().all(|o| o.kind == ObjectKind::Table));
    }

    #[test]
    fn test_describe_table() {
        let conn = catalog();
        let table = SchemaInspector::new(&conn).describe_table("users").unwrap();

        assert_eq!(table.name, "users");
        assert_eq!(table.columns.len(), 3);
        assert!(table.columns[0].primary_key);
        assert_eq!(table.columns[1].declared_type, "TEXT");
        assert!(!table.columns[1].nullable);
        assert_eq!(table.columns[1].default_value.as_deref(), Some("'anon'"));
        assert!(table.columns[2].nullable);
        assert!(table.indexes.contains(&"idx_users_name".to_string()));
        assert!(table.indexes.iter().any(|i| i.starts_with("sqlite_autoindex")));

        let err = SchemaInspector::new(&conn)
            .describe_table("nope")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_list_indexes() {
        let conn = catalog();
        let inspector = SchemaInspector::new(&conn);

        let all = inspector.list_indexes(None).unwrap();
        assert_eq!(all.len(), 2);

        let posts = inspector.list_indexes(Some("posts")).unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].unique);
        assert_eq!(posts[0].columns, ["user_id", "id"]);

        let err = inspector.list_indexes(Some("ghost")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_export_schema_replays() {
        let conn = catalog();
        let statements = SchemaInspector::new(&conn).export_schema().unwrap();

        assert!(statements[0].starts_with("CREATE TABLE users"));
        assert!(statements[1].starts_with("CREATE TABLE posts"));
        assert!(statements.iter().all(|s| !s.contains("sqlite_sequence")));

        let fresh = Connection::open_in_memory().unwrap();
        for statement in &statements {
            fresh.execute_batch(statement).unwrap();
        }

        let original = SchemaInspector::new(&conn);
        let replayed = SchemaInspector::new(&fresh);
        for table in ["users", "posts"] {
            assert_eq!(
                original.describe_table(table).unwrap(),
                replayed.describe_table(table).unwrap()
            );
        }
    }
}
