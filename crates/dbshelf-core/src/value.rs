//! Typed cell values, rows and statement parameters
//!
//! Rows are ordered `(column, value)` pairs over a closed set of value kinds.
//! Blobs cross the JSON boundary as `{"$base64": "..."}` in both directions.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::Statement;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

use crate::error::{ShelfError, ShelfResult};

/// JSON key marking a base64-encoded blob
pub const BLOB_KEY: &str = "$base64";

/// A single SQLite cell value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Convert a JSON parameter into a bindable value
    ///
    /// Booleans bind as 0/1. Arrays and objects other than the blob marker
    /// are rejected.
    pub fn from_json(value: &JsonValue) -> ShelfResult<Self> {
        match value {
            JsonValue::Null => Ok(SqlValue::Null),
            JsonValue::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlValue::Integer(i))
                } else if n.is_u64() {
                    Err(ShelfError::InvalidArgument(format!(
                        "integer parameter {} is out of range",
                        n
                    )))
                } else {
                    n.as_f64().map(SqlValue::Real).ok_or_else(|| {
                        ShelfError::InvalidArgument(format!("unsupported number {}", n))
                    })
                }
            }
            JsonValue::String(s) => Ok(SqlValue::Text(s.clone())),
            JsonValue::Object(map) => match (map.len(), map.get(BLOB_KEY)) {
                (1, Some(JsonValue::String(encoded))) => BASE64
                    .decode(encoded)
                    .map(SqlValue::Blob)
                    .map_err(|e| ShelfError::InvalidArgument(format!("invalid base64 blob: {}", e))),
                _ => Err(ShelfError::InvalidArgument(format!(
                    "object parameters must be {{\"{}\": \"...\"}}",
                    BLOB_KEY
                ))),
            },
            JsonValue::Array(_) => Err(ShelfError::InvalidArgument(
                "nested arrays are not valid parameter values".to_string(),
            )),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            SqlValue::Null => ValueRef::Null,
            SqlValue::Integer(i) => ValueRef::Integer(*i),
            SqlValue::Real(f) => ValueRef::Real(*f),
            SqlValue::Text(s) => ValueRef::Text(s.as_bytes()),
            SqlValue::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_none(),
            SqlValue::Integer(i) => serializer.serialize_i64(*i),
            SqlValue::Real(f) => serializer.serialize_f64(*f),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Blob(b) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(BLOB_KEY, &BASE64.encode(b))?;
                map.end()
            }
        }
    }
}

/// One result row: column names paired with values, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(cells: Vec<(String, SqlValue)>) -> Self {
        Self { cells }
    }

    /// Value of the first column with this name
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn cells(&self) -> &[(String, SqlValue)] {
        &self.cells
    }

    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.cells.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Object keys for this row, one per cell
    ///
    /// A repeated column name gets a `:N` suffix (`a`, `a:1`, `a:2`) so that
    /// no value is lost when the row becomes a JSON object.
    pub fn keys(&self) -> Vec<String> {
        let mut used = BTreeSet::new();
        self.cells
            .iter()
            .map(|(column, _)| {
                let mut key = column.clone();
                let mut n = 0;
                while used.contains(&key) {
                    n += 1;
                    key = format!("{}:{}", column, n);
                }
                used.insert(key.clone());
                key
            })
            .collect()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (key, (_, value)) in self.keys().iter().zip(&self.cells) {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A row set with its ordered column list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Parameters bound to a statement before execution
#[derive(Debug, Clone, Default, PartialEq)]
pub enum QueryParams {
    #[default]
    None,
    /// Bound to `?` / `?NNN` in order
    Positional(Vec<SqlValue>),
    /// Bound to `:name`, `@name` or `$name`
    Named(Vec<(String, SqlValue)>),
}

impl QueryParams {
    /// Build parameters from an optional JSON array or object
    pub fn from_json(value: Option<&JsonValue>) -> ShelfResult<Self> {
        match value {
            None | Some(JsonValue::Null) => Ok(QueryParams::None),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(SqlValue::from_json)
                .collect::<ShelfResult<Vec<_>>>()
                .map(QueryParams::Positional),
            Some(JsonValue::Object(map)) => map
                .iter()
                .map(|(key, value)| {
                    let name = if key.starts_with([':', '@', '$']) {
                        key.clone()
                    } else {
                        format!(":{}", key)
                    };
                    SqlValue::from_json(value).map(|v| (name, v))
                })
                .collect::<ShelfResult<Vec<_>>>()
                .map(QueryParams::Named),
            Some(_) => Err(ShelfError::InvalidArgument(
                "params must be an array or an object".to_string(),
            )),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            QueryParams::None => true,
            QueryParams::Positional(values) => values.is_empty(),
            QueryParams::Named(values) => values.is_empty(),
        }
    }

    /// Bind every parameter, rejecting arity mismatches and unknown names
    pub(crate) fn bind(&self, stmt: &mut Statement<'_>) -> ShelfResult<()> {
        let expected = stmt.parameter_count();

        match self {
            QueryParams::None => {
                if expected > 0 {
                    return Err(arity_error(expected, 0));
                }
            }
            QueryParams::Positional(values) => {
                if values.len() != expected {
                    return Err(arity_error(expected, values.len()));
                }
                for (i, value) in values.iter().enumerate() {
                    stmt.raw_bind_parameter(i + 1, value)?;
                }
            }
            QueryParams::Named(values) => {
                let mut bound = BTreeSet::new();
                for (name, value) in values {
                    let index = stmt.parameter_index(name)?.ok_or_else(|| {
                        ShelfError::InvalidArgument(format!("unknown parameter '{}'", name))
                    })?;
                    stmt.raw_bind_parameter(index, value)?;
                    bound.insert(index);
                }
                if bound.len() != expected {
                    return Err(arity_error(expected, bound.len()));
                }
            }
        }

        Ok(())
    }
}

fn arity_error(expected: usize, supplied: usize) -> ShelfError {
    ShelfError::InvalidArgument(format!(
        "statement expects {} parameter(s), {} supplied",
        expected, supplied
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_json_conversion() {
        assert_eq!(SqlValue::from_json(&json!(null)).unwrap(), SqlValue::Null);
        assert_eq!(SqlValue::from_json(&json!(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(SqlValue::from_json(&json!(42)).unwrap(), SqlValue::Integer(42));
        assert_eq!(SqlValue::from_json(&json!(1.5)).unwrap(), SqlValue::Real(1.5));
        assert_eq!(
            SqlValue::from_json(&json!("x")).unwrap(),
            SqlValue::Text("x".into())
        );
        assert_eq!(
            SqlValue::from_json(&json!({"$base64": "AAEC"})).unwrap(),
            SqlValue::Blob(vec![0, 1, 2])
        );

        for bad in [json!([1]), json!({"a": 1}), json!({"$base64": "!!"}), json!(u64::MAX)] {
            let err = SqlValue::from_json(&bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{bad}");
        }
    }

    #[test]
    fn test_row_serializes_in_column_order() {
        let row = Row::new(vec![
            ("zeta".into(), SqlValue::Integer(1)),
            ("alpha".into(), SqlValue::Null),
            ("data".into(), SqlValue::Blob(vec![0xff])),
        ]);

        let text = serde_json::to_string(&row).unwrap();
        assert_eq!(text, r#"{"zeta":1,"alpha":null,"data":{"$base64":"/w=="}}"#);
        assert_eq!(row.get("alpha"), Some(&SqlValue::Null));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_repeated_columns_keep_every_value() {
        let row = Row::new(vec![
            ("a".into(), SqlValue::Integer(1)),
            ("a".into(), SqlValue::Integer(2)),
            ("a:1".into(), SqlValue::Integer(3)),
            ("b".into(), SqlValue::Integer(4)),
        ]);

        assert_eq!(row.keys(), ["a", "a:1", "a:1:1", "b"]);
        let text = serde_json::to_string(&row).unwrap();
        assert_eq!(text, r#"{"a":1,"a:1":2,"a:1:1":3,"b":4}"#);
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({"a": 1, "a:1": 2, "a:1:1": 3, "b": 4})
        );
    }

    #[test]
    fn test_named_params_get_prefix() {
        let params = QueryParams::from_json(Some(&json!({"name": "a", "@id": 1}))).unwrap();
        match params {
            QueryParams::Named(values) => {
                let names: Vec<_> = values.iter().map(|(n, _)| n.as_str()).collect();
                assert!(names.contains(&":name"));
                assert!(names.contains(&"@id"));
            }
            other => panic!("unexpected params {other:?}"),
        }

        let err = QueryParams::from_json(Some(&json!("oops"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_bind_checks_arity_and_names() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();

        let mut stmt = conn.prepare("SELECT ?, ?").unwrap();
        let params = QueryParams::Positional(vec![SqlValue::Integer(1)]);
        assert_eq!(
            params.bind(&mut stmt).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let mut stmt = conn.prepare("SELECT :a").unwrap();
        let params = QueryParams::Named(vec![(":b".into(), SqlValue::Integer(1))]);
        assert_eq!(
            params.bind(&mut stmt).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        let mut stmt = conn.prepare("SELECT 1").unwrap();
        assert!(QueryParams::None.bind(&mut stmt).is_ok());
    }
}
