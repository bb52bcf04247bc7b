//! Opt-in, append-only per-database query log
//!
//! One JSON object per line in `logs/{db_name}.log`:
//! `{timestamp, db_name, tool, query, result, error}`. Logging never fails an
//! operation; write problems are reported through `tracing` instead.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::config::ShelfConfig;
use crate::error::ShelfResult;

#[derive(Debug, Serialize)]
struct QueryLogEntry<'a> {
    timestamp: String,
    db_name: &'a str,
    tool: &'a str,
    query: Option<&'a str>,
    result: Option<String>,
    error: Option<String>,
}

/// Appends query log lines when logging is enabled
#[derive(Debug, Clone)]
pub struct QueryLogger {
    dir: Option<PathBuf>,
}

impl QueryLogger {
    pub fn new(config: &ShelfConfig) -> Self {
        Self {
            dir: config
                .query_logging()
                .then(|| config.logs_dir().to_path_buf()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Record the outcome of an operation against `db_name`
    ///
    /// `db_name` must already have passed name validation.
    pub fn record<T: Serialize>(
        &self,
        db_name: &str,
        tool: &str,
        query: Option<&str>,
        outcome: &ShelfResult<T>,
    ) {
        let Some(dir) = &self.dir else {
            return;
        };

        let (result, error) = match outcome {
            Ok(value) => (Some(summarize(serde_json::to_value(value).ok())), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let entry = QueryLogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            db_name,
            tool,
            query,
            result,
            error,
        };

        let path = dir.join(format!("{}.log", db_name));
        let written = serde_json::to_string(&entry)
            .map_err(std::io::Error::other)
            .and_then(|line| {
                let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
                writeln!(file, "{}", line)
            });

        if let Err(e) = written {
            warn!(db = %db_name, tool = %tool, error = %e, "failed to write query log entry");
        }
    }
}

/// Short description of a successful result
fn summarize(value: Option<JsonValue>) -> String {
    let Some(value) = value else {
        return "ok".to_string();
    };

    if let Some(rows) = value.get("rows").and_then(JsonValue::as_array) {
        return format!("{} row(s) returned", rows.len());
    }
    if let Some(affected) = value.get("rows_affected").and_then(JsonValue::as_u64) {
        return format!("{} row(s) affected", affected);
    }
    match value {
        JsonValue::Array(items) => format!("{} item(s)", items.len()),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        _ => "ok".to_string(),
    }
}
