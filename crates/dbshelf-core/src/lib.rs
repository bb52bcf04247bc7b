//! # dbshelf Core
//!
//! Turns a directory of SQLite files into a set of safely exposed operations
//! for a single trusted local client.
//!
//! ## Components
//!
//! - **[PathResolver]**: maps names to paths contained in the configured root
//! - **[ConnectionProvider]**: short-lived read-only or read-write connections
//! - **[QueryExecutor]**: statement-class gated execution with ordered rows
//! - **[Paginator]**: deterministic LIMIT/OFFSET pages with total counts
//! - **[SchemaInspector]** and **[TableMutator]**: catalog reads and DDL with pre-checks
//! - **[BackupManager]**: verified online backups and atomic restores
//! - **[DatabaseManager]**: the facade every caller goes through
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dbshelf_core::{DatabaseManager, QueryParams, ShelfConfigBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ShelfConfigBuilder::from_env()?.build()?;
//! let manager = DatabaseManager::new(Arc::new(config));
//!
//! manager.create_database_file("app.db")?;
//! manager.create_table(Some("app.db"), "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//! let rows = manager.read_query(Some("app.db"), "SELECT * FROM users", &QueryParams::None)?;
//! println!("{}", rows.rows.len());
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod files;
pub mod health;
pub mod manager;
pub mod mutator;
pub mod pagination;
pub mod path;
pub mod query_log;
pub mod schema;
pub mod statement;
pub mod validation;
pub mod value;

pub use backup::{ArtifactName, BackupArtifact, BackupManager, BackupState};
pub use config::{ConfigError, ShelfConfig, ShelfConfigBuilder};
pub use connection::{AccessMode, ConnectionProvider, ScopedConnection};
pub use error::{Entity, ErrorKind, ErrorPayload, ShelfError, ShelfResult};
pub use executor::{QueryExecutor, QueryResult};
pub use files::{DatabaseFile, DatabaseFiles};
pub use health::{HealthReport, HealthStatus};
pub use manager::DatabaseManager;
pub use mutator::TableMutator;
pub use pagination::{PaginatedResult, Paginator};
pub use path::{Existence, PathResolver, ResolvedPath};
pub use query_log::QueryLogger;
pub use schema::{
    ColumnDescriptor, IndexDescriptor, ObjectKind, SchemaInspector, SchemaObject, TableDescriptor,
};
pub use statement::StatementClass;
pub use value::{QueryParams, Row, RowSet, SqlValue};
