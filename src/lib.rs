//! # dbshelf
//!
//! Sandboxed SQLite database management: file lifecycle, queries, pagination,
//! schema inspection, index management and verified backups, confined to one
//! configured directory and exposed as named operations.
//!
//! - [`core`]: the database manager and its components
//! - [`tools`]: the named-operation surface and its stdio server

pub use dbshelf_core as core;
pub use dbshelf_tools as tools;

pub use dbshelf_core::{
    DatabaseManager, ErrorKind, ErrorPayload, QueryParams, ShelfConfig, ShelfConfigBuilder,
    ShelfError, ShelfResult,
};
pub use dbshelf_tools::ToolServer;
