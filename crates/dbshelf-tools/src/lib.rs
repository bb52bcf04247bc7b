//! # dbshelf tools - Named Operation Surface
//!
//! Exposes every database management operation of `dbshelf-core` as a named
//! tool with a JSON input schema, and serves them over line-delimited JSON on
//! stdio.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dbshelf_core::{DatabaseManager, ShelfConfigBuilder};
//! use dbshelf_tools::ToolServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ShelfConfigBuilder::from_env()?.build()?;
//!     let server = ToolServer::new(DatabaseManager::new(Arc::new(config)));
//!     server.serve_stdio().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod args;
pub mod error;
pub mod server;
pub mod tools;

pub use adapter::{ToolAnnotations, ToolDefinition};
pub use error::{ToolError, ToolResult};
pub use server::{ToolServer, ServerInfo};
pub use tools::Operation;
