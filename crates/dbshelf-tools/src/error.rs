//! Operation surface error types
//!
//! Every error reduces to the core `{kind, message}` payload so clients see a
//! single closed set of error kinds whatever layer produced the failure.

use dbshelf_core::{ErrorKind, ErrorPayload, ShelfError};
use thiserror::Error;

/// Operation surface result type
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors that can occur while dispatching operations
#[derive(Debug, Error)]
pub enum ToolError {
    /// No operation is registered under this name
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The argument bag does not match the operation's input schema
    #[error("Invalid tool parameters: {0}")]
    InvalidParameters(String),

    /// The operation itself failed
    #[error(transparent)]
    Operation(#[from] ShelfError),

    /// A request or result could not be (de)serialized
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Reading requests or writing responses failed
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ToolError {
    /// The error kind reported to clients
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::ToolNotFound(_) => ErrorKind::NotFound,
            ToolError::InvalidParameters(_) | ToolError::SerializationError(_) => {
                ErrorKind::InvalidArgument
            }
            ToolError::Operation(e) => e.kind(),
            ToolError::IoError(_) => ErrorKind::IoError,
        }
    }

    /// Structured `{kind, message}` error for the response
    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            ToolError::Operation(e) => e.to_payload(),
            other => ErrorPayload {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }
}
