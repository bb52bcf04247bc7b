//! Error types for database management operations
//!
//! Every failure that crosses the operation boundary is a [`ShelfError`], and
//! every `ShelfError` reduces to a structured [`ErrorPayload`] of
//! `{kind, message}`. Messages never carry absolute filesystem paths.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for database management operations
pub type ShelfResult<T> = Result<T, ShelfError>;

/// The kind of entity an existence error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Database,
    Table,
    Column,
    Index,
    Backup,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Database => write!(f, "Database file"),
            Entity::Table => write!(f, "Table"),
            Entity::Column => write!(f, "Column"),
            Entity::Index => write!(f, "Index"),
            Entity::Backup => write!(f, "Backup artifact"),
        }
    }
}

/// Errors that can occur while managing databases
#[derive(Debug, Error)]
pub enum ShelfError {
    /// The supplied name is empty, malformed, or carries path syntax
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// The resolved path escapes the configured root
    #[error("Name '{name}' resolves outside the configured directory")]
    OutOfBounds { name: String },

    /// The referenced entity does not exist
    #[error("{entity} '{name}' does not exist")]
    NotFound { entity: Entity, name: String },

    /// The referenced entity already exists
    #[error("{entity} '{name}' already exists")]
    AlreadyExists { entity: Entity, name: String },

    /// The statement class does not match the entry point it was submitted to
    #[error("{0}")]
    NotAllowed(String),

    /// The engine rejected the statement; the message is passed through verbatim
    #[error("{0}")]
    Query(String),

    /// A caller-supplied argument is out of range or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A backup could not be created, verified, or restored
    #[error("Backup failed: {0}")]
    BackupFailed(String),

    /// A filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Closed set of error kinds surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidName,
    OutOfBounds,
    NotFound,
    AlreadyExists,
    NotAllowed,
    QueryError,
    InvalidArgument,
    BackupFailed,
    IoError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidName => "InvalidName",
            ErrorKind::OutOfBounds => "OutOfBounds",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::NotAllowed => "NotAllowed",
            ErrorKind::QueryError => "QueryError",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::BackupFailed => "BackupFailed",
            ErrorKind::IoError => "IoError",
        };
        f.write_str(name)
    }
}

/// Structured error returned across the operation boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

impl ShelfError {
    /// Create an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ShelfError::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(entity: Entity, name: impl Into<String>) -> Self {
        ShelfError::NotFound {
            entity,
            name: name.into(),
        }
    }

    /// Create an already exists error.
    pub fn already_exists(entity: Entity, name: impl Into<String>) -> Self {
        ShelfError::AlreadyExists {
            entity,
            name: name.into(),
        }
    }

    /// The caller-facing kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShelfError::InvalidName { .. } => ErrorKind::InvalidName,
            ShelfError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            ShelfError::NotFound { .. } => ErrorKind::NotFound,
            ShelfError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            ShelfError::NotAllowed(_) => ErrorKind::NotAllowed,
            ShelfError::Query(_) => ErrorKind::QueryError,
            ShelfError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ShelfError::BackupFailed(_) => ErrorKind::BackupFailed,
            ShelfError::Io(_) => ErrorKind::IoError,
        }
    }

    /// Convert into the structured `{kind, message}` payload
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<rusqlite::Error> for ShelfError {
    fn from(error: rusqlite::Error) -> Self {
        ShelfError::Query(error.to_string())
    }
}
