//! # Configuration
//!
//! Configuration is built once at process start and is immutable afterwards.
//! Every component receives the [`ShelfConfig`] explicitly at construction.
//!
//! ## Environment Variables
//!
//! - `DBSHELF_DATABASE_DIR` (fallback `DATABASE_DIR`) - Directory holding database files (default: current directory)
//! - `DBSHELF_DEFAULT_DATABASE` (fallback `DEFAULT_DATABASE`) - Database used when a call omits `db_name`
//! - `DBSHELF_ENABLE_QUERY_LOGGING` - Append per-database query logs under `logs/` (default: false)
//! - `DBSHELF_MAX_QUERY_LENGTH` - Maximum SQL length in characters (default: 5000)
//! - `DBSHELF_MAX_PAGE_SIZE` - Maximum rows per page for paginated reads (default: 1000)
//! - `DBSHELF_FOREIGN_KEYS` - Enforce foreign keys on write connections (default: true)

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::validation::validate_database_name;

/// Name of the backup subdirectory under the database root
pub const BACKUP_DIR_NAME: &str = "backups";

/// Name of the query log subdirectory under the database root
pub const LOGS_DIR_NAME: &str = "logs";

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to prepare directory '{path}': {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Validated, immutable configuration
#[derive(Debug, Clone)]
pub struct ShelfConfig {
    database_dir: PathBuf,
    backup_dir: PathBuf,
    logs_dir: PathBuf,
    query_logging: bool,
    default_database: Option<String>,
    max_query_length: usize,
    max_page_size: u64,
    extensions: Vec<String>,
    foreign_keys: bool,
}

impl ShelfConfig {
    /// Canonical database root
    pub fn database_dir(&self) -> &Path {
        &self.database_dir
    }

    /// Canonical backup root (`<database_dir>/backups`)
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Query log directory (`<database_dir>/logs`)
    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn query_logging(&self) -> bool {
        self.query_logging
    }

    pub fn default_database(&self) -> Option<&str> {
        self.default_database.as_deref()
    }

    pub fn max_query_length(&self) -> usize {
        self.max_query_length
    }

    pub fn max_page_size(&self) -> u64 {
        self.max_page_size
    }

    /// Recognized database file extensions, without the leading dot
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn foreign_keys(&self) -> bool {
        self.foreign_keys
    }
}

/// Builder for [`ShelfConfig`] with environment variable support
#[derive(Debug, Clone)]
pub struct ShelfConfigBuilder {
    database_dir: PathBuf,
    query_logging: bool,
    default_database: Option<String>,
    max_query_length: usize,
    max_page_size: u64,
    extensions: Vec<String>,
    foreign_keys: bool,
}

impl Default for ShelfConfigBuilder {
    fn default() -> Self {
        Self {
            database_dir: PathBuf::from("."),
            query_logging: false,
            default_database: None,
            max_query_length: 5000,
            max_page_size: 1000,
            extensions: vec!["db".to_string(), "sqlite".to_string(), "sqlite3".to_string()],
            foreign_keys: true,
        }
    }
}

impl ShelfConfigBuilder {
    /// Create a new builder with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if any variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::default();

        if let Some(dir) =
            get_env_string("DBSHELF_DATABASE_DIR").or_else(|| get_env_string("DATABASE_DIR"))
        {
            builder = builder.database_dir(dir);
        }
        if let Some(name) = get_env_string("DBSHELF_DEFAULT_DATABASE")
            .or_else(|| get_env_string("DEFAULT_DATABASE"))
        {
            builder = builder.default_database(name);
        }
        if let Some(enabled) = get_env_bool("DBSHELF_ENABLE_QUERY_LOGGING")? {
            builder = builder.query_logging(enabled);
        }
        if let Some(length) = get_env_usize("DBSHELF_MAX_QUERY_LENGTH")? {
            builder = builder.max_query_length(length);
        }
        if let Some(size) = get_env_u64("DBSHELF_MAX_PAGE_SIZE")? {
            builder = builder.max_page_size(size);
        }
        if let Some(enabled) = get_env_bool("DBSHELF_FOREIGN_KEYS")? {
            builder = builder.foreign_keys(enabled);
        }

        Ok(builder)
    }

    /// Set the database root directory
    #[must_use]
    pub fn database_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.database_dir = dir.into();
        self
    }

    /// Enable or disable per-database query logging
    #[must_use]
    pub fn query_logging(mut self, enabled: bool) -> Self {
        self.query_logging = enabled;
        self
    }

    /// Set the database used when a call omits `db_name`
    ///
    /// An empty name clears the default.
    #[must_use]
    pub fn default_database(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.default_database = if name.is_empty() { None } else { Some(name) };
        self
    }

    /// Set the maximum accepted SQL length in characters
    #[must_use]
    pub fn max_query_length(mut self, length: usize) -> Self {
        self.max_query_length = length;
        self
    }

    /// Set the maximum page size for paginated reads
    #[must_use]
    pub fn max_page_size(mut self, size: u64) -> Self {
        self.max_page_size = size;
        self
    }

    /// Replace the recognized database file extensions (without dots)
    #[must_use]
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable `PRAGMA foreign_keys` on write connections
    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Validate, prepare directories and build the configuration
    ///
    /// Creates the database root and its `backups/` subdirectory if missing
    /// and canonicalizes the root so later containment checks compare
    /// symlink-free paths.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the configuration is invalid
    /// and `ConfigError::Directory` if a directory cannot be prepared.
    pub fn build(self) -> Result<ShelfConfig, ConfigError> {
        self.validate()?;

        let database_dir = prepare_dir(&self.database_dir)?;
        let backup_dir = prepare_dir(&database_dir.join(BACKUP_DIR_NAME))?;
        let logs_dir = database_dir.join(LOGS_DIR_NAME);
        if self.query_logging {
            prepare_dir(&logs_dir)?;
        }

        Ok(ShelfConfig {
            database_dir,
            backup_dir,
            logs_dir,
            query_logging: self.query_logging,
            default_database: self.default_database,
            max_query_length: self.max_query_length,
            max_page_size: self.max_page_size,
            extensions: self.extensions,
            foreign_keys: self.foreign_keys,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_query_length == 0 {
            return Err(ConfigError::ValidationError(
                "max_query_length must be greater than 0".to_string(),
            ));
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_page_size must be greater than 0".to_string(),
            ));
        }
        if self.max_page_size > i64::MAX as u64 {
            return Err(ConfigError::ValidationError(
                "max_page_size must fit in a signed 64-bit integer".to_string(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one database extension is required".to_string(),
            ));
        }
        if let Some(bad) = self
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(ConfigError::ValidationError(format!(
                "extension '{}' must be non-empty and alphanumeric (no leading dot)",
                bad
            )));
        }
        if let Some(name) = &self.default_database {
            validate_database_name(name, &self.extensions).map_err(|e| {
                ConfigError::ValidationError(format!("default_database: {}", e))
            })?;
        }

        Ok(())
    }
}

fn prepare_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    fs::create_dir_all(path)
        .and_then(|()| path.canonicalize())
        .map_err(|source| ConfigError::Directory {
            path: path.to_path_buf(),
            source,
        })
}

// Environment variable helper functions

fn get_env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn get_env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(val) => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!(
                    "invalid boolean value '{val}', expected true/false/1/0/yes/no/on/off"
                ),
            }),
        },
        Err(_) => Ok(None),
    }
}

fn get_env_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(val) => val
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid u64 value '{val}': {e}"),
            }),
        Err(_) => Ok(None),
    }
}

fn get_env_usize(key: &str) -> Result<Option<usize>, ConfigError> {
    match env::var(key) {
        Ok(val) => val
            .parse::<usize>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid usize value '{val}': {e}"),
            }),
        Err(_) => Ok(None),
    }
}
