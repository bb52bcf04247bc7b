//! Short-lived, scoped connections to resolved database files
//!
//! There is no pool: every operation opens a fresh handle and the
//! [`ScopedConnection`] guard closes it on every exit path, including early
//! returns from failed statements.

use std::ops::{Deref, DerefMut};

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::config::ShelfConfig;
use crate::error::{Entity, ShelfError, ShelfResult};
use crate::path::ResolvedPath;

/// How a connection is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// `SQLITE_OPEN_READ_ONLY`; the engine refuses any mutation
    Read,
    /// `SQLITE_OPEN_READ_WRITE`; never creates a missing file
    Write,
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessMode::Read => write!(f, "read"),
            AccessMode::Write => write!(f, "write"),
        }
    }
}

/// Opens connections with the configured connection settings
#[derive(Debug, Clone)]
pub struct ConnectionProvider {
    foreign_keys: bool,
}

impl ConnectionProvider {
    pub fn new(config: &ShelfConfig) -> Self {
        Self {
            foreign_keys: config.foreign_keys(),
        }
    }

    /// Open an existing database file
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist (it is never created
    /// here) and `QueryError` if the engine refuses to open it.
    pub fn open(&self, target: &ResolvedPath, mode: AccessMode) -> ShelfResult<ScopedConnection> {
        if !target.path().exists() {
            return Err(ShelfError::not_found(Entity::Database, target.name()));
        }

        let flags = match mode {
            AccessMode::Read => OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            AccessMode::Write => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX
            }
        };

        self.open_with_flags(target, mode, flags)
    }

    /// Create a new database file and open it for writing
    ///
    /// Only the create-database operation calls this. The file gets a valid
    /// header immediately rather than being left zero-length.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the file is already present.
    pub fn create(&self, target: &ResolvedPath) -> ShelfResult<ScopedConnection> {
        if target.path().exists() {
            return Err(ShelfError::already_exists(Entity::Database, target.name()));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = self.open_with_flags(target, AccessMode::Write, flags)?;
        conn.execute_batch("PRAGMA user_version = 0;")?;

        Ok(conn)
    }

    fn open_with_flags(
        &self,
        target: &ResolvedPath,
        mode: AccessMode,
        flags: OpenFlags,
    ) -> ShelfResult<ScopedConnection> {
        let connection = Connection::open_with_flags(target.path(), flags)?;

        if mode == AccessMode::Write && self.foreign_keys {
            connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        }

        debug!(db = %target.name(), mode = %mode, "opened connection");

        Ok(ScopedConnection {
            connection,
            name: target.name().to_string(),
            mode,
        })
    }
}

/// RAII guard that closes its connection when dropped
pub struct ScopedConnection {
    connection: Connection,
    name: String,
    mode: AccessMode,
}

impl ScopedConnection {
    /// Name of the database this connection is bound to
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }
}

impl Deref for ScopedConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connection
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        // The handle itself is closed when `connection` is dropped right after
        debug!(db = %self.name, mode = %self.mode, "releasing connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShelfConfigBuilder;
    use crate::error::ErrorKind;
    use crate::path::{Existence, PathResolver};
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, ShelfConfig) {
        let dir = tempdir().unwrap();
        let config = ShelfConfigBuilder::new()
            .database_dir(dir.path())
            .build()
            .unwrap();
        (dir, config)
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let (_dir, config) = setup();
        let target = PathResolver::databases(&config)
            .resolve("missing.db", Existence::Any)
            .unwrap();
        let provider = ConnectionProvider::new(&config);

        for mode in [AccessMode::Read, AccessMode::Write] {
            let err = provider.open(&target, mode).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
        assert!(!target.path().exists(), "open must never create the file");
    }

    #[test]
    fn test_create_writes_header() {
        let (_dir, config) = setup();
        let target = PathResolver::databases(&config)
            .resolve("fresh.db", Existence::MustNotExist)
            .unwrap();
        let provider = ConnectionProvider::new(&config);

        drop(provider.create(&target).unwrap());

        let bytes = std::fs::read(target.path()).unwrap();
        assert!(bytes.len() >= 100);
        assert!(bytes.starts_with(b"SQLite format 3\0"));

        let err = provider.create(&target).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_read_connection_refuses_writes() {
        let (_dir, config) = setup();
        let resolver = PathResolver::databases(&config);
        let target = resolver.resolve("ro.db", Existence::Any).unwrap();
        let provider = ConnectionProvider::new(&config);

        provider
            .create(&target)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER);")
            .unwrap();

        let target = resolver.resolve("ro.db", Existence::MustExist).unwrap();
        let conn = provider.open(&target, AccessMode::Read).unwrap();
        let err = ShelfError::from(conn.execute("INSERT INTO t VALUES (1)", []).unwrap_err());
        assert_eq!(err.kind(), ErrorKind::QueryError);
        assert!(err.to_string().contains("readonly"));
    }

    #[test]
    fn test_write_connection_enforces_foreign_keys() {
        let (_dir, config) = setup();
        let target = PathResolver::databases(&config)
            .resolve("fk.db", Existence::Any)
            .unwrap();
        let provider = ConnectionProvider::new(&config);

        let conn = provider.create(&target).unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
