//! Database file lifecycle: list, create, delete, rename

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ShelfConfig;
use crate::connection::ConnectionProvider;
use crate::error::ShelfResult;
use crate::path::{Existence, PathResolver, ResolvedPath};

/// Suffixes of the engine's companion files that belong to a database
pub const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// A database file under the database root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseFile {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub exists: bool,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl DatabaseFile {
    pub(crate) fn from_resolved(resolved: &ResolvedPath) -> ShelfResult<Self> {
        let (exists, size_bytes, modified) = match fs::metadata(resolved.path()) {
            Ok(meta) => (
                true,
                meta.len(),
                meta.modified().ok().map(DateTime::<Utc>::from),
            ),
            Err(e) if e.kind() == IoErrorKind::NotFound => (false, 0, None),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            name: resolved.name().to_string(),
            path: resolved.path().to_path_buf(),
            exists,
            size_bytes,
            modified,
        })
    }
}

/// File-level operations on the database root
#[derive(Debug, Clone)]
pub struct DatabaseFiles {
    resolver: PathResolver,
    provider: ConnectionProvider,
}

impl DatabaseFiles {
    pub fn new(config: &ShelfConfig) -> Self {
        Self {
            resolver: PathResolver::databases(config),
            provider: ConnectionProvider::new(config),
        }
    }

    /// Database files directly under the root, sorted by name
    ///
    /// Entries with unrecognized names, directories and symlinks that leave
    /// the root are skipped.
    pub fn list(&self) -> ShelfResult<Vec<DatabaseFile>> {
        let mut files = Vec::new();

        for entry in fs::read_dir(self.resolver.root())? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            match self.resolver.resolve(&name, Existence::MustExist) {
                Ok(resolved) => files.push(DatabaseFile::from_resolved(&resolved)?),
                Err(e) => debug!(name = %name, kind = %e.kind(), "skipping directory entry"),
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Create an empty database file
    pub fn create(&self, name: &str) -> ShelfResult<DatabaseFile> {
        let resolved = self.resolver.resolve(name, Existence::MustNotExist)?;
        // Orphaned journals under this name would be replayed into the new file
        remove_sidecars(resolved.path())?;
        drop(self.provider.create(&resolved)?);

        info!(db = %name, "created database file");
        DatabaseFile::from_resolved(&resolved)
    }

    /// Delete a database file and its companion files
    pub fn delete(&self, name: &str) -> ShelfResult<()> {
        let resolved = self.resolver.resolve(name, Existence::MustExist)?;
        fs::remove_file(resolved.path())?;
        remove_sidecars(resolved.path())?;

        info!(db = %name, "deleted database file");
        Ok(())
    }

    /// Rename a database file, carrying its companion files along
    pub fn rename(&self, name: &str, new_name: &str) -> ShelfResult<DatabaseFile> {
        let source = self.resolver.resolve(name, Existence::MustExist)?;
        let target = self.resolver.resolve(new_name, Existence::MustNotExist)?;

        remove_sidecars(target.path())?;
        fs::rename(source.path(), target.path())?;
        for suffix in SIDECAR_SUFFIXES {
            let from = sidecar_path(source.path(), suffix);
            if fs::symlink_metadata(&from).is_ok() {
                fs::rename(&from, sidecar_path(target.path(), suffix))?;
            }
        }

        info!(db = %name, new_name = %new_name, "renamed database file");
        DatabaseFile::from_resolved(&target)
    }
}

pub(crate) fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// Remove stale companion files of a database path, ignoring absent ones
pub(crate) fn remove_sidecars(path: &Path) -> ShelfResult<()> {
    for suffix in SIDECAR_SUFFIXES {
        match fs::remove_file(sidecar_path(path, suffix)) {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShelfConfigBuilder;
    use crate::error::ErrorKind;
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
    fn test_create_list_delete() {
        let (_dir, config) = setup();
        let files = DatabaseFiles::new(&config);

        let created = files.create("b.db").unwrap();
        assert!(created.exists);
        assert!(created.size_bytes > 0);
        files.create("a.sqlite").unwrap();
        fs::write(config.database_dir().join("notes.txt"), b"x").unwrap();

        let names: Vec<_> = files.list().unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, ["a.sqlite", "b.db"]);

        assert_eq!(
            files.create("b.db").unwrap_err().kind(),
            ErrorKind::AlreadyExists
        );

        files.delete("b.db").unwrap();
        assert_eq!(files.delete("b.db").unwrap_err().kind(), ErrorKind::NotFound);
        assert!(!config.database_dir().join("b.db").exists());
    }

    #[test]
    fn test_rename_carries_sidecars() {
        let (_dir, config) = setup();
        let files = DatabaseFiles::new(&config);
        files.create("old.db").unwrap();
        fs::write(config.database_dir().join("old.db-journal"), b"j").unwrap();

        let renamed = files.rename("old.db", "new.db").unwrap();
        assert_eq!(renamed.name, "new.db");
        assert!(config.database_dir().join("new.db").exists());
        assert!(config.database_dir().join("new.db-journal").exists());
        assert!(!config.database_dir().join("old.db").exists());
        assert!(!config.database_dir().join("old.db-journal").exists());

        files.create("other.db").unwrap();
        assert_eq!(
            files.rename("new.db", "other.db").unwrap_err().kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            files.rename("new.db", "../x.db").unwrap_err().kind(),
            ErrorKind::InvalidName
        );
    }

    #[test]
    fn test_orphaned_sidecars_do_not_attach_to_new_files() {
        let (_dir, config) = setup();
        let files = DatabaseFiles::new(&config);
        let root = config.database_dir();

        fs::write(root.join("fresh.db-journal"), b"stale").unwrap();
        fs::write(root.join("fresh.db-wal"), b"stale").unwrap();
        files.create("fresh.db").unwrap();
        assert!(!root.join("fresh.db-journal").exists());
        assert!(!root.join("fresh.db-wal").exists());

        fs::write(root.join("moved.db-shm"), b"stale").unwrap();
        files.rename("fresh.db", "moved.db").unwrap();
        assert!(root.join("moved.db").exists());
        assert!(!root.join("moved.db-shm").exists());
    }

    #[test]
    fn test_delete_removes_sidecars() {
        let (_dir, config) = setup();
        let files = DatabaseFiles::new(&config);
        files.create("w.db").unwrap();
        fs::write(config.database_dir().join("w.db-wal"), b"w").unwrap();
        fs::write(config.database_dir().join("w.db-shm"), b"s").unwrap();

        files.delete("w.db").unwrap();
        assert!(!config.database_dir().join("w.db-wal").exists());
        assert!(!config.database_dir().join("w.db-shm").exists());
    }
}
