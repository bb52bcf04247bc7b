//! Path resolution with root containment
//!
//! This is the security boundary of the crate: every operation turns a
//! user-supplied name into a path through a [`PathResolver`] before touching
//! the filesystem or the engine.
//!
//! Resolution is two-phase:
//! 1. Lexical validation of the name (no filesystem access at all)
//! 2. Containment: an existing entry is canonicalized (symlinks resolved) and
//!    must remain a descendant of the canonical root

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::backup::ArtifactName;
use crate::config::ShelfConfig;
use crate::error::{Entity, ShelfError, ShelfResult};
use crate::validation::validate_database_name;

/// Existence precondition checked during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    /// Fail with `NotFound` unless the entry exists
    MustExist,
    /// Fail with `AlreadyExists` if the entry exists
    MustNotExist,
    /// Resolve regardless of existence
    Any,
}

/// Which naming scheme a resolver enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// `<stem>.<ext>` database files under the database root
    Database,
    /// `<db_name>_<timestamp>` artifacts under the backup root
    Backup,
}

impl NameKind {
    fn entity(self) -> Entity {
        match self {
            NameKind::Database => Entity::Database,
            NameKind::Backup => Entity::Backup,
        }
    }
}

/// A validated name and its contained absolute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    name: String,
    path: PathBuf,
    exists: bool,
}

impl ResolvedPath {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the entry existed at resolution time
    pub fn exists(&self) -> bool {
        self.exists
    }
}

/// Maps names to absolute paths inside a fixed root
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    kind: NameKind,
    extensions: Vec<String>,
}

impl PathResolver {
    /// Resolver for database files under the configured database root
    pub fn databases(config: &ShelfConfig) -> Self {
        Self {
            root: config.database_dir().to_path_buf(),
            kind: NameKind::Database,
            extensions: config.extensions().to_vec(),
        }
    }

    /// Resolver for backup artifacts under the configured backup root
    pub fn backups(config: &ShelfConfig) -> Self {
        Self {
            root: config.backup_dir().to_path_buf(),
            kind: NameKind::Backup,
            extensions: config.extensions().to_vec(),
        }
    }

    /// The canonical root this resolver confines names to
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate a name without touching the filesystem
    pub fn validate(&self, name: &str) -> ShelfResult<()> {
        match self.kind {
            NameKind::Database => validate_database_name(name, &self.extensions),
            NameKind::Backup => ArtifactName::parse(name, &self.extensions).map(|_| ()),
        }
    }

    /// Resolve `name` to a contained absolute path
    ///
    /// # Errors
    ///
    /// - `InvalidName` if the name fails lexical validation
    /// - `OutOfBounds` if an existing entry resolves outside the root
    /// - `NotFound` / `AlreadyExists` if the existence precondition fails
    pub fn resolve(&self, name: &str, existence: Existence) -> ShelfResult<ResolvedPath> {
        self.validate(name)?;

        let candidate = self.root.join(name);

        // Judge existence on the entry itself so dangling symlinks count
        let exists = match fs::symlink_metadata(&candidate) {
            Ok(_) => true,
            Err(e) if e.kind() == IoErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if exists {
            self.check_containment(name, &candidate)?;
        }

        match existence {
            Existence::MustExist if !exists => {
                return Err(ShelfError::not_found(self.kind.entity(), name));
            }
            Existence::MustNotExist if exists => {
                return Err(ShelfError::already_exists(self.kind.entity(), name));
            }
            _ => {}
        }

        debug!(name = %name, exists, "resolved name");

        Ok(ResolvedPath {
            name: name.to_string(),
            path: candidate,
            exists,
        })
    }

    fn check_containment(&self, name: &str, candidate: &Path) -> ShelfResult<()> {
        let out_of_bounds = || {
            warn!(name = %name, "rejected name resolving outside the configured root");
            ShelfError::OutOfBounds {
                name: name.to_string(),
            }
        };

        // A dangling symlink cannot be proven to stay inside the root
        let canonical = candidate.canonicalize().map_err(|_| out_of_bounds())?;

        if canonical == self.root || !canonical.starts_with(&self.root) {
            return Err(out_of_bounds());
        }

        if !canonical.is_file() {
            return Err(ShelfError::invalid_name(name, "not a regular file"));
        }

        Ok(())
    }
}
