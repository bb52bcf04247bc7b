//! Backup artifacts: create, verify, restore, list, delete
//!
//! Each backup request moves through [`BackupState`]:
//! `Requested -> Copying -> Verified | Failed`. An artifact only appears under
//! its final name after the online-backup copy completed; it is verified
//! right away and removed again if verification fails.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Timelike, Utc};
use regex::Regex;
use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::ShelfConfig;
use crate::connection::{AccessMode, ConnectionProvider};
use crate::error::{Entity, ShelfError, ShelfResult};
use crate::files::{DatabaseFile, remove_sidecars};
use crate::path::{Existence, PathResolver, ResolvedPath};
use crate::validation::{NameRules, validate_database_name};

const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";
const HEADER_LEN: usize = 100;
const PAGES_PER_STEP: i32 = 100;

/// Lifecycle of a single backup request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    Requested,
    Copying,
    Verified,
    Failed,
}

impl std::fmt::Display for BackupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupState::Requested => write!(f, "requested"),
            BackupState::Copying => write!(f, "copying"),
            BackupState::Verified => write!(f, "verified"),
            BackupState::Failed => write!(f, "failed"),
        }
    }
}

/// A parsed `{db_name}_{YYYYMMDDTHHMMSSmmmZ}` artifact name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    name: String,
    source: String,
    created_at: DateTime<Utc>,
}

static ARTIFACT_PATTERN: OnceLock<Regex> = OnceLock::new();

fn artifact_pattern() -> &'static Regex {
    ARTIFACT_PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<source>.+)_(?P<date>\d{8})T(?P<time>\d{6})(?P<millis>\d{3})Z$")
            .expect("BUG: artifact name pattern should compile")
    })
}

impl ArtifactName {
    /// Name for a backup of `source` taken at `at` (millisecond precision)
    pub fn new(source: &str, at: DateTime<Utc>) -> Self {
        let millis = at.timestamp_subsec_millis().min(999);
        let name = format!("{}_{}{:03}Z", source, at.format("%Y%m%dT%H%M%S"), millis);
        let created_at = at.with_nanosecond(millis * 1_000_000).unwrap_or(at);

        Self {
            name,
            source: source.to_string(),
            created_at,
        }
    }

    /// Parse and validate an artifact name
    ///
    /// # Errors
    ///
    /// `InvalidName` if the name has path syntax, does not follow the
    /// artifact pattern, or names an invalid source database.
    pub fn parse(name: &str, extensions: &[String]) -> ShelfResult<Self> {
        NameRules::FILE_NAME
            .validate(name)
            .map_err(|e| ShelfError::invalid_name(name, e.to_string()))?;

        let not_artifact = || {
            ShelfError::invalid_name(name, "expected <database>_<YYYYMMDDTHHMMSSmmm>Z")
        };
        let captures = artifact_pattern().captures(name).ok_or_else(not_artifact)?;

        let source = &captures["source"];
        validate_database_name(source, extensions)?;

        let created_at = parse_stamp(&captures["date"], &captures["time"], &captures["millis"])
            .ok_or_else(not_artifact)?;

        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            created_at,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Name of the database this artifact was taken from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn parse_stamp(date: &str, time: &str, millis: &str) -> Option<DateTime<Utc>> {
    let num = |s: &str| s.parse::<u32>().ok();
    let year = date.get(0..4)?.parse::<i32>().ok()?;
    let day = NaiveDate::from_ymd_opt(year, num(date.get(4..6)?)?, num(date.get(6..8)?)?)?;
    let moment = day.and_hms_milli_opt(
        num(time.get(0..2)?)?,
        num(time.get(2..4)?)?,
        num(time.get(4..6)?)?,
        num(millis)?,
    )?;
    Some(moment.and_utc())
}

/// A backup artifact and its metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupArtifact {
    pub name: String,
    pub source_database: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// `None` until the artifact has been verified
    pub valid: Option<bool>,
}

/// Creates and manages backup artifacts under the backup root
#[derive(Debug, Clone)]
pub struct BackupManager {
    databases: PathResolver,
    backups: PathResolver,
    provider: ConnectionProvider,
    extensions: Vec<String>,
}

impl BackupManager {
    pub fn new(config: &ShelfConfig) -> Self {
        Self {
            databases: PathResolver::databases(config),
            backups: PathResolver::backups(config),
            provider: ConnectionProvider::new(config),
            extensions: config.extensions().to_vec(),
        }
    }

    /// Back up a database into a new, verified artifact
    ///
    /// # Errors
    ///
    /// `NotFound` if the database does not exist, `BackupFailed` if the copy
    /// or its verification fails (the artifact is removed in that case).
    pub fn backup(&self, db_name: &str) -> ShelfResult<BackupArtifact> {
        let source = self.databases.resolve(db_name, Existence::MustExist)?;
        debug!(db = %db_name, state = %BackupState::Requested, "backup");

        let source_conn = self.provider.open(&source, AccessMode::Read)?;
        let (artifact, target) = self.allocate(db_name)?;

        debug!(db = %db_name, artifact = %artifact.as_str(), state = %BackupState::Copying, "backup");
        let temp = tempfile::Builder::new()
            .prefix(".backup-")
            .suffix(".tmp")
            .tempfile_in(self.backups.root())?;
        {
            let mut dest = Connection::open(temp.path())?;
            let backup = Backup::new(&source_conn, &mut dest)
                .map_err(|e| ShelfError::BackupFailed(e.to_string()))?;
            backup
                .run_to_completion(PAGES_PER_STEP, Duration::from_millis(10), None)
                .map_err(|e| ShelfError::BackupFailed(e.to_string()))?;
        }
        drop(source_conn);

        commit_artifact(temp, target.path(), artifact.as_str())?;

        info!(db = %db_name, artifact = %artifact.as_str(), state = %BackupState::Verified, "backup complete");
        let mut described = describe(&artifact, &target)?;
        described.valid = Some(true);
        Ok(described)
    }

    /// Restore an artifact into a database file
    ///
    /// The artifact is verified first. The restored file is written to a
    /// temporary file beside the target and renamed into place, so the
    /// target is either untouched or fully replaced.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the artifact does not exist
    /// - `AlreadyExists` if the target exists and `overwrite` is false
    /// - `BackupFailed` if the artifact does not verify
    pub fn restore(
        &self,
        artifact_name: &str,
        target_name: &str,
        overwrite: bool,
    ) -> ShelfResult<DatabaseFile> {
        let artifact = self.backups.resolve(artifact_name, Existence::MustExist)?;
        let existence = if overwrite {
            Existence::Any
        } else {
            Existence::MustNotExist
        };
        let target = self.databases.resolve(target_name, existence)?;

        verify_file(artifact.path()).map_err(|reason| {
            ShelfError::BackupFailed(format!(
                "artifact '{}' failed verification: {}",
                artifact_name, reason
            ))
        })?;

        let mut temp = tempfile::Builder::new()
            .prefix(".restore-")
            .suffix(".tmp")
            .tempfile_in(self.databases.root())?;
        let mut source = File::open(artifact.path())?;
        io::copy(&mut source, temp.as_file_mut())?;
        temp.as_file().sync_all()?;

        // Journals of the file being replaced would be replayed against the restored pages
        remove_sidecars(target.path())?;

        let persisted = if overwrite {
            temp.persist(target.path())
        } else {
            temp.persist_noclobber(target.path())
        };
        persisted.map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                ShelfError::already_exists(Entity::Database, target_name)
            } else {
                ShelfError::Io(e.error)
            }
        })?;

        info!(artifact = %artifact_name, db = %target_name, overwrite, "restore complete");
        DatabaseFile::from_resolved(&target)
    }

    /// Check an artifact's integrity
    ///
    /// Returns `Ok(false)` for a missing, truncated or corrupt artifact.
    ///
    /// # Errors
    ///
    /// Only for names that fail validation or containment.
    pub fn verify(&self, artifact_name: &str) -> ShelfResult<bool> {
        let artifact = self.backups.resolve(artifact_name, Existence::Any)?;
        if !artifact.exists() {
            return Ok(false);
        }

        match verify_file(artifact.path()) {
            Ok(()) => Ok(true),
            Err(reason) => {
                warn!(artifact = %artifact_name, reason = %reason, "artifact failed verification");
                Ok(false)
            }
        }
    }

    /// Artifacts, newest first, optionally only those of one database
    pub fn list(&self, db_name: Option<&str>, verify: bool) -> ShelfResult<Vec<BackupArtifact>> {
        if let Some(name) = db_name {
            validate_database_name(name, &self.extensions)?;
        }

        let mut artifacts = Vec::new();
        for entry in fs::read_dir(self.backups.root())? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Ok(parsed) = ArtifactName::parse(&name, &self.extensions) else {
                continue;
            };
            if db_name.is_some_and(|db| db != parsed.source()) {
                continue;
            }

            let resolved = match self.backups.resolve(&name, Existence::MustExist) {
                Ok(resolved) => resolved,
                Err(e) => {
                    debug!(artifact = %name, kind = %e.kind(), "skipping backup entry");
                    continue;
                }
            };

            let mut artifact = describe(&parsed, &resolved)?;
            if verify {
                artifact.valid = Some(verify_file(resolved.path()).is_ok());
            }
            artifacts.push(artifact);
        }

        artifacts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(artifacts)
    }

    pub fn delete(&self, artifact_name: &str) -> ShelfResult<()> {
        let artifact = self.backups.resolve(artifact_name, Existence::MustExist)?;
        fs::remove_file(artifact.path())?;
        info!(artifact = %artifact_name, "deleted backup artifact");
        Ok(())
    }

    /// Parse an artifact name with the configured extensions
    pub fn parse_name(&self, artifact_name: &str) -> ShelfResult<ArtifactName> {
        ArtifactName::parse(artifact_name, &self.extensions)
    }

    fn allocate(&self, db_name: &str) -> ShelfResult<(ArtifactName, ResolvedPath)> {
        let mut at = Utc::now();
        loop {
            let artifact = ArtifactName::new(db_name, at);
            let resolved = self.backups.resolve(artifact.as_str(), Existence::Any)?;
            if !resolved.exists() {
                return Ok((artifact, resolved));
            }
            at += TimeDelta::milliseconds(1);
        }
    }
}

/// Move a finished copy to its artifact path and verify it there
///
/// An artifact that fails verification is removed before `BackupFailed` is
/// returned.
fn commit_artifact(temp: NamedTempFile, target: &Path, artifact_name: &str) -> ShelfResult<()> {
    temp.as_file().sync_all()?;
    temp.persist_noclobber(target)
        .map_err(|e| ShelfError::Io(e.error))?;

    if let Err(reason) = verify_file(target) {
        warn!(
            artifact = %artifact_name,
            state = %BackupState::Failed,
            reason = %reason,
            "backup failed verification"
        );
        fs::remove_file(target)?;
        return Err(ShelfError::BackupFailed(format!(
            "artifact '{}' failed verification: {}",
            artifact_name, reason
        )));
    }
    Ok(())
}

fn describe(artifact: &ArtifactName, resolved: &ResolvedPath) -> ShelfResult<BackupArtifact> {
    let size_bytes = fs::metadata(resolved.path())?.len();
    Ok(BackupArtifact {
        name: artifact.as_str().to_string(),
        source_database: artifact.source().to_string(),
        path: resolved.path().to_path_buf(),
        size_bytes,
        created_at: artifact.created_at(),
        valid: None,
    })
}

/// Header checks followed by an engine-level probe
///
/// The header must carry the SQLite magic string and a legal page size, and
/// the file must be at least as long as the header claims. The engine then
/// opens the file read-only and must pass `quick_check` and read the catalog.
pub(crate) fn verify_file(path: &Path) -> Result<(), String> {
    let mut file = File::open(path).map_err(|e| e.to_string())?;
    let length = file.metadata().map_err(|e| e.to_string())?.len();

    let mut header = [0u8; HEADER_LEN];
    file.read_exact(&mut header)
        .map_err(|_| "file is shorter than the database header".to_string())?;
    drop(file);

    if &header[..SQLITE_MAGIC.len()] != SQLITE_MAGIC {
        return Err("missing SQLite header".to_string());
    }

    let page_size = match u16::from_be_bytes([header[16], header[17]]) {
        1 => 65_536u64,
        raw => u64::from(raw),
    };
    if page_size < 512 || !page_size.is_power_of_two() {
        return Err(format!("invalid page size {}", page_size));
    }
    if length < page_size || length % page_size != 0 {
        return Err("file is truncated".to_string());
    }

    let be_u32 = |offset: usize| {
        u32::from_be_bytes([
            header[offset],
            header[offset + 1],
            header[offset + 2],
            header[offset + 3],
        ])
    };
    // In-header page count is only trustworthy when version-valid-for matches the change counter
    let page_count = u64::from(be_u32(28));
    if page_count > 0 && be_u32(24) == be_u32(92) && length < page_size * page_count {
        return Err(format!(
            "file is truncated: header declares {} pages",
            page_count
        ));
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| e.to_string())?;

    let check: String = conn
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(|e| e.to_string())?;
    if check != "ok" {
        return Err(format!("quick_check reported: {}", check));
    }

    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(|e| e.to_string())?;

    Ok(())
}
