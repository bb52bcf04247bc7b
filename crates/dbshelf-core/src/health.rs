//! Liveness report for the database and backup roots

use std::fs;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::config::ShelfConfig;
use crate::files::DatabaseFiles;

/// Overall health of the subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Database and backup roots are both usable
    Healthy,
    /// Databases are reachable but backups are not
    Degraded,
    /// The database root cannot be read
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Check if the subsystem can still serve queries (healthy or degraded)
    pub fn is_operational(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub database_dir_accessible: bool,
    pub backup_dir_accessible: bool,
    pub database_count: usize,
    pub query_logging: bool,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Probe the configured directories
    pub fn assess(config: &ShelfConfig, files: &DatabaseFiles) -> Self {
        let database_dir_accessible = fs::read_dir(config.database_dir()).is_ok();
        let backup_dir_accessible = fs::read_dir(config.backup_dir()).is_ok();

        let database_count = if database_dir_accessible {
            files.list().map(|list| list.len()).unwrap_or_else(|e| {
                warn!(error = %e, "failed to list database files during health check");
                0
            })
        } else {
            0
        };

        let status = match (database_dir_accessible, backup_dir_accessible) {
            (true, true) => HealthStatus::Healthy,
            (true, false) => HealthStatus::Degraded,
            (false, _) => HealthStatus::Unhealthy,
        };

        Self {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            database_dir_accessible,
            backup_dir_accessible,
            database_count,
            query_logging: config.query_logging(),
            checked_at: Utc::now(),
        }
    }
}
