//! Integration tests for environment-based configuration

use dbshelf_core::{ConfigError, ShelfConfigBuilder};
use serial_test::serial;
use std::env;
use tempfile::tempdir;

fn set_env(key: &str, value: &str) {
    unsafe {
        env::set_var(key, value);
    }
}

fn clear_env(key: &str) {
    unsafe {
        env::remove_var(key);
    }
}

fn clear_all_dbshelf_env_vars() {
    for key in [
        "DBSHELF_DATABASE_DIR",
        "DATABASE_DIR",
        "DBSHELF_DEFAULT_DATABASE",
        "DEFAULT_DATABASE",
        "DBSHELF_ENABLE_QUERY_LOGGING",
        "DBSHELF_MAX_QUERY_LENGTH",
        "DBSHELF_MAX_PAGE_SIZE",
        "DBSHELF_FOREIGN_KEYS",
    ] {
        clear_env(key);
    }
}

#[test]
#[serial]
fn test_env_config_defaults() {
    clear_all_dbshelf_env_vars();
    let dir = tempdir().unwrap();

    let config = ShelfConfigBuilder::from_env()
        .expect("should load defaults when no env vars set")
        .database_dir(dir.path())
        .build()
        .expect("should build valid config");

    assert!(!config.query_logging());
    assert_eq!(config.default_database(), None);
    assert_eq!(config.max_query_length(), 5000);
    assert_eq!(config.max_page_size(), 1000);
    assert!(config.foreign_keys());
    assert_eq!(config.extensions(), ["db", "sqlite", "sqlite3"]);
    assert!(config.backup_dir().is_dir());
}

#[test]
#[serial]
fn test_env_config_database_dir() {
    clear_all_dbshelf_env_vars();
    let dir = tempdir().unwrap();
    let root = dir.path().join("shelf");
    set_env("DBSHELF_DATABASE_DIR", root.to_str().unwrap());

    let config = ShelfConfigBuilder::from_env()
        .expect("should load config")
        .build()
        .expect("should build valid config");

    assert_eq!(config.database_dir(), root.canonicalize().unwrap());
    assert!(root.join("backups").is_dir());

    clear_env("DBSHELF_DATABASE_DIR");
}

#[test]
#[serial]
fn test_env_config_legacy_names() {
    clear_all_dbshelf_env_vars();
    let dir = tempdir().unwrap();
    set_env("DATABASE_DIR", dir.path().to_str().unwrap());
    set_env("DEFAULT_DATABASE", "main.db");

    let config = ShelfConfigBuilder::from_env()
        .expect("should load config")
        .build()
        .expect("should build valid config");

    assert_eq!(config.database_dir(), dir.path().canonicalize().unwrap());
    assert_eq!(config.default_database(), Some("main.db"));

    clear_env("DATABASE_DIR");
    clear_env("DEFAULT_DATABASE");
}

#[test]
#[serial]
fn test_env_config_query_logging_creates_logs_dir() {
    clear_all_dbshelf_env_vars();
    let dir = tempdir().unwrap();
    set_env("DBSHELF_ENABLE_QUERY_LOGGING", "yes");

    let config = ShelfConfigBuilder::from_env()
        .expect("should load config")
        .database_dir(dir.path())
        .build()
        .expect("should build valid config");

    assert!(config.query_logging());
    assert!(config.logs_dir().is_dir());

    clear_env("DBSHELF_ENABLE_QUERY_LOGGING");
}

#[test]
#[serial]
fn test_env_config_limits() {
    clear_all_dbshelf_env_vars();
    let dir = tempdir().unwrap();
    set_env("DBSHELF_MAX_QUERY_LENGTH", "200");
    set_env("DBSHELF_MAX_PAGE_SIZE", "50");
    set_env("DBSHELF_FOREIGN_KEYS", "off");

    let config = ShelfConfigBuilder::from_env()
        .expect("should load config")
        .database_dir(dir.path())
        .build()
        .expect("should build valid config");

    assert_eq!(config.max_query_length(), 200);
    assert_eq!(config.max_page_size(), 50);
    assert!(!config.foreign_keys());

    clear_all_dbshelf_env_vars();
}

#[test]
#[serial]
fn test_env_config_invalid_bool() {
    clear_all_dbshelf_env_vars();
    set_env("DBSHELF_ENABLE_QUERY_LOGGING", "maybe");

    let result = ShelfConfigBuilder::from_env();
    match result {
        Err(ConfigError::InvalidEnvVar { key, .. }) => {
            assert_eq!(key, "DBSHELF_ENABLE_QUERY_LOGGING");
        }
        other => panic!("expected InvalidEnvVar, got {other:?}"),
    }

    clear_env("DBSHELF_ENABLE_QUERY_LOGGING");
}

#[test]
#[serial]
fn test_env_config_invalid_number() {
    clear_all_dbshelf_env_vars();
    set_env("DBSHELF_MAX_PAGE_SIZE", "lots");

    assert!(matches!(
        ShelfConfigBuilder::from_env(),
        Err(ConfigError::InvalidEnvVar { .. })
    ));

    clear_env("DBSHELF_MAX_PAGE_SIZE");
}

#[test]
#[serial]
fn test_env_config_zero_limits_fail_validation() {
    clear_all_dbshelf_env_vars();
    let dir = tempdir().unwrap();
    set_env("DBSHELF_MAX_QUERY_LENGTH", "0");

    let result = ShelfConfigBuilder::from_env()
        .expect("should load config")
        .database_dir(dir.path())
        .build();
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));

    clear_env("DBSHELF_MAX_QUERY_LENGTH");
}

#[test]
#[serial]
fn test_env_config_invalid_default_database() {
    clear_all_dbshelf_env_vars();
    let dir = tempdir().unwrap();
    set_env("DBSHELF_DEFAULT_DATABASE", "../outside.db");

    let result = ShelfConfigBuilder::from_env()
        .expect("should load config")
        .database_dir(dir.path())
        .build();
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));

    clear_env("DBSHELF_DEFAULT_DATABASE");
}
