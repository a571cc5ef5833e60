//! Configuration loading and root folder resolution
//!
//! Tests that touch `KKD_ROOT_FOLDER` are marked `#[serial]` so they do not
//! race each other.

use kkd_common::config::{
    default_root_folder, RootFolder, RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_defaults_without_file() {
    let config = TomlConfig::default();
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.auth.token_ttl_minutes, 30);
    assert_eq!(config.uploads.max_file_mb, 10);
    assert!(config.detector.endpoint.is_none());
    assert!((config.detector.confidence_threshold - 0.25).abs() < f64::EPSILON);
    assert!(config.seminars.source_url.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_partial_toml_keeps_other_defaults() {
    let config = TomlConfig::from_toml_str(
        r#"
        root_folder = "/srv/kkodurami"

        [server]
        port = 9100

        [detector]
        endpoint = "http://127.0.0.1:9000/predict"
        labels = ["aphid", "leaf_blight"]
        "#,
    )
    .unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/kkodurami")));
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.max_body_mb, 50);
    assert_eq!(
        config.detector.endpoint.as_deref(),
        Some("http://127.0.0.1:9000/predict")
    );
    assert_eq!(config.detector.labels, vec!["aphid", "leaf_blight"]);
    assert_eq!(config.detector.max_detections, 50);
    assert_eq!(config.auth.token_ttl_minutes, 30);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let err = TomlConfig::from_toml_str("[server\nport = ").unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_explicit_missing_file_fails() {
    let missing = PathBuf::from("/nonexistent/kkodurami/config.toml");
    assert!(TomlConfig::load(Some(&missing)).is_err());
}

#[test]
fn test_explicit_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[uploads]\nmax_files = 3\n").unwrap();

    let config = TomlConfig::load(Some(&path)).unwrap();
    assert_eq!(config.uploads.max_files, 3);
}

#[test]
fn test_byte_limits() {
    let config = TomlConfig::from_toml_str("[uploads]\nmax_file_mb = 2\n[server]\nmax_body_mb = 4\n")
        .unwrap();
    assert_eq!(config.max_file_bytes(), 2 * 1024 * 1024);
    assert_eq!(config.max_body_bytes(), 4 * 1024 * 1024);
}

#[test]
#[serial]
fn test_cli_arg_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/kkd-from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/kkd-from-toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/kkd-from-cli")))
        .with_toml(&toml)
        .resolve();

    assert_eq!(resolved, PathBuf::from("/tmp/kkd-from-cli"));
    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/kkd-from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/kkd-from-toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new().with_toml(&toml).resolve();

    assert_eq!(resolved, PathBuf::from("/tmp/kkd-from-env"));
    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_then_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/kkd-from-toml")),
        ..Default::default()
    };

    assert_eq!(
        RootFolderResolver::new().with_toml(&toml).resolve(),
        PathBuf::from("/tmp/kkd-from-toml")
    );
    assert_eq!(RootFolderResolver::new().resolve(), default_root_folder());
}

#[test]
fn test_root_folder_layout() {
    let dir = tempfile::tempdir().unwrap();
    let root = RootFolder::new(dir.path().join("data"));
    root.ensure_directories().unwrap();

    assert!(root.static_dir().is_dir());
    assert_eq!(root.database_path(), dir.path().join("data").join("kkodurami.db"));
}
