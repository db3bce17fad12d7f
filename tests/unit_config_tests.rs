//! # Config Module Unit Tests / Config 模块单元测试
//!
//! Tests configuration loading, defaults and path derivation.

use std::fs;
use tempfile::tempdir;

use fleet_runner::core::config::HarnessConfig;
use fleet_runner::core::models::BackendKind;

#[test]
fn test_defaults() {
    let config = HarnessConfig::default();
    assert_eq!(config.language, "en");
    assert_eq!(config.backend, BackendKind::Local);
    assert!(config.workers >= 1);
    assert_eq!(config.build_timeout_secs, 3600);
    assert_eq!(config.remote.max_retries, 3);
}

#[test]
fn test_load_minimal_file_fills_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Harness.toml");
    fs::write(&path, "base_dir = \"/tmp/fleet\"\n").unwrap();

    let config = HarnessConfig::load(&path).unwrap();
    assert_eq!(config.base_dir, "/tmp/fleet");
    assert_eq!(config.backend, BackendKind::Local);
    assert_eq!(config.catalog, "Catalog.toml");
}

#[test]
fn test_load_full_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Harness.toml");
    fs::write(
        &path,
        r#"
language = "zh-CN"
backend = "distributed"
base_dir = "~/fleet-state"
catalog = "repos/Catalog.toml"
workers = 8
build_timeout_secs = 600

[remote]
endpoint = "https://runner.example.com"
poll_interval_secs = 5
max_retries = 2
"#,
    )
    .unwrap();

    let config = HarnessConfig::load(&path).unwrap();
    assert_eq!(config.language, "zh-CN");
    assert_eq!(config.backend, BackendKind::Distributed);
    assert_eq!(config.workers, 8);
    assert_eq!(config.remote.endpoint, "https://runner.example.com");
    assert_eq!(config.remote.poll_interval_secs, 5);

    // Tilde expansion happens at path derivation, not at parse time.
    assert!(!config.base_dir().to_string_lossy().contains('~'));
}

#[test]
fn test_derived_directories_share_base() {
    let config = HarnessConfig {
        base_dir: "/srv/fleet".to_string(),
        ..HarnessConfig::default()
    };
    assert_eq!(config.repos_dir(), std::path::Path::new("/srv/fleet/repos"));
    assert_eq!(config.envs_dir(), std::path::Path::new("/srv/fleet/envs"));
    assert_eq!(config.logs_dir(), std::path::Path::new("/srv/fleet/logs"));
}

#[test]
fn test_invalid_toml_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Harness.toml");
    fs::write(&path, "backend = [not toml\n").unwrap();
    assert!(HarnessConfig::load(&path).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("does-not-exist.toml");
    assert!(HarnessConfig::load(&path).is_err());
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = HarnessConfig::default();
    let serialized = toml::to_string_pretty(&config).unwrap();
    let reparsed: HarnessConfig = toml::from_str(&serialized).unwrap();
    assert_eq!(reparsed.backend, config.backend);
    assert_eq!(reparsed.workers, config.workers);
    assert_eq!(reparsed.remote.endpoint, config.remote.endpoint);
}
