//! E2E tests for service configuration
//!
//! Tests config round-trip, defaults, override precedence, and the
//! fail-fast behavior for missing or invalid thresholds.

use smartgrid::error::ConfigError;
use smartgrid::{ServiceConfig, Thresholds};
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, json: &str) -> PathBuf {
    let path = dir.path().join("smartgrid.json");
    std::fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_load_applies_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"fft_threshold": 5.0, "frequency_threshold": 1.0}"#);

    let config = ServiceConfig::load(&path).unwrap();
    let thresholds = config.thresholds().unwrap();
    assert_eq!(thresholds.fft_threshold(), 5.0);
    assert_eq!(thresholds.frequency_threshold(), 1.0);
    assert_eq!(config.accepted_path(), PathBuf::from(".").join("samples.csv"));
    assert_eq!(config.rejected_path(), PathBuf::from(".").join("rejected.log"));
    assert_eq!(config.server.bind_addr, "127.0.0.1");
    assert_eq!(config.server.port, 8930);
}

#[test]
fn test_load_custom_paths_and_server() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{
            "fft_threshold": 2.5,
            "frequency_threshold": 0.5,
            "data_dir": "/var/lib/smartgrid",
            "accepted_log": "accepted.csv",
            "rejected_log": "errors.log",
            "server": {"port": 9000}
        }"#,
    );

    let config = ServiceConfig::load(&path).unwrap();
    assert_eq!(
        config.accepted_path(),
        PathBuf::from("/var/lib/smartgrid/accepted.csv")
    );
    assert_eq!(
        config.rejected_path(),
        PathBuf::from("/var/lib/smartgrid/errors.log")
    );
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.bind_addr, "127.0.0.1");
}

#[test]
fn test_load_missing_threshold_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"fft_threshold": 5.0}"#);

    let err = ServiceConfig::load(&path).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::MissingThreshold("frequency_threshold")
    ));
}

#[test]
fn test_load_non_positive_threshold_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"fft_threshold": 0.0, "frequency_threshold": 1.0}"#);

    let err = ServiceConfig::load(&path).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidThreshold {
            name: "fft_threshold",
            ..
        }
    ));
}

#[test]
fn test_load_unreadable_and_malformed_files() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.json");
    assert!(matches!(
        ServiceConfig::load(&missing),
        Err(ConfigError::Read { .. })
    ));

    let path = write_config(&dir, "{ not json");
    assert!(matches!(
        ServiceConfig::load(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_overrides_replace_file_values() {
    let mut config = ServiceConfig::with_thresholds(Thresholds::new(5.0, 1.0).unwrap());
    config.apply_overrides(Some(" 7.5 "), None).unwrap();

    let thresholds = config.thresholds().unwrap();
    assert_eq!(thresholds.fft_threshold(), 7.5);
    assert_eq!(thresholds.frequency_threshold(), 1.0);

    let err = config.apply_overrides(None, Some("fast")).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidThreshold {
            name: "frequency_threshold",
            ..
        }
    ));
}

#[test]
fn test_threshold_text_parsing() {
    assert!(Thresholds::parse(Some("5"), Some("1.0")).is_ok());
    assert!(matches!(
        Thresholds::parse(None, Some("1.0")),
        Err(ConfigError::MissingThreshold("fft_threshold"))
    ));
    assert!(matches!(
        Thresholds::parse(Some("  "), Some("1.0")),
        Err(ConfigError::MissingThreshold("fft_threshold"))
    ));
    assert!(Thresholds::parse(Some("-3"), Some("1.0")).is_err());
    assert!(Thresholds::parse(Some("inf"), Some("1.0")).is_err());
    assert!(Thresholds::parse(Some("NaN"), Some("1.0")).is_err());
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("smartgrid.json");

    let mut config = ServiceConfig::with_thresholds(Thresholds::new(4.0, 0.25).unwrap());
    config.data_dir = PathBuf::from("logs");
    config.server.port = 9123;
    config.save(&path).unwrap();

    let loaded = ServiceConfig::load(&path).unwrap();
    assert_eq!(loaded.thresholds().unwrap(), Thresholds::new(4.0, 0.25).unwrap());
    assert_eq!(loaded.data_dir, PathBuf::from("logs"));
    assert_eq!(loaded.server.port, 9123);
}
