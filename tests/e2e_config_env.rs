//! E2E tests for environment threshold overrides
//!
//! Kept in their own test binary: environment variables are process-wide,
//! and the file-only config tests must never see these values. Tests here
//! take `ENV_LOCK` so they don't race each other either.

use smartgrid::config::{FFT_THRESHOLD_ENV, FREQUENCY_THRESHOLD_ENV};
use smartgrid::error::ConfigError;
use smartgrid::ServiceConfig;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn write_config(dir: &TempDir, json: &str) -> PathBuf {
    let path = dir.path().join("smartgrid.json");
    std::fs::write(&path, json).unwrap();
    path
}

fn clear_env() {
    std::env::remove_var(FFT_THRESHOLD_ENV);
    std::env::remove_var(FREQUENCY_THRESHOLD_ENV);
}

#[test]
fn test_load_env_overrides_file_thresholds() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"fft_threshold": 5.0, "frequency_threshold": 1.0}"#);

    clear_env();
    std::env::set_var(FFT_THRESHOLD_ENV, "9.5");
    let result = ServiceConfig::load(&path);
    clear_env();

    let thresholds = result.unwrap().thresholds().unwrap();
    assert_eq!(thresholds.fft_threshold(), 9.5);
    assert_eq!(thresholds.frequency_threshold(), 1.0);
}

#[test]
fn test_load_env_fills_missing_threshold() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"fft_threshold": 5.0}"#);

    clear_env();
    std::env::set_var(FREQUENCY_THRESHOLD_ENV, "0.25");
    let result = ServiceConfig::load(&path);
    clear_env();

    let thresholds = result.unwrap().thresholds().unwrap();
    assert_eq!(thresholds.fft_threshold(), 5.0);
    assert_eq!(thresholds.frequency_threshold(), 0.25);
}

#[test]
fn test_load_invalid_env_value_is_fatal() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"fft_threshold": 5.0, "frequency_threshold": 1.0}"#);

    clear_env();
    std::env::set_var(FFT_THRESHOLD_ENV, "loud");
    let result = ServiceConfig::load(&path);
    clear_env();

    assert!(matches!(
        result.unwrap_err(),
        ConfigError::InvalidThreshold {
            name: "fft_threshold",
            ..
        }
    ));
}
