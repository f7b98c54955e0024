//! E2E tests for the producer-side dataset loader
//!
//! Loads CSV files from disk, checks the invalid-rows log, and replays the
//! loaded rows through a session the way `smartgrid replay` does.

use approx::assert_relative_eq;
use smartgrid::loader::{CsvLoader, LoaderError, DEFAULT_ROW_LIMIT};
use smartgrid::{FileSink, IngestionSession, Thresholds};
use std::fmt::Write as _;
use tempfile::TempDir;

const HEADER: &str = "timestamp,voltage,current,power_usage,frequency,pf,fft1,fft2,fft3,fft4";

fn row(minute: u32, frequency: &str) -> String {
    format!(
        "2024-01-01 00:{:02}:00,230.1,10.2,3.45,{},0.98,1.1,2.2,3.3,4.4",
        minute, frequency
    )
}

fn write_dataset(dir: &TempDir, rows: &[String]) -> std::path::PathBuf {
    let mut contents = String::new();
    writeln!(contents, "{}", HEADER).unwrap();
    for r in rows {
        writeln!(contents, "{}", r).unwrap();
    }
    let path = dir.path().join("grid.csv");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_skips_header_and_bad_rows() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(
        &dir,
        &[
            row(0, "50.01"),
            "garbage".to_string(),
            row(1, "not-a-number"),
            String::new(),
            row(2, "49.99"),
        ],
    );
    let invalid_log = dir.path().join("invalid_rows.log");

    let report = CsvLoader::new(&dataset, &invalid_log)
        .load(DEFAULT_ROW_LIMIT)
        .unwrap();

    assert_eq!(report.samples.len(), 2);
    assert_eq!(report.samples[0].frequency, 50.01);
    assert_eq!(report.samples[1].frequency, 49.99);
    assert_eq!(report.invalid_rows, 3);

    let log = std::fs::read_to_string(&invalid_log).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("[ERROR] Too few columns"));
    assert!(lines[0].ends_with("| Row: garbage"));
    assert!(lines[1].starts_with("[ERROR] Invalid number in column 4"));
    // Blank row
    assert!(lines[2].starts_with("[ERROR] Too few columns"));
    assert!(lines[2].contains("got 1"));
    assert!(lines[2].ends_with("| Row: "));
}

#[test]
fn test_load_respects_limit() {
    let dir = TempDir::new().unwrap();
    let rows: Vec<String> = (0..30).map(|m| row(m, "50.0")).collect();
    let dataset = write_dataset(&dir, &rows);

    let report = CsvLoader::new(&dataset, dir.path().join("invalid.log"))
        .load(10)
        .unwrap();
    assert_eq!(report.samples.len(), 10);
    assert_eq!(report.samples[9].timestamp.to_string(), "2024-01-01 00:09:00");
    // No bad rows, no log file
    assert!(!dir.path().join("invalid.log").exists());
}

#[test]
fn test_load_missing_dataset() {
    let dir = TempDir::new().unwrap();
    let err = CsvLoader::new(dir.path().join("missing.csv"), dir.path().join("invalid.log"))
        .load(DEFAULT_ROW_LIMIT)
        .unwrap_err();
    assert!(matches!(err, LoaderError::Open { .. }));
}

#[test]
fn test_load_empty_file() {
    let dir = TempDir::new().unwrap();
    let dataset = dir.path().join("empty.csv");
    std::fs::write(&dataset, "").unwrap();

    let report = CsvLoader::new(&dataset, dir.path().join("invalid.log"))
        .load(DEFAULT_ROW_LIMIT)
        .unwrap();
    assert!(report.samples.is_empty());
    assert_eq!(report.invalid_rows, 0);
}

#[test]
fn test_replay_through_session() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(
        &dir,
        &[
            row(0, "50.0"),
            row(1, "-2.0"),
            row(2, "NaN"),
            row(3, "inf"),
            row(4, "50.4"),
        ],
    );
    let report = CsvLoader::new(&dataset, dir.path().join("invalid.log"))
        .load(DEFAULT_ROW_LIMIT)
        .unwrap();
    assert_eq!(report.samples.len(), 5);

    let sink = FileSink::new(
        dir.path().join("samples.csv"),
        dir.path().join("rejected.log"),
    );
    let mut session = IngestionSession::new(Thresholds::new(5.0, 1.0).unwrap(), sink);
    session.start("replay of grid.csv").unwrap();

    let mut rejected = Vec::new();
    for sample in report.samples {
        if let Err(e) = session.push_sample(Some(sample)) {
            rejected.push(e.reason());
        }
    }

    // NaN and infinite frequencies fail the positive-frequency rule
    assert_eq!(
        rejected,
        vec![
            "frequency must be greater than 0",
            "frequency must be greater than 0",
            "frequency must be greater than 0"
        ]
    );
    assert_relative_eq!(session.state().running_mean_frequency(), 50.2, epsilon = 1e-9);
    assert_eq!(session.end().unwrap(), 2);

    let accepted = std::fs::read_to_string(dir.path().join("samples.csv")).unwrap();
    assert_eq!(accepted.lines().count(), 2);
}
