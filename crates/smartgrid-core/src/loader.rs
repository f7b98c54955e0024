//! Producer-side CSV loader
//!
//! Reads smart grid dataset rows and turns them into [`Sample`]s for replay
//! through a session. Column layout of the dataset:
//!
//! | column | field |
//! |---|---|
//! | 0 | timestamp |
//! | 3 | power usage (kW) |
//! | 4 | frequency (Hz) |
//! | 6..=9 | FFT bands 1..4 |
//!
//! Rows that cannot be parsed are appended to an invalid-rows log as
//! `[ERROR] <reason> | Row: <line>` and skipped.

use crate::sample::Sample;
use chrono::NaiveDateTime;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Default number of valid rows loaded per replay
pub const DEFAULT_ROW_LIMIT: usize = 100;

/// Minimum number of columns a dataset row must have
const MIN_COLUMNS: usize = 10;

const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Why a single row was skipped
#[derive(Error, Debug, PartialEq)]
pub enum RowError {
    #[error("Too few columns: expected at least {expected}, got {actual}")]
    TooFewColumns { expected: usize, actual: usize },

    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("Invalid number in column {column}: {value:?}")]
    InvalidNumber { column: usize, value: String },
}

/// Errors that stop a load entirely
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to open dataset {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while loading dataset: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of loading a dataset
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Parsed samples in file order
    pub samples: Vec<Sample>,
    /// Rows written to the invalid-rows log
    pub invalid_rows: usize,
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, RowError> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| RowError::InvalidTimestamp(raw.to_string()))
}

fn parse_number(parts: &[&str], column: usize) -> Result<f64, RowError> {
    let raw = parts[column].trim();
    raw.parse::<f64>().map_err(|_| RowError::InvalidNumber {
        column,
        value: raw.to_string(),
    })
}

/// Parse one dataset row
pub fn parse_row(line: &str) -> Result<Sample, RowError> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < MIN_COLUMNS {
        return Err(RowError::TooFewColumns {
            expected: MIN_COLUMNS,
            actual: parts.len(),
        });
    }

    Ok(Sample::new(
        parse_timestamp(parts[0])?,
        parse_number(&parts, 4)?,
        parse_number(&parts, 3)?,
        [
            parse_number(&parts, 6)?,
            parse_number(&parts, 7)?,
            parse_number(&parts, 8)?,
            parse_number(&parts, 9)?,
        ],
    ))
}

/// Loads the first valid rows of a dataset
#[derive(Debug, Clone)]
pub struct CsvLoader {
    dataset_path: PathBuf,
    invalid_rows_log: PathBuf,
}

impl CsvLoader {
    /// Create a loader for `dataset_path`, logging bad rows to `invalid_rows_log`
    pub fn new(dataset_path: impl Into<PathBuf>, invalid_rows_log: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            invalid_rows_log: invalid_rows_log.into(),
        }
    }

    /// Load up to `limit` valid rows, skipping the header line
    ///
    /// Both files are closed before this returns, on success and on error.
    pub fn load(&self, limit: usize) -> Result<LoadReport, LoaderError> {
        let file = File::open(&self.dataset_path).map_err(|source| LoaderError::Open {
            path: self.dataset_path.display().to_string(),
            source,
        })?;
        let mut lines = BufReader::new(file).lines();
        let mut invalid_log: Option<File> = None;
        let mut report = LoadReport::default();

        // Header
        if lines.next().transpose()?.is_none() {
            return Ok(report);
        }

        for line in lines {
            if report.samples.len() >= limit {
                break;
            }
            let line = line?;

            // A blank row is logged as a short row
            match parse_row(&line) {
                Ok(sample) => report.samples.push(sample),
                Err(e) => {
                    if invalid_log.is_none() {
                        invalid_log = Some(
                            OpenOptions::new()
                                .create(true)
                                .append(true)
                                .open(&self.invalid_rows_log)?,
                        );
                    }
                    if let Some(log) = invalid_log.as_mut() {
                        writeln!(log, "[ERROR] {} | Row: {}", e, line)?;
                    }
                    report.invalid_rows += 1;
                }
            }
        }

        if let Some(mut log) = invalid_log {
            log.flush()?;
        }

        tracing::info!(
            path = %self.dataset_path.display(),
            loaded = report.samples.len(),
            invalid = report.invalid_rows,
            "Dataset loaded"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: &str = "2024-01-01 00:00:00,230.1,10.2,3.45,50.02,0.98,1.1,2.2,3.3,4.4";

    #[test]
    fn test_parse_row_column_mapping() {
        let sample = parse_row(ROW).unwrap();
        assert_eq!(sample.timestamp.to_string(), "2024-01-01 00:00:00");
        assert_eq!(sample.power_usage, 3.45);
        assert_eq!(sample.frequency, 50.02);
        assert_eq!(sample.spectral(), [1.1, 2.2, 3.3, 4.4]);
    }

    #[test]
    fn test_parse_row_too_few_columns() {
        assert_eq!(
            parse_row("2024-01-01 00:00:00,1,2,3,4,5,6"),
            Err(RowError::TooFewColumns {
                expected: 10,
                actual: 7
            })
        );
    }

    #[test]
    fn test_parse_row_blank_is_too_few_columns() {
        assert_eq!(
            parse_row(""),
            Err(RowError::TooFewColumns {
                expected: 10,
                actual: 1
            })
        );
    }

    #[test]
    fn test_parse_row_bad_number() {
        let row = "2024-01-01 00:00:00,230.1,10.2,3.45,fifty,0.98,1.1,2.2,3.3,4.4";
        assert_eq!(
            parse_row(row),
            Err(RowError::InvalidNumber {
                column: 4,
                value: "fifty".to_string()
            })
        );
    }

    #[test]
    fn test_parse_row_nan_passes_through() {
        // NaN is a valid f64 literal; the session rejects it, not the loader
        let row = "2024-01-01 00:00:00,230.1,10.2,3.45,50.0,0.98,NaN,2.2,3.3,4.4";
        assert!(parse_row(row).unwrap().fft1.is_nan());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-01-01T12:30:00").is_ok());
        assert!(parse_timestamp("01/31/2024 12:30").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
