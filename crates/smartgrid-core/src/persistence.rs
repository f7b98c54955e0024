//! Append-only sample logs
//!
//! Two logical streams are written:
//!
//! - accepted log: `timestamp,fft1,fft2,fft3,fft4,power_usage,frequency`
//! - rejected log: `rejected_at,reason,<sample fields>` or
//!   `rejected_at,reason,NULL sample`
//!
//! Every append opens the file, writes one line, flushes, and closes it
//! again, so no handle outlives a call and nothing is buffered between calls.

use crate::sample::Sample;
use crate::TIMESTAMP_FORMAT;
use chrono::NaiveDateTime;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Marker written in place of the sample fields when no sample was pushed
pub const NULL_SAMPLE_MARKER: &str = "NULL sample";

/// Destination for accepted and rejected samples
pub trait SampleSink: Send {
    /// Make sure the accepted log exists (idempotent)
    fn ensure_ready(&mut self) -> io::Result<()>;

    /// Append one accepted sample
    fn append_accepted(&mut self, sample: &Sample) -> io::Result<()>;

    /// Append one rejection record
    fn append_rejected(
        &mut self,
        rejected_at: NaiveDateTime,
        reason: &str,
        sample: Option<&Sample>,
    ) -> io::Result<()>;
}

/// Format the sample fields in log order
pub fn format_sample_fields(sample: &Sample) -> String {
    format!(
        "{},{},{},{},{},{},{}",
        sample.timestamp.format(TIMESTAMP_FORMAT),
        sample.fft1,
        sample.fft2,
        sample.fft3,
        sample.fft4,
        sample.power_usage,
        sample.frequency
    )
}

/// Format a rejection record
///
/// Commas and line breaks in the reason are replaced so the record stays one
/// delimited line.
pub fn format_rejected_line(
    rejected_at: NaiveDateTime,
    reason: &str,
    sample: Option<&Sample>,
) -> String {
    let reason = reason.replace(',', ";").replace(['\n', '\r'], " ");
    let payload = sample
        .map(format_sample_fields)
        .unwrap_or_else(|| NULL_SAMPLE_MARKER.to_string());
    format!(
        "{},{},{}",
        rejected_at.format(TIMESTAMP_FORMAT),
        reason,
        payload
    )
}

/// Append one line to `path` and flush, creating the file if needed
fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    file.flush()
}

/// File-backed sink writing the two logs as UTF-8 text
#[derive(Debug, Clone)]
pub struct FileSink {
    accepted_path: PathBuf,
    rejected_path: PathBuf,
}

impl FileSink {
    /// Create a sink writing to the given accepted and rejected log paths
    pub fn new(accepted_path: impl Into<PathBuf>, rejected_path: impl Into<PathBuf>) -> Self {
        Self {
            accepted_path: accepted_path.into(),
            rejected_path: rejected_path.into(),
        }
    }

    /// Path of the accepted-sample log
    pub fn accepted_path(&self) -> &Path {
        &self.accepted_path
    }

    /// Path of the rejected-sample log
    pub fn rejected_path(&self) -> &Path {
        &self.rejected_path
    }
}

impl SampleSink for FileSink {
    fn ensure_ready(&mut self) -> io::Result<()> {
        if let Some(parent) = self.accepted_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.accepted_path)?;
        tracing::debug!(path = %self.accepted_path.display(), "Accepted sample log ready");
        Ok(())
    }

    fn append_accepted(&mut self, sample: &Sample) -> io::Result<()> {
        append_line(&self.accepted_path, &format_sample_fields(sample))
    }

    fn append_rejected(
        &mut self,
        rejected_at: NaiveDateTime,
        reason: &str,
        sample: Option<&Sample>,
    ) -> io::Result<()> {
        if let Some(parent) = self.rejected_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        append_line(
            &self.rejected_path,
            &format_rejected_line(rejected_at, reason, sample),
        )
    }
}
