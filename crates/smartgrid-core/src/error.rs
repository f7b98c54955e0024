//! Error types for session operations and configuration

use crate::validation::RejectReason;
use thiserror::Error;

/// Errors surfaced by [`crate::session::IngestionSession`] operations
///
/// Per-sample errors (`ValidationFailed`, `PersistenceFailed`) never end the
/// session; the producer may keep pushing.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    ValidationFailed(RejectReason),

    #[error("Failed to persist sample: {0}")]
    PersistenceFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The reject log itself could not be written
    #[error("Failed to write reject log: {0}")]
    RejectLog(#[source] std::io::Error),

    /// The accepted-sample log could not be created at session start
    #[error("Failed to prepare sample log: {0}")]
    SinkUnavailable(#[source] std::io::Error),
}

impl SessionError {
    /// Reason text suitable for a fault body returned to the producer
    pub fn reason(&self) -> String {
        match self {
            SessionError::ValidationFailed(reason) => reason.to_string(),
            SessionError::InvalidArgument(msg)
            | SessionError::PersistenceFailed(msg)
            | SessionError::InvalidState(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors raised while loading service configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing threshold: {0}")]
    MissingThreshold(&'static str),

    #[error("Invalid threshold {name}: {value:?} is not a positive number")]
    InvalidThreshold { name: &'static str, value: String },

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
