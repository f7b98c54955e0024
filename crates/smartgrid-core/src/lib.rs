//! SmartGrid Core - Sample ingestion, running statistics, and anomaly detection
//!
//! This library provides the session-scoped ingestion pipeline for smart grid
//! sensor readings: each pushed sample is validated, persisted, folded into
//! running statistics, and checked for frequency spikes, spectral spikes, and
//! out-of-band deviation. Detected signals are published to subscribed
//! listeners in a strict order.

pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod loader;
pub mod persistence;
pub mod sample;
pub mod session;
pub mod stats;
pub mod validation;

pub use config::{ServiceConfig, Thresholds};
pub use detector::{Anomaly, AnomalyDetector, Direction};
pub use error::{ConfigError, SessionError};
pub use events::{EventBus, EventListener, LogListener, RecordingListener, SessionEvent};
pub use persistence::{FileSink, SampleSink};
pub use sample::Sample;
pub use session::{IngestionSession, SessionSnapshot};
pub use stats::tracker::StatisticsTracker;

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fraction of the running mean a frequency may deviate before it is out of band
pub const BAND_TOLERANCE: f64 = 0.25;

/// Timestamp format used in persisted records
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
