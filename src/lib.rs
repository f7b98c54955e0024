//! SmartGrid - sensor sample ingestion with live anomaly detection
//!
//! This library re-exports the session pipeline from `smartgrid-core`.
//! The HTTP service lives in `smartgrid-server`.

pub use smartgrid_core::{
    config, detector, error, events, loader, persistence, sample, session, stats, validation,
};

pub use smartgrid_core::{
    Anomaly, AnomalyDetector, Direction, EventBus, EventListener, FileSink, IngestionSession,
    LogListener, RecordingListener, Sample, SampleSink, ServiceConfig, SessionError,
    SessionEvent, SessionSnapshot, StatisticsTracker, Thresholds,
};
pub use smartgrid_core::{BAND_TOLERANCE, TIMESTAMP_FORMAT, VERSION};
