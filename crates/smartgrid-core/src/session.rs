//! Session-scoped ingestion pipeline
//!
//! An [`IngestionSession`] moves between two states:
//!
//! ```text
//!   Idle --start--> Active --end--> Idle
//!                    |  ^
//!                    push_sample
//! ```
//!
//! Each pushed sample goes through validate -> persist -> statistics ->
//! anomaly detection -> publish. A sample that fails validation or cannot be
//! persisted is written to the reject log and never reaches the statistics;
//! the session stays active either way.
//!
//! The session takes `&mut self` for every operation, so callers sharing it
//! across threads must serialize access (see `smartgrid-server`'s session
//! actor).

use crate::config::Thresholds;
use crate::detector::AnomalyDetector;
use crate::error::SessionError;
use crate::events::{EventBus, EventListener, SessionEvent};
use crate::persistence::SampleSink;
use crate::sample::Sample;
use crate::stats::tracker::StatisticsTracker;
use crate::validation;
use chrono::NaiveDateTime;
use serde::Serialize;

/// Mutable per-session state, reset by every `start`
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    active: bool,
    meta: Option<String>,
    tracker: StatisticsTracker,
    rejected_count: u64,
    streaming: bool,
}

impl SessionState {
    /// True between `start` and `end`
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once the first sample of the session passed validation
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Accepted samples this session
    pub fn sample_count(&self) -> u64 {
        self.tracker.state().count
    }

    /// Rejected samples this session
    pub fn rejected_count(&self) -> u64 {
        self.rejected_count
    }

    /// Running mean frequency over accepted samples
    pub fn running_mean_frequency(&self) -> f64 {
        self.tracker.state().running_mean
    }

    /// Frequency of the last accepted sample
    pub fn previous_frequency(&self) -> Option<f64> {
        self.tracker.state().previous_frequency
    }

    /// Spectral mean of the last accepted sample
    pub fn previous_spectral_mean(&self) -> Option<f64> {
        self.tracker.state().previous_spectral_mean
    }

    /// Metadata passed to `start`
    pub fn meta(&self) -> Option<&str> {
        self.meta.as_deref()
    }
}

/// Serializable view of a session, used by status queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub active: bool,
    pub meta: Option<String>,
    pub accepted: u64,
    pub rejected: u64,
    pub running_mean_frequency: f64,
    pub previous_frequency: Option<f64>,
    pub previous_spectral_mean: Option<f64>,
    pub streaming: bool,
}

/// Validates, persists, and analyzes samples for one producer
pub struct IngestionSession<S: SampleSink> {
    detector: AnomalyDetector,
    sink: S,
    bus: EventBus,
    state: SessionState,
}

impl<S: SampleSink> IngestionSession<S> {
    /// Create an idle session with no listeners
    pub fn new(thresholds: Thresholds, sink: S) -> Self {
        Self {
            detector: AnomalyDetector::new(thresholds),
            sink,
            bus: EventBus::new(),
            state: SessionState::default(),
        }
    }

    /// Add an event listener after all existing ones
    pub fn subscribe<L: EventListener + 'static>(&mut self, listener: L) {
        self.bus.subscribe(listener);
    }

    /// Configured thresholds
    pub fn thresholds(&self) -> Thresholds {
        self.detector.thresholds()
    }

    /// Current session state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Underlying sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Serializable view of the current state
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active: self.state.active,
            meta: self.state.meta.clone(),
            accepted: self.state.sample_count(),
            rejected: self.state.rejected_count,
            running_mean_frequency: self.state.running_mean_frequency(),
            previous_frequency: self.state.previous_frequency(),
            previous_spectral_mean: self.state.previous_spectral_mean(),
            streaming: self.state.streaming,
        }
    }

    /// Start a new session
    ///
    /// Resets all statistics and makes sure the accepted log exists. Calling
    /// `start` on an active session discards it and starts over.
    ///
    /// # Errors
    /// `InvalidArgument` when `meta` is empty or whitespace
    pub fn start(&mut self, meta: &str) -> Result<(), SessionError> {
        if meta.trim().is_empty() {
            return Err(SessionError::InvalidArgument(
                "session metadata cannot be empty".to_string(),
            ));
        }

        if self.state.active {
            tracing::warn!(
                previous = self.state.meta().unwrap_or_default(),
                accepted = self.state.sample_count(),
                "Session restarted before end, discarding previous session"
            );
        }

        self.sink
            .ensure_ready()
            .map_err(SessionError::SinkUnavailable)?;

        self.state = SessionState {
            active: true,
            meta: Some(meta.to_string()),
            ..SessionState::default()
        };

        self.bus.publish(&SessionEvent::SessionStarted {
            meta: meta.to_string(),
        });
        Ok(())
    }

    /// Push one sample through the pipeline
    ///
    /// `None` models a null sample arriving from the transport and is rejected.
    ///
    /// # Errors
    /// - `InvalidState` when no session is active (nothing is written)
    /// - `ValidationFailed` when a validation rule fails (sample is in the reject log)
    /// - `PersistenceFailed` when the accepted log cannot be written (sample is in the reject log)
    pub fn push_sample(&mut self, sample: Option<Sample>) -> Result<(), SessionError> {
        if !self.state.active {
            return Err(SessionError::InvalidState(
                "no active session, call start first".to_string(),
            ));
        }

        let sample = match validation::validate(sample.as_ref()) {
            Ok(sample) => sample,
            Err(reason) => {
                tracing::debug!(reason = %reason, "Sample rejected");
                self.reject(&reason.to_string(), sample.as_ref())?;
                return Err(SessionError::ValidationFailed(reason));
            }
        };

        if !self.state.streaming {
            self.state.streaming = true;
            self.bus.publish(&SessionEvent::TransferStarted);
        }

        if let Err(e) = self.sink.append_accepted(sample) {
            tracing::error!(error = %e, timestamp = %sample.timestamp, "Failed to persist sample");
            self.reject(&e.to_string(), Some(sample))?;
            return Err(SessionError::PersistenceFailed(e.to_string()));
        }

        self.bus.publish(&SessionEvent::SampleReceived {
            sample: sample.clone(),
        });

        let observation = self.state.tracker.observe(sample);
        for anomaly in self.detector.evaluate(sample, &observation) {
            self.bus
                .publish(&SessionEvent::from_anomaly(anomaly, sample));
        }

        Ok(())
    }

    /// End the active session
    ///
    /// # Returns
    /// Number of samples accepted during the session
    ///
    /// # Errors
    /// `InvalidState` when no session is active
    pub fn end(&mut self) -> Result<u64, SessionError> {
        if !self.state.active {
            return Err(SessionError::InvalidState("no active session".to_string()));
        }

        if self.state.streaming {
            self.bus.publish(&SessionEvent::TransferCompleted);
        }

        let total_accepted = self.state.sample_count();
        self.bus
            .publish(&SessionEvent::SessionEnded { total_accepted });
        self.state.active = false;
        Ok(total_accepted)
    }

    /// Write a rejection record; failure here is fatal for the call
    fn reject(&mut self, reason: &str, sample: Option<&Sample>) -> Result<(), SessionError> {
        self.sink
            .append_rejected(rejected_at(), reason, sample)
            .map_err(SessionError::RejectLog)?;
        self.state.rejected_count += 1;
        Ok(())
    }
}

fn rejected_at() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
