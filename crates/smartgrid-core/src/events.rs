//! Session events and the in-process publish/subscribe bus
//!
//! The session publishes every lifecycle transition and every fired signal to
//! an [`EventBus`]. Listeners are called synchronously in subscription order,
//! so for one sample they observe events in the order the pipeline raised
//! them, and across samples in submission order. A listener that returns an
//! error or panics is logged and skipped; the session never sees the failure.

use crate::detector::{Anomaly, Direction};
use crate::sample::Sample;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// Which check raised a [`SessionEvent::Warning`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// One or more spectral bands above `fft_threshold`
    SpectralThreshold,
    /// Frequency outside ±25% of the running mean
    MeanDeviation,
    /// Frequency outside ±25% of the fixed frequency threshold
    ThresholdDeviation,
}

/// Notification published by an ingestion session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        meta: String,
    },
    /// First accepted sample of the session
    TransferStarted,
    SampleReceived {
        sample: Sample,
    },
    Warning {
        kind: WarningKind,
        message: String,
        sample: Sample,
    },
    FrequencySpike {
        delta: f64,
        direction: Direction,
    },
    SpectralSpike {
        delta: f64,
        direction: Direction,
    },
    OutOfBand {
        frequency: f64,
        running_mean: f64,
        direction: Direction,
    },
    /// Session ended after at least one accepted sample
    TransferCompleted,
    SessionEnded {
        total_accepted: u64,
    },
}

impl SessionEvent {
    /// Event announcing a detected anomaly for `sample`
    pub fn from_anomaly(anomaly: Anomaly, sample: &Sample) -> Self {
        let message = anomaly.warning_message();
        match anomaly {
            Anomaly::FrequencySpike { delta, direction } => {
                SessionEvent::FrequencySpike { delta, direction }
            }
            Anomaly::SpectralSpike { delta, direction } => {
                SessionEvent::SpectralSpike { delta, direction }
            }
            Anomaly::OutOfBand {
                frequency,
                running_mean,
                direction,
            } => SessionEvent::OutOfBand {
                frequency,
                running_mean,
                direction,
            },
            Anomaly::SpectralThreshold { .. } => SessionEvent::Warning {
                kind: WarningKind::SpectralThreshold,
                message: message.unwrap_or_default(),
                sample: sample.clone(),
            },
            Anomaly::MeanDeviation { .. } => SessionEvent::Warning {
                kind: WarningKind::MeanDeviation,
                message: message.unwrap_or_default(),
                sample: sample.clone(),
            },
            Anomaly::ThresholdDeviation { .. } => SessionEvent::Warning {
                kind: WarningKind::ThresholdDeviation,
                message: message.unwrap_or_default(),
                sample: sample.clone(),
            },
        }
    }

    /// Short event name, matching the serialized `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted { .. } => "session_started",
            SessionEvent::TransferStarted => "transfer_started",
            SessionEvent::SampleReceived { .. } => "sample_received",
            SessionEvent::Warning { .. } => "warning",
            SessionEvent::FrequencySpike { .. } => "frequency_spike",
            SessionEvent::SpectralSpike { .. } => "spectral_spike",
            SessionEvent::OutOfBand { .. } => "out_of_band",
            SessionEvent::TransferCompleted => "transfer_completed",
            SessionEvent::SessionEnded { .. } => "session_ended",
        }
    }
}

/// Observer of session events
pub trait EventListener: Send {
    /// Name used when logging listener failures
    fn name(&self) -> &str {
        "listener"
    }

    /// Handle one event. Errors are logged by the bus and otherwise ignored.
    fn on_event(&mut self, event: &SessionEvent) -> anyhow::Result<()>;
}

/// Ordered list of listeners with synchronous fan-out
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn EventListener>>,
}

impl EventBus {
    /// Create a bus with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener after all existing ones
    pub fn subscribe<L: EventListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    /// Number of subscribed listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// True when nobody is listening
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver an event to every listener in subscription order
    pub fn publish(&mut self, event: &SessionEvent) {
        for listener in self.listeners.iter_mut() {
            let result = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        listener = listener.name(),
                        event = event.name(),
                        error = %e,
                        "Event listener failed"
                    );
                }
                Err(panic_info) => {
                    let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "unknown panic".to_string()
                    };
                    tracing::error!(
                        listener = listener.name(),
                        event = event.name(),
                        panic = %msg,
                        "Event listener PANICKED"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.listeners.iter().map(|l| l.name()).collect();
        f.debug_struct("EventBus").field("listeners", &names).finish()
    }
}

/// Writes every event to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl EventListener for LogListener {
    fn name(&self) -> &str {
        "log"
    }

    fn on_event(&mut self, event: &SessionEvent) -> anyhow::Result<()> {
        match event {
            SessionEvent::SessionStarted { meta } => {
                tracing::info!(meta = %meta, "Session started");
            }
            SessionEvent::TransferStarted => tracing::info!("Transfer in progress..."),
            SessionEvent::SampleReceived { sample } => {
                tracing::info!(
                    timestamp = %sample.timestamp,
                    frequency = sample.frequency,
                    "Sample received"
                );
            }
            SessionEvent::Warning { kind, message, sample } => {
                tracing::warn!(kind = ?kind, timestamp = %sample.timestamp, "{}", message);
            }
            SessionEvent::FrequencySpike { delta, direction } => {
                tracing::warn!(delta = *delta, "Frequency spike {}", direction);
            }
            SessionEvent::SpectralSpike { delta, direction } => {
                tracing::warn!(delta = *delta, "Spectral spike {}", direction);
            }
            SessionEvent::OutOfBand {
                frequency,
                running_mean,
                direction,
            } => {
                tracing::warn!(
                    frequency = *frequency,
                    running_mean = *running_mean,
                    "Frequency out of band {}",
                    direction
                );
            }
            SessionEvent::TransferCompleted => tracing::info!("Transfer completed"),
            SessionEvent::SessionEnded { total_accepted } => {
                tracing::info!(total_accepted, "Session ended");
            }
        }
        Ok(())
    }
}

/// Keeps a shared copy of every published event
///
/// Clones share the same buffer, so one clone can be subscribed while another
/// is kept for inspection.
#[derive(Debug, Default, Clone)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl RecordingListener {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events in publish order
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Recorded event names in publish order
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .map(|e| e.iter().map(SessionEvent::name).collect())
            .unwrap_or_default()
    }

    /// Forget recorded events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventListener for RecordingListener {
    fn name(&self) -> &str {
        "recording"
    }

    fn on_event(&mut self, event: &SessionEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("recording buffer poisoned"))?
            .push(event.clone());
        Ok(())
    }
}
