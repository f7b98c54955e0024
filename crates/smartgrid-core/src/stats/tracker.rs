//! Incremental statistics over accepted samples
//!
//! The tracker never performs I/O. Given the previous state and a new sample
//! it produces the next state, and the pair is handed to the anomaly detector.

use crate::sample::Sample;
use serde::Serialize;

/// Statistics state after some number of accepted samples
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct TrackerState {
    /// Accepted samples folded into the mean
    pub count: u64,
    /// Running mean frequency (Hz), 0 before the first sample
    pub running_mean: f64,
    /// Frequency of the last accepted sample
    pub previous_frequency: Option<f64>,
    /// Spectral mean of the last accepted sample
    pub previous_spectral_mean: Option<f64>,
}

impl TrackerState {
    /// Fold one sample into the state
    ///
    /// The mean update is `mean + (f - mean) / (count + 1)`, the Welford form
    /// of `(mean * count + f) / (count + 1)`.
    pub fn advance(&self, sample: &Sample) -> TrackerState {
        let next_count = self.count + 1;
        let running_mean =
            self.running_mean + (sample.frequency - self.running_mean) / next_count as f64;

        TrackerState {
            count: next_count,
            running_mean,
            previous_frequency: Some(sample.frequency),
            previous_spectral_mean: Some(sample.spectral_mean()),
        }
    }
}

/// Result of observing one sample: the state before and after the update
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub before: TrackerState,
    pub after: TrackerState,
}

/// Per-session running statistics
#[derive(Debug, Default, Clone)]
pub struct StatisticsTracker {
    state: TrackerState,
}

impl StatisticsTracker {
    /// Create a tracker with no samples observed
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an accepted sample into the statistics
    pub fn observe(&mut self, sample: &Sample) -> Observation {
        let before = self.state;
        self.state = before.advance(sample);
        Observation {
            before,
            after: self.state,
        }
    }

    /// Current statistics
    pub fn state(&self) -> &TrackerState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDateTime;

    fn sample(frequency: f64, spectral: [f64; 4]) -> Sample {
        Sample::new(NaiveDateTime::default(), frequency, 1.0, spectral)
    }

    #[test]
    fn test_tracker_creation() {
        let tracker = StatisticsTracker::new();
        assert_eq!(tracker.state().count, 0);
        assert_eq!(tracker.state().running_mean, 0.0);
        assert!(tracker.state().previous_frequency.is_none());
        assert!(tracker.state().previous_spectral_mean.is_none());
    }

    #[test]
    fn test_first_sample_sets_mean() {
        let mut tracker = StatisticsTracker::new();
        let obs = tracker.observe(&sample(50.0, [1.0, 2.0, 3.0, 6.0]));

        assert_eq!(obs.before, TrackerState::default());
        assert_eq!(obs.after.count, 1);
        assert_eq!(obs.after.running_mean, 50.0);
        assert_eq!(obs.after.previous_frequency, Some(50.0));
        assert_eq!(obs.after.previous_spectral_mean, Some(3.0));
    }

    #[test]
    fn test_running_mean_matches_arithmetic_mean() {
        let mut tracker = StatisticsTracker::new();
        let freqs = [49.8, 50.1, 50.02, 51.7, 48.9, 50.0, 49.95, 60.3];
        for f in freqs {
            tracker.observe(&sample(f, [1.0; 4]));
        }

        let expected = freqs.iter().sum::<f64>() / freqs.len() as f64;
        assert_relative_eq!(tracker.state().running_mean, expected, epsilon = 1e-9);
        assert_eq!(tracker.state().count, freqs.len() as u64);
    }

    #[test]
    fn test_observation_keeps_previous_values() {
        let mut tracker = StatisticsTracker::new();
        tracker.observe(&sample(50.0, [1.0; 4]));
        let obs = tracker.observe(&sample(52.0, [2.0; 4]));

        assert_eq!(obs.before.previous_frequency, Some(50.0));
        assert_eq!(obs.before.previous_spectral_mean, Some(1.0));
        assert_eq!(obs.after.previous_frequency, Some(52.0));
        assert_eq!(obs.after.running_mean, 51.0);
    }

    #[test]
    fn test_advance_is_reproducible() {
        let state = TrackerState {
            count: 3,
            running_mean: 50.0,
            previous_frequency: Some(49.0),
            previous_spectral_mean: Some(2.0),
        };
        let s = sample(54.0, [1.0; 4]);
        assert_eq!(state.advance(&s), state.advance(&s));
        assert_eq!(state.advance(&s).running_mean, 51.0);
    }
}
