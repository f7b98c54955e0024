//! Threshold-based anomaly detection
//!
//! Decides which signals fire for an accepted sample given the statistics
//! before and after folding it in. Detection is a pure function of the
//! sample, the tracker [`Observation`] and the configured [`Thresholds`];
//! publishing the resulting events is the session's job.
//!
//! Signals are returned in evaluation order:
//!
//! 1. spectral threshold breach (any band above `fft_threshold`)
//! 2. spectral spike (spectral mean moved more than `fft_threshold`)
//! 3. frequency spike (frequency moved more than `frequency_threshold`)
//! 4. out of band (outside ±25% of the running mean)
//! 5. legacy mean deviation warning (±25% of the running mean)
//! 6. legacy threshold deviation warning (±25% of `frequency_threshold`)
//!
//! Signals 4 and 5 use the same band and currently always fire together;
//! they are kept separate so each can be retired on its own.

use crate::config::Thresholds;
use crate::sample::Sample;
use crate::stats::tracker::Observation;
use crate::BAND_TOLERANCE;
use serde::Serialize;
use std::fmt;

/// Which side of the expected value a deviation falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    #[serde(rename = "above expected")]
    Above,
    #[serde(rename = "below expected")]
    Below,
}

impl Direction {
    /// Direction of a signed delta; zero counts as below
    pub fn of_delta(delta: f64) -> Self {
        if delta > 0.0 {
            Direction::Above
        } else {
            Direction::Below
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Above => f.write_str("above expected"),
            Direction::Below => f.write_str("below expected"),
        }
    }
}

/// One spectral band over the threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandBreach {
    /// 1-based band number (fft1..fft4)
    pub band: usize,
    pub value: f64,
}

/// A signal raised for an accepted sample
#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    SpectralThreshold {
        breaches: Vec<BandBreach>,
    },
    SpectralSpike {
        delta: f64,
        direction: Direction,
    },
    FrequencySpike {
        delta: f64,
        direction: Direction,
    },
    OutOfBand {
        frequency: f64,
        running_mean: f64,
        direction: Direction,
    },
    MeanDeviation {
        frequency: f64,
        running_mean: f64,
        direction: Direction,
    },
    ThresholdDeviation {
        frequency: f64,
        threshold: f64,
        direction: Direction,
    },
}

impl Anomaly {
    /// Human-readable warning text for the warning-style signals
    pub fn warning_message(&self) -> Option<String> {
        match self {
            Anomaly::SpectralThreshold { breaches } => {
                let bands: Vec<String> = breaches
                    .iter()
                    .map(|b| format!("fft{}={:.3}", b.band, b.value))
                    .collect();
                Some(format!(
                    "spectral values above threshold: {}",
                    bands.join(", ")
                ))
            }
            Anomaly::MeanDeviation {
                frequency,
                running_mean,
                direction,
            } => Some(format!(
                "frequency {:.3} Hz deviates more than 25% from running mean {:.3} Hz ({})",
                frequency, running_mean, direction
            )),
            Anomaly::ThresholdDeviation {
                frequency,
                threshold,
                direction,
            } => Some(format!(
                "frequency {:.3} Hz deviates more than 25% from configured threshold {:.3} Hz ({})",
                frequency, threshold, direction
            )),
            _ => None,
        }
    }
}

/// Which side of a ±25% band around `expected` the value falls, if outside
fn band_deviation(value: f64, expected: f64) -> Option<Direction> {
    if value < expected * (1.0 - BAND_TOLERANCE) {
        Some(Direction::Below)
    } else if value > expected * (1.0 + BAND_TOLERANCE) {
        Some(Direction::Above)
    } else {
        None
    }
}

/// Stateless detector configured with the service thresholds
#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector {
    thresholds: Thresholds,
}

impl AnomalyDetector {
    /// Create a detector for the given thresholds
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Configured thresholds
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Evaluate every signal for an accepted sample
    ///
    /// # Arguments
    /// * `sample` - The accepted sample
    /// * `observation` - Tracker state before and after folding the sample in
    ///
    /// # Returns
    /// Fired signals in evaluation order (empty when nothing fired)
    pub fn evaluate(&self, sample: &Sample, observation: &Observation) -> Vec<Anomaly> {
        let before = &observation.before;
        let after = &observation.after;

        [
            self.spectral_threshold(sample),
            self.spectral_spike(sample.spectral_mean(), before.previous_spectral_mean),
            self.frequency_spike(sample.frequency, before.previous_frequency),
            Self::out_of_band(sample.frequency, after.running_mean, after.count),
            Self::mean_deviation(sample.frequency, after.running_mean, after.count),
            self.threshold_deviation(sample.frequency),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Every band strictly above `fft_threshold`, in band order
    pub fn spectral_threshold(&self, sample: &Sample) -> Option<Anomaly> {
        let breaches: Vec<BandBreach> = sample
            .spectral()
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > self.thresholds.fft_threshold())
            .map(|(i, v)| BandBreach {
                band: i + 1,
                value: *v,
            })
            .collect();

        if breaches.is_empty() {
            None
        } else {
            Some(Anomaly::SpectralThreshold { breaches })
        }
    }

    /// Spectral mean change against the previous accepted sample
    pub fn spectral_spike(&self, current: f64, previous: Option<f64>) -> Option<Anomaly> {
        let delta = current - previous?;
        (delta.abs() > self.thresholds.fft_threshold()).then(|| Anomaly::SpectralSpike {
            delta,
            direction: Direction::of_delta(delta),
        })
    }

    /// Frequency change against the previous accepted sample
    pub fn frequency_spike(&self, frequency: f64, previous: Option<f64>) -> Option<Anomaly> {
        let delta = frequency - previous?;
        (delta.abs() > self.thresholds.frequency_threshold()).then(|| Anomaly::FrequencySpike {
            delta,
            direction: Direction::of_delta(delta),
        })
    }

    /// Frequency outside ±25% of the running mean (strict bounds)
    pub fn out_of_band(frequency: f64, running_mean: f64, count: u64) -> Option<Anomaly> {
        if count == 0 {
            return None;
        }
        band_deviation(frequency, running_mean).map(|direction| Anomaly::OutOfBand {
            frequency,
            running_mean,
            direction,
        })
    }

    /// Legacy warning: frequency outside ±25% of the running mean
    pub fn mean_deviation(frequency: f64, running_mean: f64, count: u64) -> Option<Anomaly> {
        if count == 0 {
            return None;
        }
        band_deviation(frequency, running_mean).map(|direction| Anomaly::MeanDeviation {
            frequency,
            running_mean,
            direction,
        })
    }

    /// Legacy warning: frequency outside ±25% of the fixed frequency threshold
    pub fn threshold_deviation(&self, frequency: f64) -> Option<Anomaly> {
        let threshold = self.thresholds.frequency_threshold();
        band_deviation(frequency, threshold).map(|direction| Anomaly::ThresholdDeviation {
            frequency,
            threshold,
            direction,
        })
    }
}
