//! Smart grid sensor reading

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Number of spectral bands carried by each sample
pub const SPECTRAL_BANDS: usize = 4;

/// A single timestamped measurement from the producer
///
/// Once accepted by a session a sample is never modified; the session only
/// keeps derived values (running mean, previous frequency, previous spectral mean).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the reading was taken
    pub timestamp: NaiveDateTime,
    /// Grid frequency in Hz
    pub frequency: f64,
    /// Power usage in kW
    pub power_usage: f64,
    /// Spectral band 1 magnitude
    pub fft1: f64,
    /// Spectral band 2 magnitude
    pub fft2: f64,
    /// Spectral band 3 magnitude
    pub fft3: f64,
    /// Spectral band 4 magnitude
    pub fft4: f64,
}

impl Sample {
    /// Create a sample from its frequency, power usage and the four spectral bands
    pub fn new(
        timestamp: NaiveDateTime,
        frequency: f64,
        power_usage: f64,
        spectral: [f64; SPECTRAL_BANDS],
    ) -> Self {
        let [fft1, fft2, fft3, fft4] = spectral;
        Self {
            timestamp,
            frequency,
            power_usage,
            fft1,
            fft2,
            fft3,
            fft4,
        }
    }

    /// Spectral band magnitudes in band order
    pub fn spectral(&self) -> [f64; SPECTRAL_BANDS] {
        [self.fft1, self.fft2, self.fft3, self.fft4]
    }

    /// Arithmetic mean of the four spectral bands
    pub fn spectral_mean(&self) -> f64 {
        self.spectral().iter().sum::<f64>() / SPECTRAL_BANDS as f64
    }
}
