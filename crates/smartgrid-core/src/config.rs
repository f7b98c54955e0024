//! Service configuration
//!
//! Thresholds are loaded once when the service is constructed and shared
//! read-only by every session. Loading fails fast when a threshold is absent
//! or is not a positive number.
//!
//! The config file is JSON:
//!
//! ```json
//! {
//!   "fft_threshold": 5.0,
//!   "frequency_threshold": 1.0,
//!   "data_dir": "data",
//!   "server": { "bind_addr": "127.0.0.1", "port": 8930 }
//! }
//! ```
//!
//! `SMARTGRID_FFT_THRESHOLD` and `SMARTGRID_FREQUENCY_THRESHOLD` override the
//! file values.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `fft_threshold`
pub const FFT_THRESHOLD_ENV: &str = "SMARTGRID_FFT_THRESHOLD";

/// Environment variable overriding `frequency_threshold`
pub const FREQUENCY_THRESHOLD_ENV: &str = "SMARTGRID_FREQUENCY_THRESHOLD";

/// Validated anomaly thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    fft_threshold: f64,
    frequency_threshold: f64,
}

impl Thresholds {
    /// Create thresholds, rejecting values that are not finite and positive
    pub fn new(fft_threshold: f64, frequency_threshold: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            fft_threshold: check_positive("fft_threshold", fft_threshold)?,
            frequency_threshold: check_positive("frequency_threshold", frequency_threshold)?,
        })
    }

    /// Parse thresholds from their textual form (env vars, app settings)
    pub fn parse(fft: Option<&str>, frequency: Option<&str>) -> Result<Self, ConfigError> {
        let fft = parse_threshold("fft_threshold", fft)?;
        let frequency = parse_threshold("frequency_threshold", frequency)?;
        Self::new(fft, frequency)
    }

    /// Spectral threshold used for band breaches and spectral spikes
    pub fn fft_threshold(&self) -> f64 {
        self.fft_threshold
    }

    /// Frequency threshold used for frequency spikes
    pub fn frequency_threshold(&self) -> f64 {
        self.frequency_threshold
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidThreshold {
            name,
            value: value.to_string(),
        })
    }
}

fn parse_threshold(name: &'static str, raw: Option<&str>) -> Result<f64, ConfigError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::MissingThreshold(name))?;
    raw.parse::<f64>()
        .map_err(|_| ConfigError::InvalidThreshold {
            name,
            value: raw.to_string(),
        })
        .and_then(|v| check_positive(name, v))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_accepted_log() -> String {
    "samples.csv".to_string()
}

fn default_rejected_log() -> String {
    "rejected.log".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8930
}

/// Listen address for the service transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

/// Service configuration as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Spectral threshold (required)
    #[serde(default)]
    pub fft_threshold: Option<f64>,
    /// Frequency threshold (required)
    #[serde(default)]
    pub frequency_threshold: Option<f64>,
    /// Directory holding the sample logs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Accepted-sample log file name
    #[serde(default = "default_accepted_log")]
    pub accepted_log: String,
    /// Rejected-sample log file name
    #[serde(default = "default_rejected_log")]
    pub rejected_log: String,
    #[serde(default)]
    pub server: ServerSettings,
}

impl ServiceConfig {
    /// Config with the given thresholds and default paths
    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        Self {
            fft_threshold: Some(thresholds.fft_threshold()),
            frequency_threshold: Some(thresholds.frequency_threshold()),
            data_dir: default_data_dir(),
            accepted_log: default_accepted_log(),
            rejected_log: default_rejected_log(),
            server: ServerSettings::default(),
        }
    }

    /// Load config from disk, apply env overrides, and validate thresholds
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: ServiceConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        config.apply_overrides(
            std::env::var(FFT_THRESHOLD_ENV).ok().as_deref(),
            std::env::var(FREQUENCY_THRESHOLD_ENV).ok().as_deref(),
        )?;
        let thresholds = config.thresholds()?;

        tracing::info!(
            path = %path.display(),
            fft_threshold = thresholds.fft_threshold(),
            frequency_threshold = thresholds.frequency_threshold(),
            "Loaded service config"
        );
        Ok(config)
    }

    /// Replace thresholds with textual overrides when present
    pub fn apply_overrides(
        &mut self,
        fft: Option<&str>,
        frequency: Option<&str>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = fft {
            self.fft_threshold = Some(parse_threshold("fft_threshold", Some(raw))?);
        }
        if let Some(raw) = frequency {
            self.frequency_threshold = Some(parse_threshold("frequency_threshold", Some(raw))?);
        }
        Ok(())
    }

    /// Validated thresholds
    pub fn thresholds(&self) -> Result<Thresholds, ConfigError> {
        let fft = self
            .fft_threshold
            .ok_or(ConfigError::MissingThreshold("fft_threshold"))?;
        let frequency = self
            .frequency_threshold
            .ok_or(ConfigError::MissingThreshold("frequency_threshold"))?;
        Thresholds::new(fft, frequency)
    }

    /// Full path of the accepted-sample log
    pub fn accepted_path(&self) -> PathBuf {
        self.data_dir.join(&self.accepted_log)
    }

    /// Full path of the rejected-sample log
    pub fn rejected_path(&self) -> PathBuf {
        self.data_dir.join(&self.rejected_log)
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }
}
