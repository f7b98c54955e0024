//! Per-sample validation rules
//!
//! Rules are applied in a fixed order and the first failing rule wins:
//!
//! 1. the sample must be present
//! 2. the frequency must be a finite number greater than 0
//! 3. every spectral band must be a finite number
//!
//! Infinite readings are rejected alongside NaN so the running statistics
//! only ever see finite values.

use crate::sample::Sample;
use serde::Serialize;
use std::fmt;

/// Why a sample was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NullSample,
    NonPositiveFrequency,
    InvalidSpectral,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RejectReason::NullSample => "sample cannot be null",
            RejectReason::NonPositiveFrequency => "frequency must be greater than 0",
            RejectReason::InvalidSpectral => "spectral values must be valid numbers",
        };
        f.write_str(msg)
    }
}

/// Validate a pushed sample, returning it when every rule passes
///
/// A NaN or infinite frequency is rejected by rule 2, an infinite band by rule 3.
pub fn validate(sample: Option<&Sample>) -> Result<&Sample, RejectReason> {
    let sample = sample.ok_or(RejectReason::NullSample)?;

    if !sample.frequency.is_finite() || sample.frequency <= 0.0 {
        return Err(RejectReason::NonPositiveFrequency);
    }

    if sample.spectral().iter().any(|v| !v.is_finite()) {
        return Err(RejectReason::InvalidSpectral);
    }

    Ok(sample)
}
