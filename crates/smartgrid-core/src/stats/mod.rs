//! Running statistics module
//!
//! Tracks the per-session running mean frequency and the previous-sample
//! values used for spike detection.

pub mod tracker;
