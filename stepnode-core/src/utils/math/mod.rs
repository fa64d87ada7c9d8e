//! Module Exports
//!
//! - `energy`: peak search over the samples of a calibration scan

pub mod energy;
