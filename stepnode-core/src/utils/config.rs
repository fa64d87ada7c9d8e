//! Node configuration.
//!
//! Every field has a default matching the reference hardware, so a node can be
//! brought up with `NodeConfig::default()` and only the deltas overridden.

use core::fmt;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::utils::connection::transport::NodeAddress;

/// Upper bound on `energy_samples`; sizes the per-scan sample buffer.
pub const MAX_ENERGY_SAMPLES: usize = 32;

/// Largest revolution whose positions still fit the one-byte status field.
pub const MAX_STEPS_PER_REVOLUTION: u16 = 256;

/// A configuration the node refuses to run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `steps_per_revolution` is zero or above [`MAX_STEPS_PER_REVOLUTION`].
    StepsPerRevolution(u16),
}

impl fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ConfigError::StepsPerRevolution(n) => write!(
                f,
                "steps_per_revolution must be 1..={MAX_STEPS_PER_REVOLUTION}, got {n}"
            ),
        }
    }
}

/// Tunables for protocol timing, motor geometry and sensor averaging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Well-known mesh address of the coordinator node.
    pub coordinator_address: NodeAddress,
    /// Full steps in one motor revolution; positions wrap at this value.
    pub steps_per_revolution: u16,
    /// Sensor samples taken during one scan sweep.
    pub energy_samples: u8,
    /// Raw ADC readings averaged into one logical sample.
    pub sample_depth: u16,
    /// ADC channel the energy sensor is wired to.
    pub adc_channel: u8,
    /// Delay after every step-output edge.
    pub step_delay_ms: u32,
    /// Settle time before each scan sample.
    pub settle_delay_ms: u32,
    /// Pause between the scan sweep and the return to peak.
    pub return_pause_ms: u32,
    /// Bounded wait on a transport receive before re-polling.
    pub receive_timeout_ms: u64,
    /// Bounded wait when pushing onto a full queue.
    pub enqueue_timeout_ms: u64,
    /// Interval of the peer keepalive (power request) loop.
    pub keepalive_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            coordinator_address: 100,
            steps_per_revolution: 200,
            energy_samples: 10,
            sample_depth: 2000,
            adc_channel: 3,
            step_delay_ms: 10,
            settle_delay_ms: 1000,
            return_pause_ms: 1000,
            receive_timeout_ms: 1000,
            enqueue_timeout_ms: 1000,
            keepalive_interval_ms: 1000,
        }
    }
}

impl NodeConfig {
    /// Check the values that the motion and status paths rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_STEPS_PER_REVOLUTION).contains(&self.steps_per_revolution) {
            return Err(ConfigError::StepsPerRevolution(self.steps_per_revolution));
        }
        Ok(())
    }

    /// Step-output edges in one revolution (two edges per step).
    pub fn sweep_edges(&self) -> u32 {
        u32::from(self.steps_per_revolution) * 2
    }

    /// Number of samples actually taken per scan, clamped to the buffer size.
    pub fn sample_count(&self) -> usize {
        (self.energy_samples as usize).clamp(1, MAX_ENERGY_SAMPLES)
    }

    /// Edges between successive scan samples.
    pub fn stride(&self) -> u32 {
        (self.sweep_edges() / self.sample_count() as u32).max(1)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }
}
