//! Module Exports
//!
//! This file exports the motion side of the node and the state it shares with
//! the protocol side.
//!
//! - `motor`: step/direction stepper driver with position tracking
//! - `sampler`: averaged analog energy readings
//! - `motion`: scan / move state machine driving the two above

pub mod motion;
pub mod motor;
pub mod sampler;

use core::cell::Cell;

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex},
    channel::{Channel, Receiver, Sender},
};
use serde::{Deserialize, Serialize};

pub use motion::{MotionController, MotionPhase, SelfTest};
pub use motor::{Direction, MotorError, StepperMotor};
pub use sampler::{AnalogInput, EnergySampler};

/// Depth of the motion-request queue.
pub const MOTION_QUEUE_DEPTH: usize = 10;

pub type MotionChannel = Channel<CriticalSectionRawMutex, MotionRequest, MOTION_QUEUE_DEPTH>;
pub type MotionSender<'a> = Sender<'a, CriticalSectionRawMutex, MotionRequest, MOTION_QUEUE_DEPTH>;
pub type MotionReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, MotionRequest, MOTION_QUEUE_DEPTH>;

/// Energy sampler shared by the motion loop (scan samples) and the dispatcher
/// (status reports).
pub type SharedSampler<A> =
    embassy_sync::mutex::Mutex<CriticalSectionRawMutex, EnergySampler<A>>;

/// Work item for the motion loop.
///
/// Serialized as JSON with tag `"mc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "mc", rename_all = "snake_case")]
pub enum MotionRequest {
    /// Sweep one revolution sampling energy, then return to the peak.
    Scan,
    /// Step `steps` times; the sign picks the direction.
    Move { steps: i8 },
}

/// Consistent view of the motion state for the status path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionSnapshot {
    pub busy: bool,
    pub position: u16,
}

/// State written by one loop and read by others.
///
/// The motion loop is the only writer of the motion snapshot and the
/// dispatcher the only writer of the boot flag.
pub struct NodeState {
    motion: Mutex<CriticalSectionRawMutex, Cell<MotionSnapshot>>,
    boot_observed: Mutex<CriticalSectionRawMutex, Cell<bool>>,
}

impl NodeState {
    pub const fn new() -> Self {
        NodeState {
            motion: Mutex::new(Cell::new(MotionSnapshot {
                busy: false,
                position: 0,
            })),
            boot_observed: Mutex::new(Cell::new(false)),
        }
    }

    pub fn snapshot(&self) -> MotionSnapshot {
        self.motion.lock(|m| m.get())
    }

    pub fn publish(
        &self,
        snapshot: MotionSnapshot,
    ) {
        self.motion.lock(|m| m.set(snapshot));
    }

    /// Whether the coordinator has asked this peer for its status yet.
    pub fn boot_observed(&self) -> bool {
        self.boot_observed.lock(|b| b.get())
    }

    pub fn mark_boot_observed(&self) {
        self.boot_observed.lock(|b| b.set(true));
    }
}

impl Default for NodeState {
    fn default() -> Self {
        Self::new()
    }
}
