//! Utility re-exports and helper macros for the stepper node.
//!
//! - `connection`: wire codec, role-aware dispatcher and the mesh transport seam
//! - `controllers`: motor driver, energy sampler and the motion state machine
//! - `math`: energy-scan peak search
//! - `pipeline`: the long-running loops that tie queues, dispatcher and motion together
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod config;
pub mod connection;
pub mod controllers;
pub mod error;
pub mod math;
pub mod pipeline;

pub use config::NodeConfig;
pub use connection::dispatcher::Dispatcher;
pub use controllers::{MotionController, NodeState};
pub use embassy_time::*;
pub use error::NodeError;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
