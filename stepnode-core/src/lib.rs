//! Control logic for a mesh-networked stepper actuator node on no-std embedded platforms.
//!
//! For a runnable host simulation, see the `stepnode-app/mock-node` binary.
#![no_std]

pub mod utils;
