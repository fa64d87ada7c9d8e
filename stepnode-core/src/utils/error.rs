//! Error taxonomy shared by the codec, dispatcher and pipeline loops.
//!
//! None of these are fatal: every one of them ends in a log line and the
//! owning loop carries on with the next packet or request.

use core::fmt;

/// Failures surfaced by the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    /// Packet (or the part of it a command needs) was empty or too short.
    MalformedPacket,
    /// First byte of a packet is not a known opcode.
    UnrecognizedOpcode(u8),
    /// Coordinator got a `GiveStatus` without any status bytes.
    NoStatusReceived,
    /// Motion-request queue stayed full for the whole bounded wait.
    MotionQueueFull,
    /// Inbound-packet queue stayed full for the whole bounded wait.
    QueueTimeout,
    /// The mesh transport refused or failed a send.
    TransportFailure,
}

impl fmt::Display for NodeError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            NodeError::MalformedPacket => f.write_str("malformed packet"),
            NodeError::UnrecognizedOpcode(op) => write!(f, "undefined wireless command: 0x{op:02x}"),
            NodeError::NoStatusReceived => f.write_str("no status received"),
            NodeError::MotionQueueFull => f.write_str("failed to pass motion command to next layer"),
            NodeError::QueueTimeout => f.write_str("failed to send packet to comm queue"),
            NodeError::TransportFailure => f.write_str("transport send failed"),
        }
    }
}

/// Error reported by a [`MeshTransport`](crate::utils::connection::transport::MeshTransport) send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportError;

impl From<TransportError> for NodeError {
    fn from(_: TransportError) -> Self {
        NodeError::TransportFailure
    }
}
