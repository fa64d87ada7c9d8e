//! Seam to the mesh radio.
//!
//! Addressing, acknowledgment and retransmission belong to the radio stack; the
//! node only needs to send a payload to an address and to wait for the next
//! inbound packet.

use embassy_time::Duration;
use heapless::Vec;

use crate::utils::error::{NodeError, TransportError};

/// Mesh network address of a node.
pub type NodeAddress = u8;

/// Largest payload the radio carries in one packet.
pub const MAX_PACKET_LEN: usize = 256;

/// How the radio should deliver a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Wait for a link-level acknowledgment.
    Acknowledged,
    /// Fire and forget.
    Unacknowledged,
}

/// A packet as handed over by the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshPacket {
    pub source: NodeAddress,
    pub data: Vec<u8, MAX_PACKET_LEN>,
}

impl MeshPacket {
    /// Copy `data` into a packet from `source`.
    ///
    /// Fails with `MalformedPacket` if the data does not fit one radio packet.
    pub fn new(
        source: NodeAddress,
        data: &[u8],
    ) -> Result<Self, NodeError> {
        let data = Vec::from_slice(data).map_err(|_| NodeError::MalformedPacket)?;
        Ok(MeshPacket { source, data })
    }
}

/// Black-box mesh radio.
///
/// Methods take `&self` because the receiver, dispatcher and keepalive loops all
/// talk to the same radio; implementations handle their own locking.
#[allow(async_fn_in_trait)]
pub trait MeshTransport {
    /// Address this node was assigned on the mesh.
    fn node_address(&self) -> NodeAddress;

    /// Send `payload` to `destination`.
    async fn send(
        &self,
        destination: NodeAddress,
        mode: DeliveryMode,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next inbound packet.
    async fn receive(
        &self,
        timeout: Duration,
    ) -> Option<MeshPacket>;
}
