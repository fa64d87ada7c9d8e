//! Module Exports
//!
//! - `codec`: byte layout of command packets, status reports and move commands
//! - `dispatcher`: executes the coordinator or peer side of each command
//! - `transport`: the mesh radio seam and packet types

pub mod codec;
pub mod dispatcher;
pub mod transport;

use transport::NodeAddress;

/// Which side of the protocol a node plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Coordinator,
    Peer,
}

impl NodeRole {
    /// A node is the coordinator iff it sits on the well-known coordinator address.
    pub fn from_address(
        address: NodeAddress,
        coordinator_address: NodeAddress,
    ) -> Self {
        if address == coordinator_address {
            NodeRole::Coordinator
        } else {
            NodeRole::Peer
        }
    }
}
