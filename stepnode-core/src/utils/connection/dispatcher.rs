//! Role-aware command dispatch.
//!
//! Every node sees every command addressed to it, whatever its role; the
//! dispatcher executes the side of the exchange that belongs to this node's role
//! and ignores the rest.
//!
//! | opcode           | coordinator                       | peer                            |
//! |------------------|-----------------------------------|---------------------------------|
//! | RequestPower     | remember peer, reply GetStatus    | -                               |
//! | GetStatus        | -                                 | send status to the coordinator  |
//! | GiveStatus       | record status, reply Scan         | -                               |
//! | Scan / Move      | -                                 | queue a motion request          |

use embassy_time::with_timeout;
use heapless::Vec;

use super::{
    codec::{self, CommandPacket, Opcode, StatusReport, FLAG_BUSY},
    transport::{DeliveryMode, MeshPacket, MeshTransport, NodeAddress},
    NodeRole,
};
use crate::utils::{
    config::NodeConfig,
    controllers::{AnalogInput, MotionRequest, MotionSender, NodeState, SharedSampler},
    error::NodeError,
};

/// Peers the coordinator keeps track of.
pub const MAX_PEERS: usize = 16;

/// What the coordinator knows about one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerRecord {
    pub address: NodeAddress,
    pub last_status: Option<StatusReport>,
}

pub struct Dispatcher<'a, T, A> {
    transport: &'a T,
    motion: MotionSender<'a>,
    state: &'a NodeState,
    sampler: &'a SharedSampler<A>,
    config: NodeConfig,
    peers: Vec<PeerRecord, MAX_PEERS>,
}

impl<'a, T, A> Dispatcher<'a, T, A>
where
    T: MeshTransport,
    A: AnalogInput,
{
    pub fn new(
        transport: &'a T,
        motion: MotionSender<'a>,
        state: &'a NodeState,
        sampler: &'a SharedSampler<A>,
        config: NodeConfig,
    ) -> Self {
        Dispatcher {
            transport,
            motion,
            state,
            sampler,
            config,
            peers: Vec::new(),
        }
    }

    /// Role of this node, derived from its current mesh address.
    pub fn role(&self) -> NodeRole {
        NodeRole::from_address(self.transport.node_address(), self.config.coordinator_address)
    }

    /// Peers that have requested power from this coordinator.
    pub fn peers(&self) -> &[PeerRecord] {
        &self.peers
    }

    /// Decode `packet` and run this role's side of the exchange.
    pub async fn dispatch(
        &mut self,
        packet: &MeshPacket,
    ) -> Result<(), NodeError> {
        let command = codec::decode(&packet.data)?;
        let role = self.role();
        tracing::debug!(?role, opcode = ?command.opcode, source = packet.source, "got command");

        match (role, command.opcode) {
            (NodeRole::Coordinator, Opcode::RequestPower) => {
                self.on_power_request(packet.source).await
            }
            (NodeRole::Peer, Opcode::GetStatus) => {
                self.state.mark_boot_observed();
                self.report_status().await.map(|_| ())
            }
            (NodeRole::Coordinator, Opcode::GiveStatus) => {
                self.on_status(packet.source, &command.payload).await
            }
            (_, Opcode::ControlDirection | Opcode::Terminate) => {
                tracing::debug!(?role, opcode = ?command.opcode, "not implemented, ignoring");
                Ok(())
            }
            (NodeRole::Peer, Opcode::Scan) => self.enqueue_motion(MotionRequest::Scan).await,
            (NodeRole::Peer, Opcode::Move) => {
                let steps = command.move_steps()?;
                self.enqueue_motion(MotionRequest::Move { steps }).await
            }
            (role, opcode) => {
                tracing::trace!(?role, ?opcode, "command meant for the other role");
                Ok(())
            }
        }
    }

    /// Current status of this node: busy flag, averaged sensor reading, position.
    pub async fn status_report(&self) -> StatusReport {
        let snapshot = self.state.snapshot();
        let sensor = self.sampler.lock().await.read_averaged();
        StatusReport {
            error_flags: if snapshot.busy { FLAG_BUSY } else { 0 },
            sensor,
            // a validated config keeps positions below 256
            position: u8::try_from(snapshot.position).unwrap_or(u8::MAX),
        }
    }

    /// Build a status report and send it to the coordinator.
    pub async fn report_status(&self) -> Result<StatusReport, NodeError> {
        let report = self.status_report().await;
        tracing::debug!(sensor = report.sensor, busy = report.busy(), "sending status");
        let packet = CommandPacket::with_payload(Opcode::GiveStatus, &report.encode())?;
        self.send(self.config.coordinator_address, &packet.encode())
            .await?;
        Ok(report)
    }

    /// Ask `peer` to move by `steps`.
    pub async fn command_move(
        &self,
        peer: NodeAddress,
        steps: i8,
    ) -> Result<(), NodeError> {
        self.send(peer, &codec::encode_move(steps)).await
    }

    async fn on_power_request(
        &mut self,
        source: NodeAddress,
    ) -> Result<(), NodeError> {
        if !self.peers.iter().any(|p| p.address == source) {
            let record = PeerRecord {
                address: source,
                last_status: None,
            };
            if self.peers.push(record).is_err() {
                tracing::warn!(source, "peer table full, not tracking");
            } else {
                tracing::info!(source, "peer requested power");
            }
        }
        self.reply(source, Opcode::GetStatus).await
    }

    async fn on_status(
        &mut self,
        source: NodeAddress,
        payload: &[u8],
    ) -> Result<(), NodeError> {
        if payload.is_empty() {
            return Err(NodeError::NoStatusReceived);
        }
        let report = codec::decode_status(payload)?;
        tracing::info!(
            source,
            sensor = report.sensor,
            millivolts = report.millivolts(),
            busy = report.busy(),
            position = report.position,
            "got status"
        );
        if let Some(peer) = self.peers.iter_mut().find(|p| p.address == source) {
            peer.last_status = Some(report);
        }
        self.reply(source, Opcode::Scan).await
    }

    async fn enqueue_motion(
        &self,
        request: MotionRequest,
    ) -> Result<(), NodeError> {
        with_timeout(self.config.enqueue_timeout(), self.motion.send(request))
            .await
            .map_err(|_| NodeError::MotionQueueFull)
    }

    async fn reply(
        &self,
        destination: NodeAddress,
        opcode: Opcode,
    ) -> Result<(), NodeError> {
        self.send(destination, &CommandPacket::bare(opcode).encode())
            .await
    }

    async fn send(
        &self,
        destination: NodeAddress,
        payload: &[u8],
    ) -> Result<(), NodeError> {
        self.transport
            .send(destination, DeliveryMode::Acknowledged, payload)
            .await
            .map_err(NodeError::from)
    }
}
