//! Host stand-ins for the radio, the motor pins and the energy sensor.

use std::convert::Infallible;

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embedded_hal::digital::{ErrorType, OutputPin};
use stepnode_core::utils::{
    connection::transport::{DeliveryMode, MeshPacket, MeshTransport, NodeAddress},
    controllers::{AnalogInput, NodeState},
    error::TransportError,
    with_timeout, Duration,
};
use tracing::trace;

const INBOX_DEPTH: usize = 10;

/// Shared medium connecting the simulated nodes, one inbox per address.
pub struct SimMesh {
    addresses: [NodeAddress; 2],
    inboxes: [Channel<CriticalSectionRawMutex, MeshPacket, INBOX_DEPTH>; 2],
}

impl SimMesh {
    pub fn new(addresses: [NodeAddress; 2]) -> Self {
        SimMesh {
            addresses,
            inboxes: [Channel::new(), Channel::new()],
        }
    }

    fn inbox(
        &self,
        address: NodeAddress,
    ) -> Option<&Channel<CriticalSectionRawMutex, MeshPacket, INBOX_DEPTH>> {
        let idx = self.addresses.iter().position(|&a| a == address)?;
        Some(&self.inboxes[idx])
    }
}

/// One node's view of the simulated mesh.
pub struct SimRadio {
    address: NodeAddress,
    mesh: &'static SimMesh,
}

impl SimRadio {
    pub fn new(
        address: NodeAddress,
        mesh: &'static SimMesh,
    ) -> Self {
        SimRadio { address, mesh }
    }
}

impl MeshTransport for SimRadio {
    fn node_address(&self) -> NodeAddress {
        self.address
    }

    async fn send(
        &self,
        destination: NodeAddress,
        mode: DeliveryMode,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let inbox = self.mesh.inbox(destination).ok_or(TransportError)?;
        let packet = MeshPacket::new(self.address, payload).map_err(|_| TransportError)?;
        trace!(from = self.address, to = destination, ?mode, ?payload, "radio send");
        inbox.try_send(packet).map_err(|_| TransportError)
    }

    async fn receive(
        &self,
        timeout: Duration,
    ) -> Option<MeshPacket> {
        let inbox = self.mesh.inbox(self.address)?;
        with_timeout(timeout, inbox.receive()).await.ok()
    }
}

/// GPIO that only logs its level changes.
pub struct LoggedPin {
    name: &'static str,
}

impl LoggedPin {
    pub fn new(name: &'static str) -> Self {
        LoggedPin { name }
    }
}

impl ErrorType for LoggedPin {
    type Error = Infallible;
}

impl OutputPin for LoggedPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        trace!(pin = self.name, "low");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        trace!(pin = self.name, "high");
        Ok(())
    }
}

/// Energy sensor facing a beam at a fixed shaft position.
///
/// The reading falls off linearly with the angular distance between the
/// shaft and the beam, plus a little deterministic noise.
pub struct SimulatedSensor {
    state: &'static NodeState,
    beam_at: u16,
    steps_per_revolution: u16,
    noise: u32,
}

impl SimulatedSensor {
    pub fn new(
        state: &'static NodeState,
        beam_at: u16,
        steps_per_revolution: u16,
    ) -> Self {
        let steps_per_revolution = steps_per_revolution.max(2);
        SimulatedSensor {
            state,
            beam_at: beam_at % steps_per_revolution,
            steps_per_revolution,
            noise: 0x1234_5678,
        }
    }
}

impl AnalogInput for SimulatedSensor {
    fn read_raw(
        &mut self,
        _channel: u8,
    ) -> u16 {
        let position = self.state.snapshot().position;
        let diff = position.abs_diff(self.beam_at);
        let distance = diff.min(self.steps_per_revolution - diff) as u32;
        let half = u32::from(self.steps_per_revolution / 2);
        let signal = 3800 - distance * 3800 / half;

        self.noise = self.noise.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (signal + (self.noise >> 24) % 64) as u16
    }
}
