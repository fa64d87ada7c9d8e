//! The node's long-running loops.
//!
//! ```text
//! radio ─► receiver_loop ─► packet queue ─► dispatch_loop ─► motion queue ─► motion_loop
//!                                                 └──────► radio (replies, status)
//! keepalive_loop ─► radio (power requests until the coordinator answers)
//! ```
//!
//! Each loop is generic over the hardware seams; the application wraps them in
//! executor tasks. Failures are logged and the loop moves on.

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Receiver, Sender},
};
use embassy_time::{with_timeout, Timer};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::utils::{
    config::NodeConfig,
    connection::{
        codec::{CommandPacket, Opcode},
        dispatcher::Dispatcher,
        transport::{DeliveryMode, MeshPacket, MeshTransport},
        NodeRole,
    },
    controllers::{AnalogInput, MotionController, MotionReceiver, NodeState},
    error::NodeError,
};

/// Depth of the inbound-packet queue.
pub const PACKET_QUEUE_DEPTH: usize = 10;

pub type PacketChannel = Channel<CriticalSectionRawMutex, MeshPacket, PACKET_QUEUE_DEPTH>;
pub type PacketSender<'a> = Sender<'a, CriticalSectionRawMutex, MeshPacket, PACKET_QUEUE_DEPTH>;
pub type PacketReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, MeshPacket, PACKET_QUEUE_DEPTH>;

/// Wait once for a radio packet and queue it.
///
/// Returns `Ok(false)` when the radio had nothing within the receive timeout
/// and `Err(QueueTimeout)` when the packet had to be dropped.
pub async fn receive_once<T: MeshTransport>(
    transport: &T,
    packets: PacketSender<'_>,
    config: &NodeConfig,
) -> Result<bool, NodeError> {
    let Some(packet) = transport.receive(config.receive_timeout()).await else {
        return Ok(false);
    };
    with_timeout(config.enqueue_timeout(), packets.send(packet))
        .await
        .map(|_| true)
        .map_err(|_| NodeError::QueueTimeout)
}

/// Move packets from the radio onto the packet queue.
pub async fn receiver_loop<T: MeshTransport>(
    transport: &T,
    packets: PacketSender<'_>,
    config: NodeConfig,
) -> ! {
    loop {
        if let Err(e) = receive_once(transport, packets, &config).await {
            tracing::error!(error = %e, "dropping inbound packet");
        }
    }
}

/// Feed queued packets through the dispatcher, in arrival order.
pub async fn dispatch_loop<T, A>(
    dispatcher: &mut Dispatcher<'_, T, A>,
    packets: PacketReceiver<'_>,
) -> !
where
    T: MeshTransport,
    A: AnalogInput,
{
    loop {
        let packet = packets.receive().await;
        match dispatcher.dispatch(&packet).await {
            Ok(()) => {}
            Err(NodeError::TransportFailure) => {
                tracing::warn!(role = ?dispatcher.role(), source = packet.source, "failed to send reply");
            }
            Err(e) => {
                tracing::error!(role = ?dispatcher.role(), source = packet.source, error = %e, "failed to decode wireless packet");
            }
        }
    }
}

/// Run motion requests one at a time, each to completion.
///
/// A self-test entry handed back by the controller runs right after the
/// motion that released it.
pub async fn motion_loop<DIR, EN, STEP, A, D, E>(
    controller: &mut MotionController<'_, DIR, EN, STEP, A, D>,
    requests: MotionReceiver<'_>,
) -> !
where
    DIR: OutputPin<Error = E>,
    EN: OutputPin<Error = E>,
    STEP: OutputPin<Error = E>,
    E: core::fmt::Debug,
    A: AnalogInput,
    D: DelayNs,
{
    loop {
        let mut next = Some(requests.receive().await);
        while let Some(request) = next.take() {
            tracing::info!(?request, "motion request");
            match controller.execute(request).await {
                Ok(follow_up) => next = follow_up,
                Err(e) => tracing::error!(?e, ?request, "motion aborted"),
            }
        }
    }
}

/// Send one power request if this is a peer the coordinator has not answered yet.
///
/// Returns whether a request went out.
pub async fn keepalive_tick<T: MeshTransport>(
    transport: &T,
    state: &NodeState,
    config: &NodeConfig,
) -> Result<bool, NodeError> {
    let role = NodeRole::from_address(transport.node_address(), config.coordinator_address);
    if role == NodeRole::Coordinator || state.boot_observed() {
        return Ok(false);
    }
    transport
        .send(
            config.coordinator_address,
            DeliveryMode::Acknowledged,
            &CommandPacket::bare(Opcode::RequestPower).encode(),
        )
        .await?;
    Ok(true)
}

/// Periodically ask the coordinator for power until it polls this peer.
pub async fn keepalive_loop<T: MeshTransport>(
    transport: &T,
    state: &NodeState,
    config: NodeConfig,
) -> ! {
    loop {
        if let Err(e) = keepalive_tick(transport, state, &config).await {
            tracing::warn!(error = %e, "failed to send power request");
        }
        Timer::after(config.keepalive_interval()).await;
    }
}
