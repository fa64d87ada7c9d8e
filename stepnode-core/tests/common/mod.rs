//! Hand-written doubles for the hardware seams.
#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    convert::Infallible,
    rc::Rc,
};

use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal_async::delay::DelayNs;
use stepnode_core::utils::{
    connection::transport::{DeliveryMode, MeshPacket, MeshTransport, NodeAddress},
    controllers::{AnalogInput, NodeState},
    error::TransportError,
    Duration, NodeConfig,
};

pub const COORDINATOR: NodeAddress = 100;
pub const PEER: NodeAddress = 7;

/// Defaults with single-reading averages and short queue waits.
pub fn test_config() -> NodeConfig {
    NodeConfig {
        sample_depth: 1,
        enqueue_timeout_ms: 10,
        receive_timeout_ms: 10,
        ..NodeConfig::default()
    }
}

/// ADC replaying a fixed script, then a constant.
pub struct ScriptedAdc {
    script: VecDeque<u16>,
    fallback: u16,
    pub reads: Rc<Cell<usize>>,
    pub last_channel: Rc<Cell<u8>>,
}

impl ScriptedAdc {
    pub fn new(script: &[u16]) -> Self {
        ScriptedAdc {
            script: script.iter().copied().collect(),
            fallback: 0,
            reads: Rc::new(Cell::new(0)),
            last_channel: Rc::new(Cell::new(0)),
        }
    }

    pub fn constant(value: u16) -> Self {
        ScriptedAdc {
            fallback: value,
            ..Self::new(&[])
        }
    }
}

impl AnalogInput for ScriptedAdc {
    fn read_raw(
        &mut self,
        channel: u8,
    ) -> u16 {
        self.reads.set(self.reads.get() + 1);
        self.last_channel.set(channel);
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

/// Delay that returns immediately, adding up what it was asked to wait and
/// noting whether the node looked busy while waiting.
pub struct RecordingDelay<'a> {
    pub total_ns: Rc<Cell<u64>>,
    pub busy_seen: Rc<Cell<bool>>,
    state: Option<&'a NodeState>,
}

impl<'a> RecordingDelay<'a> {
    pub fn new() -> Self {
        RecordingDelay {
            total_ns: Rc::new(Cell::new(0)),
            busy_seen: Rc::new(Cell::new(false)),
            state: None,
        }
    }

    pub fn watching(state: &'a NodeState) -> Self {
        RecordingDelay {
            state: Some(state),
            ..Self::new()
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns.get() / 1_000_000
    }
}

impl DelayNs for RecordingDelay<'_> {
    async fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        self.total_ns.set(self.total_ns.get() + u64::from(ns));
        if let Some(state) = self.state {
            if state.snapshot().busy {
                self.busy_seen.set(true);
            }
        }
    }

    async fn delay_ms(
        &mut self,
        ms: u32,
    ) {
        self.delay_ns(0).await;
        self.total_ns
            .set(self.total_ns.get() + u64::from(ms) * 1_000_000);
    }
}

/// Output pin counting rising and falling edges.
#[derive(Clone, Default)]
pub struct CountingPin {
    pub rising: Rc<Cell<u32>>,
    pub falling: Rc<Cell<u32>>,
    pub level: Rc<Cell<bool>>,
}

impl ErrorType for CountingPin {
    type Error = Infallible;
}

impl OutputPin for CountingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.level.get() {
            self.falling.set(self.falling.get() + 1);
        }
        self.level.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.level.get() {
            self.rising.set(self.rising.get() + 1);
        }
        self.level.set(true);
        Ok(())
    }
}

/// In-memory radio: records sends, replays a queued inbox.
pub struct MockRadio {
    address: NodeAddress,
    pub sent: RefCell<Vec<(NodeAddress, DeliveryMode, Vec<u8>)>>,
    pub inbox: RefCell<VecDeque<MeshPacket>>,
    pub fail_sends: Cell<bool>,
}

impl MockRadio {
    pub fn new(address: NodeAddress) -> Self {
        MockRadio {
            address,
            sent: RefCell::new(Vec::new()),
            inbox: RefCell::new(VecDeque::new()),
            fail_sends: Cell::new(false),
        }
    }

    pub fn sent(&self) -> Vec<(NodeAddress, DeliveryMode, Vec<u8>)> {
        self.sent.borrow().clone()
    }
}

impl MeshTransport for MockRadio {
    fn node_address(&self) -> NodeAddress {
        self.address
    }

    async fn send(
        &self,
        destination: NodeAddress,
        mode: DeliveryMode,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if self.fail_sends.get() {
            return Err(TransportError);
        }
        self.sent
            .borrow_mut()
            .push((destination, mode, payload.to_vec()));
        Ok(())
    }

    async fn receive(
        &self,
        _timeout: Duration,
    ) -> Option<MeshPacket> {
        self.inbox.borrow_mut().pop_front()
    }
}
