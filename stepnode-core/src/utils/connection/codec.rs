//! Wire format of the node protocol.
//!
//! ```text
//! || 1 byte  | length - 1 ||
//! || opcode  |  payload   ||
//! ```
//!
//! The payload length is whatever the radio delivered; packets carry no length
//! field of their own.
//!
//! Status payload:
//!
//! ```text
//! ||   1 byte    |    1 byte    |    1 byte    |  1 byte  ||
//! || error flags | sensor[11:8] | sensor[7:0]  | position ||
//! ```
//!
//! Move packet:
//!
//! ```text
//! || 1 byte | 1 byte      | 1 byte   | 1 byte   ||
//! || opcode | steps (i8)  | reserved | reserved ||
//! ```

use heapless::Vec;

use crate::utils::{connection::transport::MAX_PACKET_LEN, error::NodeError};

/// Largest payload following the opcode byte.
pub const MAX_PAYLOAD_LEN: usize = MAX_PACKET_LEN - 1;

/// Bytes in an encoded status payload.
pub const STATUS_LEN: usize = 4;

/// Bytes in an encoded move packet, opcode included.
pub const MOVE_LEN: usize = 4;

/// Busy bit of the status error flags.
pub const FLAG_BUSY: u8 = 1 << 0;

/// Command opcodes, by wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Peer asks the coordinator to power it up.
    RequestPower = 0,
    /// Coordinator asks a peer for its status.
    GetStatus = 1,
    /// Peer reports its status.
    GiveStatus = 2,
    ControlDirection = 3,
    Terminate = 4,
    /// Coordinator asks a peer to run a calibration scan.
    Scan = 5,
    /// Coordinator asks a peer to move by a signed number of steps.
    Move = 6,
}

impl TryFrom<u8> for Opcode {
    type Error = NodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::RequestPower),
            1 => Ok(Opcode::GetStatus),
            2 => Ok(Opcode::GiveStatus),
            3 => Ok(Opcode::ControlDirection),
            4 => Ok(Opcode::Terminate),
            5 => Ok(Opcode::Scan),
            6 => Ok(Opcode::Move),
            other => Err(NodeError::UnrecognizedOpcode(other)),
        }
    }
}

/// A decoded command: opcode plus the bytes that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    pub opcode: Opcode,
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl CommandPacket {
    /// A command without payload.
    pub fn bare(opcode: Opcode) -> Self {
        CommandPacket {
            opcode,
            payload: Vec::new(),
        }
    }

    /// A command carrying `payload`.
    pub fn with_payload(
        opcode: Opcode,
        payload: &[u8],
    ) -> Result<Self, NodeError> {
        let payload = Vec::from_slice(payload).map_err(|_| NodeError::MalformedPacket)?;
        Ok(CommandPacket { opcode, payload })
    }

    /// Serialize as opcode byte followed by the payload.
    pub fn encode(&self) -> Vec<u8, MAX_PACKET_LEN> {
        let mut out = Vec::new();
        // capacity is payload capacity + 1, neither push can fail
        let _ = out.push(self.opcode as u8);
        let _ = out.extend_from_slice(&self.payload);
        out
    }

    /// Signed step parameter of a `Move` command.
    pub fn move_steps(&self) -> Result<i8, NodeError> {
        self.payload
            .first()
            .map(|&b| b as i8)
            .ok_or(NodeError::MalformedPacket)
    }
}

/// Split a raw radio payload into opcode and payload.
pub fn decode(raw: &[u8]) -> Result<CommandPacket, NodeError> {
    let (&op, rest) = raw.split_first().ok_or(NodeError::MalformedPacket)?;
    let opcode = Opcode::try_from(op)?;
    CommandPacket::with_payload(opcode, rest)
}

/// Status a peer reports to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub error_flags: u8,
    /// 12-bit averaged sensor reading.
    pub sensor: u16,
    pub position: u8,
}

impl StatusReport {
    pub fn busy(&self) -> bool {
        self.error_flags & FLAG_BUSY != 0
    }

    /// Sensor reading converted to millivolts (12-bit ADC, 3.3 V reference).
    pub fn millivolts(&self) -> u32 {
        u32::from(self.sensor) * 3300 / 4096
    }

    pub fn encode(&self) -> [u8; STATUS_LEN] {
        encode_status(self.error_flags, self.sensor, self.position)
    }
}

/// Pack a status payload, keeping only the low 12 bits of `sensor`.
pub fn encode_status(
    error_flags: u8,
    sensor: u16,
    position: u8,
) -> [u8; STATUS_LEN] {
    [
        error_flags,
        ((sensor >> 8) & 0x0f) as u8,
        (sensor & 0xff) as u8,
        position,
    ]
}

/// Unpack a status payload.
///
/// Extra trailing bytes are ignored; fewer than four bytes is malformed.
pub fn decode_status(payload: &[u8]) -> Result<StatusReport, NodeError> {
    match payload {
        [error_flags, high, low, position, ..] => Ok(StatusReport {
            error_flags: *error_flags,
            sensor: u16::from(high & 0x0f) << 8 | u16::from(*low),
            position: *position,
        }),
        _ => Err(NodeError::MalformedPacket),
    }
}

/// Build the wire form of a move-by-`steps` command.
pub fn encode_move(steps: i8) -> [u8; MOVE_LEN] {
    [Opcode::Move as u8, steps as u8, 0, 0]
}
