use crate::error::{CueError, Result};
use bytes::{BufMut, BytesMut};

// Constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const MAX_PID: u16 = 0x1FFF;

/// PID conventionally carrying SCTE-35 cues when none is configured.
pub const DEFAULT_CUE_PID: u16 = 0x1F00;

pub const PTS_HZ: u64 = 90_000;

/// The two adaptation_field_control bits of the TS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptationFieldControl {
    /// `0b00`, reserved by ISO/IEC 13818-1
    Reserved,
    /// `0b01`
    PayloadOnly,
    /// `0b10`
    AdaptationOnly,
    /// `0b11`
    Both,
}

impl AdaptationFieldControl {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b01 => Self::PayloadOnly,
            0b10 => Self::AdaptationOnly,
            0b11 => Self::Both,
            _ => Self::Reserved,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Reserved => 0b00,
            Self::PayloadOnly => 0b01,
            Self::AdaptationOnly => 0b10,
            Self::Both => 0b11,
        }
    }

    pub fn has_adaptation(self) -> bool {
        matches!(self, Self::AdaptationOnly | Self::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TSHeader {
    pub sync_byte: u8,
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_control: AdaptationFieldControl,
    pub continuity_counter: u8,
}

impl Default for TSHeader {
    fn default() -> Self {
        Self {
            sync_byte: TS_SYNC_BYTE,
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: 0,
            scrambling_control: 0,
            adaptation_field_control: AdaptationFieldControl::PayloadOnly,
            continuity_counter: 0,
        }
    }
}

/// `((b1 & 0x1F) << 8) | b2`
pub fn pid_from_bytes(b1: u8, b2: u8) -> u16 {
    (((b1 & 0x1F) as u16) << 8) | b2 as u16
}

/// Inverse of [`pid_from_bytes`]; flag bits of the first byte are left clear.
pub fn pid_to_bytes(pid: u16) -> [u8; 2] {
    [((pid >> 8) & 0x1F) as u8, (pid & 0xFF) as u8]
}

impl TSHeader {
    /// Decodes the fixed 4-byte header. The sync byte is not checked here.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < TS_HEADER_SIZE {
            return Err(CueError::InvalidData("TS packet too short".into()));
        }

        Ok(TSHeader {
            sync_byte: data[0],
            transport_error: (data[1] & 0x80) != 0,
            payload_unit_start: (data[1] & 0x40) != 0,
            transport_priority: (data[1] & 0x20) != 0,
            pid: pid_from_bytes(data[1], data[2]),
            scrambling_control: (data[3] >> 6) & 0x03,
            adaptation_field_control: AdaptationFieldControl::from_bits(data[3] >> 4),
            continuity_counter: data[3] & 0x0F,
        })
    }

    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.sync_byte);

        let [hi, lo] = pid_to_bytes(self.pid);
        let mut b1 = hi;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        if self.transport_priority {
            b1 |= 0x20;
        }
        buf.put_u8(b1);
        buf.put_u8(lo);

        let b3 = (self.scrambling_control & 0x03) << 6
            | self.adaptation_field_control.bits() << 4
            | (self.continuity_counter & 0x0F);
        buf.put_u8(b3);
    }
}
