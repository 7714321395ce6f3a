use super::section::{SPLICE_INSERT, TABLE_ID_SCTE35, TIME_SIGNAL};
use crate::format::ts::types::*;
use crate::utils::Crc32Mpeg2;
use bytes::{BufMut, Bytes, BytesMut};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Command {
    Insert {
        event_id: u32,
        cancelled: bool,
        out_of_network: bool,
        break_duration: Option<Duration>,
        auto_return: bool,
    },
    TimeSignal {
        pts_time: Option<u64>,
    },
}

/// Encodes splice_info_sections.
///
/// Only the immediate, program-level form of `splice_insert` is produced.
/// Used to build fixtures and to feed loopback streams.
///
/// ```
/// use cuemark::scte35::{parse_splice_section, SpliceCommand, SpliceSectionBuilder};
/// use std::time::Duration;
///
/// let section = SpliceSectionBuilder::splice_insert(42)
///     .out_of_network(true)
///     .break_duration(Duration::from_secs(30))
///     .build();
///
/// let parsed = parse_splice_section(&section).unwrap();
/// assert!(matches!(parsed.command, SpliceCommand::Insert(i) if i.event_id == 42));
/// ```
#[derive(Debug, Clone)]
pub struct SpliceSectionBuilder {
    pts_adjustment: u64,
    tier: u16,
    command: Command,
}

impl SpliceSectionBuilder {
    pub fn splice_insert(event_id: u32) -> Self {
        Self {
            pts_adjustment: 0,
            tier: 0xFFF,
            command: Command::Insert {
                event_id,
                cancelled: false,
                out_of_network: false,
                break_duration: None,
                auto_return: true,
            },
        }
    }

    pub fn time_signal(pts_time: Option<u64>) -> Self {
        Self {
            pts_adjustment: 0,
            tier: 0xFFF,
            command: Command::TimeSignal { pts_time },
        }
    }

    pub fn pts_adjustment(mut self, pts_adjustment: u64) -> Self {
        self.pts_adjustment = pts_adjustment & 0x1_FFFF_FFFF;
        self
    }

    pub fn tier(mut self, tier: u16) -> Self {
        self.tier = tier & 0xFFF;
        self
    }

    pub fn out_of_network(mut self, value: bool) -> Self {
        if let Command::Insert { out_of_network, .. } = &mut self.command {
            *out_of_network = value;
        }
        self
    }

    pub fn cancelled(mut self, value: bool) -> Self {
        if let Command::Insert { cancelled, .. } = &mut self.command {
            *cancelled = value;
        }
        self
    }

    /// Sets `duration_flag` and writes a `break_duration()`.
    pub fn break_duration(mut self, duration: Duration) -> Self {
        if let Command::Insert { break_duration, .. } = &mut self.command {
            *break_duration = Some(duration);
        }
        self
    }

    pub fn auto_return(mut self, value: bool) -> Self {
        if let Command::Insert { auto_return, .. } = &mut self.command {
            *auto_return = value;
        }
        self
    }

    /// Serialises the section, CRC included.
    pub fn build(&self) -> Bytes {
        let mut body = BytesMut::new();
        let command_type = match &self.command {
            Command::Insert {
                event_id,
                cancelled,
                out_of_network,
                break_duration,
                auto_return,
            } => {
                body.put_u32(*event_id);
                body.put_u8(if *cancelled { 0xFF } else { 0x7F });
                if !*cancelled {
                    let mut flags = 0x40 | 0x10 | 0x0F; // program_splice, splice_immediate, reserved
                    if *out_of_network {
                        flags |= 0x80;
                    }
                    if break_duration.is_some() {
                        flags |= 0x20;
                    }
                    body.put_u8(flags);
                    if let Some(duration) = break_duration {
                        let ticks = duration.as_millis() as u64 * PTS_HZ / 1000;
                        put_33_bit_field(&mut body, *auto_return, ticks);
                    }
                    body.put_u16(0); // unique_program_id
                    body.put_u8(0); // avail_num
                    body.put_u8(0); // avails_expected
                }
                SPLICE_INSERT
            }
            Command::TimeSignal { pts_time } => {
                match pts_time {
                    Some(pts) => put_33_bit_field(&mut body, true, *pts),
                    None => body.put_u8(0x7F),
                }
                TIME_SIGNAL
            }
        };

        // protocol_version .. splice_command_type, body, descriptor_loop_length, CRC
        let section_length = 10 + 1 + body.len() + 2 + 4;

        let mut section = BytesMut::with_capacity(3 + section_length);
        section.put_u8(TABLE_ID_SCTE35);
        section.put_u16(0x3000 | (section_length as u16 & 0x0FFF));
        section.put_u8(0); // protocol_version
        // encrypted_packet = 0, encryption_algorithm = 0, pts_adjustment
        section.put_u8(((self.pts_adjustment >> 32) & 0x01) as u8);
        section.put_u32(self.pts_adjustment as u32);
        section.put_u8(0); // cw_index
        let tier_and_length = (self.tier as u32) << 12 | (body.len() as u32 & 0x0FFF);
        section.put_u8((tier_and_length >> 16) as u8);
        section.put_u16(tier_and_length as u16);
        section.put_u8(command_type);
        section.put_slice(&body);
        section.put_u16(0); // descriptor_loop_length

        let crc = Crc32Mpeg2::calculate(&section);
        section.put_u32(crc);
        section.freeze()
    }
}

/// `flag(1) reserved(6) value(33)`, the layout of splice_time() and break_duration().
fn put_33_bit_field(buf: &mut BytesMut, flag: bool, value: u64) {
    let flag_bit = if flag { 0x80 } else { 0x00 };
    buf.put_u8(flag_bit | 0x7E | ((value >> 32) & 0x01) as u8);
    buf.put_u32(value as u32);
}

/// Carries a section on `pid`, starting with a pointer_field of zero.
///
/// The first packet has payload_unit_start set; unused payload bytes are
/// 0xFF stuffing. Returns whole 188-byte packets.
pub fn packetize_section(pid: u16, section: &[u8], continuity_counter: u8) -> Vec<u8> {
    let mut payload = Vec::with_capacity(section.len() + 1);
    payload.push(0x00); // pointer_field
    payload.extend_from_slice(section);

    let payload_size = TS_PACKET_SIZE - TS_HEADER_SIZE;
    let mut out = BytesMut::with_capacity(payload.len().div_ceil(payload_size) * TS_PACKET_SIZE);
    for (i, chunk) in payload.chunks(payload_size).enumerate() {
        let header = TSHeader {
            payload_unit_start: i == 0,
            pid: pid & MAX_PID,
            continuity_counter: continuity_counter.wrapping_add(i as u8) & 0x0F,
            ..Default::default()
        };
        header.write_to(&mut out);
        out.put_slice(chunk);
        out.put_bytes(0xFF, payload_size - chunk.len());
    }
    out.to_vec()
}
