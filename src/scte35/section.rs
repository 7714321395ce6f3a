use crate::error::{CueError, Result};
use crate::utils::BitReader;

/// `table_id` of every splice_info_section.
pub const TABLE_ID_SCTE35: u8 = 0xFC;

pub const SPLICE_NULL: u8 = 0x00;
pub const SPLICE_INSERT: u8 = 0x05;
pub const TIME_SIGNAL: u8 = 0x06;

/// Header bytes up to and including `splice_command_type`.
pub const MIN_SECTION_SIZE: usize = 14;

const SECTION_HEADER_SIZE: usize = 3;
const COMMAND_LENGTH_UNSPECIFIED: u16 = 0xFFF;

/// Fields of `splice_insert()` needed for cue-out/cue-in tagging.
///
/// Program/component splice times, the break_duration value and the
/// avail fields are not decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceInsert {
    pub event_id: u32,
    pub cancelled: bool,
    pub out_of_network: bool,
    pub program_splice: bool,
    pub has_duration: bool,
    pub splice_immediate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignal {
    /// `splice_time().pts_time` in 90 kHz units, when `time_specified_flag` is set.
    pub pts_time: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceCommand {
    Insert(SpliceInsert),
    TimeSignal(TimeSignal),
    Unknown(u8),
}

/// A decoded splice_info_section borrowing from the payload it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceSection<'a> {
    pub table_id: u8,
    pub section_length: u16,
    pub protocol_version: u8,
    pub pts_adjustment: u64,
    pub tier: u16,
    pub splice_command_length: u16,
    pub splice_command_type: u8,
    pub command_body: &'a [u8],
    pub command: SpliceCommand,
    /// The whole section, `3 + section_length` bytes, CRC included.
    pub raw: &'a [u8],
}

/// Decodes a splice_info_section at the start of `data`.
///
/// Sections that are too short, carry another table id, are truncated, use a
/// protocol version other than 0 or are encrypted come back as
/// [`CueError::InvalidData`]. Callers treat that as "no section here".
/// Unrecognised command types decode fine as [`SpliceCommand::Unknown`].
pub fn parse_splice_section(data: &[u8]) -> Result<SpliceSection<'_>> {
    if data.len() < MIN_SECTION_SIZE {
        return Err(CueError::InvalidData(format!(
            "splice_info_section too short: {} bytes",
            data.len()
        )));
    }
    if data[0] != TABLE_ID_SCTE35 {
        return Err(CueError::InvalidData(format!(
            "not a splice_info_section: table_id 0x{:02x}",
            data[0]
        )));
    }

    let mut reader = BitReader::new(data);
    let table_id = reader.read_bits(8)? as u8;
    reader.skip_bits(4)?; // section_syntax_indicator, private_indicator, sap_type
    let section_length = reader.read_bits(12)? as u16;

    let section_end = SECTION_HEADER_SIZE + section_length as usize;
    if section_end > data.len() {
        return Err(CueError::InvalidData(format!(
            "truncated splice_info_section: need {} bytes, have {}",
            section_end,
            data.len()
        )));
    }
    if section_end < MIN_SECTION_SIZE {
        return Err(CueError::InvalidData(format!(
            "section_length {} shorter than the splice header",
            section_length
        )));
    }

    let protocol_version = reader.read_bits(8)? as u8;
    if protocol_version != 0 {
        return Err(CueError::InvalidData(format!(
            "unsupported protocol_version {}",
            protocol_version
        )));
    }

    let encrypted = reader.read_bit()?;
    if encrypted {
        return Err(CueError::InvalidData("encrypted splice_info_section".into()));
    }
    reader.skip_bits(6)?; // encryption_algorithm
    let pts_adjustment = reader.read_bits_u64(33)?;
    reader.skip_bits(8)?; // cw_index
    let tier = reader.read_bits(12)? as u16;
    let splice_command_length = reader.read_bits(12)? as u16;
    let splice_command_type = reader.read_bits(8)? as u8;

    let body_start = reader.position();
    let body_end = if splice_command_length == COMMAND_LENGTH_UNSPECIFIED {
        section_end
    } else {
        (body_start + splice_command_length as usize).min(section_end)
    };
    let command_body = &data[body_start..body_end];

    let command = match splice_command_type {
        SPLICE_INSERT => SpliceCommand::Insert(parse_splice_insert(command_body)?),
        TIME_SIGNAL => SpliceCommand::TimeSignal(parse_time_signal(command_body)?),
        other => SpliceCommand::Unknown(other),
    };

    Ok(SpliceSection {
        table_id,
        section_length,
        protocol_version,
        pts_adjustment,
        tier,
        splice_command_length,
        splice_command_type,
        command_body,
        command,
        raw: &data[..section_end],
    })
}

fn parse_splice_insert(body: &[u8]) -> Result<SpliceInsert> {
    let mut reader = BitReader::new(body);
    let event_id = reader
        .read_bits(32)
        .map_err(|_| CueError::InvalidData("splice_insert without event id".into()))?;

    let cancelled = reader.read_bit().unwrap_or(false);
    reader.skip_bits(7).ok(); // reserved

    let mut insert = SpliceInsert {
        event_id,
        cancelled,
        out_of_network: false,
        program_splice: false,
        has_duration: false,
        splice_immediate: false,
    };
    if cancelled {
        return Ok(insert);
    }

    let flags = reader
        .read_bits(8)
        .map_err(|_| CueError::InvalidData("splice_insert flags missing".into()))?;
    insert.out_of_network = flags & 0x80 != 0;
    insert.program_splice = flags & 0x40 != 0;
    insert.has_duration = flags & 0x20 != 0;
    insert.splice_immediate = flags & 0x10 != 0;
    Ok(insert)
}

fn parse_time_signal(body: &[u8]) -> Result<TimeSignal> {
    let mut reader = BitReader::new(body);
    let pts_time = match reader.read_bit() {
        Ok(true) => {
            reader.skip_bits(6)?;
            Some(reader.read_bits_u64(33)?)
        }
        // time_specified_flag clear, or an empty splice_time()
        Ok(false) | Err(_) => None,
    };
    Ok(TimeSignal { pts_time })
}
