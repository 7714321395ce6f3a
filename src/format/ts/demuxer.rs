use super::types::*;
use log::trace;

/// Borrowed view of one 188-byte transport packet.
///
/// Nothing is copied: `payload` points into the caller's buffer.
#[derive(Debug, Clone, Copy)]
pub struct TSPacket<'a> {
    data: &'a [u8],
    pid: u16,
    payload_unit_start: bool,
    adaptation_field_control: AdaptationFieldControl,
    payload: &'a [u8],
}

impl<'a> TSPacket<'a> {
    /// Interprets exactly [`TS_PACKET_SIZE`] bytes as a packet.
    ///
    /// Returns `None` when `data` is not a full packet. A bad sync byte still
    /// yields a packet; check [`TSPacket::sync_ok`].
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        if data.len() != TS_PACKET_SIZE {
            return None;
        }

        let adaptation_field_control = AdaptationFieldControl::from_bits(data[3] >> 4);
        let payload: &'a [u8] = match adaptation_field_control {
            AdaptationFieldControl::PayloadOnly => &data[TS_HEADER_SIZE..],
            AdaptationFieldControl::Both => {
                // length byte plus the length it declares
                let start = TS_HEADER_SIZE + 1 + data[TS_HEADER_SIZE] as usize;
                data.get(start..).unwrap_or(&[])
            }
            AdaptationFieldControl::AdaptationOnly | AdaptationFieldControl::Reserved => &[],
        };

        Some(Self {
            data,
            pid: pid_from_bytes(data[1], data[2]),
            payload_unit_start: (data[1] & 0x40) != 0,
            adaptation_field_control,
            payload,
        })
    }

    pub fn sync_ok(&self) -> bool {
        self.data[0] == TS_SYNC_BYTE
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    pub fn payload_unit_start(&self) -> bool {
        self.payload_unit_start
    }

    pub fn adaptation_field_control(&self) -> AdaptationFieldControl {
        self.adaptation_field_control
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Full header decode, for callers that need the remaining flags.
    pub fn header(&self) -> TSHeader {
        // data is always a full packet, so the header is present
        TSHeader::parse(self.data).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }
}

/// Lazy iterator over the sync-valid packets of a buffer.
///
/// The buffer is walked in 188-byte strides from the starting offset. A short
/// trailing chunk is ignored and chunks whose first byte is not `0x47` are
/// skipped without attempting to resynchronise. Clones are independent
/// cursors over the same buffer.
#[derive(Debug, Clone)]
pub struct TSPacketIter<'a> {
    chunks: std::slice::ChunksExact<'a, u8>,
    examined: usize,
    sync_errors: usize,
}

/// Walks `buf` from `offset` in 188-byte strides.
pub fn demux(buf: &[u8], offset: usize) -> TSPacketIter<'_> {
    let buf = buf.get(offset..).unwrap_or(&[]);
    TSPacketIter {
        chunks: buf.chunks_exact(TS_PACKET_SIZE),
        examined: 0,
        sync_errors: 0,
    }
}

impl<'a> TSPacketIter<'a> {
    /// Number of full 188-byte chunks looked at so far.
    pub fn examined(&self) -> usize {
        self.examined
    }

    /// Number of chunks skipped because of a bad sync byte.
    pub fn sync_errors(&self) -> usize {
        self.sync_errors
    }
}

impl<'a> Iterator for TSPacketIter<'a> {
    type Item = TSPacket<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for chunk in self.chunks.by_ref() {
            self.examined += 1;
            let Some(packet) = TSPacket::parse(chunk) else {
                continue;
            };
            if !packet.sync_ok() {
                self.sync_errors += 1;
                trace!("skipping packet with sync byte 0x{:02x}", chunk[0]);
                continue;
            }
            return Some(packet);
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.chunks.len()))
    }
}
