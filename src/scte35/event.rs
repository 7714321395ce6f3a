use super::section::{SpliceCommand, SpliceSection};
use crate::format::ts::PTS_HZ;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Which splice command produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueKind {
    SpliceInsert,
    TimeSignal,
    Unknown(u8),
}

impl fmt::Display for CueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CueKind::SpliceInsert => write!(f, "splice_insert"),
            CueKind::TimeSignal => write!(f, "time_signal"),
            CueKind::Unknown(code) => write!(f, "unknown(0x{:02x})", code),
        }
    }
}

/// A detected SCTE-35 marker. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueEvent {
    kind: CueKind,
    event_id: Option<u32>,
    detected_at: DateTime<Utc>,
    stream_id: Arc<str>,
    pid: u16,
    out_of_network: bool,
    has_duration: bool,
    cancelled: bool,
    pts_adjustment: u64,
    pts_time: Option<u64>,
    timecode: Option<i64>,
    raw_section: Bytes,
}

impl CueEvent {
    /// Builds an event from a decoded section found on `pid`.
    ///
    /// `timecode` is the host's timeline position (milliseconds) for the
    /// buffer the section arrived in, when it has one.
    pub fn from_section(
        section: &SpliceSection<'_>,
        stream_id: Arc<str>,
        pid: u16,
        timecode: Option<i64>,
    ) -> Self {
        let mut event = Self {
            kind: CueKind::Unknown(section.splice_command_type),
            event_id: None,
            detected_at: Utc::now(),
            stream_id,
            pid,
            out_of_network: false,
            has_duration: false,
            cancelled: false,
            pts_adjustment: section.pts_adjustment,
            pts_time: None,
            timecode,
            raw_section: Bytes::copy_from_slice(section.raw),
        };

        match section.command {
            SpliceCommand::Insert(insert) => {
                event.kind = CueKind::SpliceInsert;
                event.event_id = Some(insert.event_id);
                event.out_of_network = insert.out_of_network;
                event.has_duration = insert.has_duration;
                event.cancelled = insert.cancelled;
            }
            SpliceCommand::TimeSignal(signal) => {
                // time_signal carries no event id on the wire
                event.kind = CueKind::TimeSignal;
                event.pts_time = signal.pts_time;
            }
            SpliceCommand::Unknown(_) => {}
        }
        event
    }

    pub fn kind(&self) -> CueKind {
        self.kind
    }

    /// `splice_event_id` for splice_insert; `None` for every other command.
    pub fn event_id(&self) -> Option<u32> {
        self.event_id
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    pub fn out_of_network(&self) -> bool {
        self.out_of_network
    }

    pub fn has_duration(&self) -> bool {
        self.has_duration
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn pts_adjustment(&self) -> u64 {
        self.pts_adjustment
    }

    pub fn pts_time(&self) -> Option<u64> {
        self.pts_time
    }

    /// `pts_time` with `pts_adjustment` applied, wrapped to 33 bits, as a duration.
    pub fn splice_pts(&self) -> Option<Duration> {
        self.pts_time.map(|pts| {
            let adjusted = (pts + self.pts_adjustment) & 0x1_FFFF_FFFF;
            Duration::from_nanos(adjusted * 1_000_000_000 / PTS_HZ)
        })
    }

    pub fn timecode(&self) -> Option<i64> {
        self.timecode
    }

    pub fn raw_section(&self) -> &Bytes {
        &self.raw_section
    }

    /// The raw section, base64 encoded verbatim for `SCTE35=` attributes.
    pub fn payload_base64(&self) -> String {
        STANDARD.encode(&self.raw_section)
    }

    /// Whether this event opens an ad break.
    pub fn is_cue_out(&self) -> bool {
        self.kind == CueKind::SpliceInsert && self.out_of_network && !self.cancelled
    }
}

impl fmt::Display for CueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on pid 0x{:04x} in {}", self.kind, self.pid, self.stream_id)?;
        if let Some(id) = self.event_id {
            write!(f, " (event {})", id)?;
        }
        if self.out_of_network {
            write!(f, " out-of-network")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scte35::section::parse_splice_section;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_time_signal_has_no_event_id() {
        let data = STANDARD.decode("/DAWAAAAAAAAAP/wBQb+Qjo1vQAAuwxz9A==").unwrap();
        let section = parse_splice_section(&data).unwrap();
        let event = CueEvent::from_section(&section, Arc::from("ingest"), 0x1F00, Some(1000));

        assert_eq!(event.kind(), CueKind::TimeSignal);
        assert_eq!(event.event_id(), None);
        assert!(!event.is_cue_out());
        assert_eq!(event.timecode(), Some(1000));
        assert_eq!(event.payload_base64(), "/DAWAAAAAAAAAP/wBQb+Qjo1vQAAuwxz9A==");
        assert_eq!(
            event.splice_pts(),
            Some(Duration::from_nanos(0x423A35BD * 1_000_000_000 / PTS_HZ))
        );
    }
}
