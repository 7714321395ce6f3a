//! # SCTE-35 splice information
//!
//! Decoding of `splice_info_section` payloads into [`CueEvent`]s, plus an
//! encoder for building sections and carrying them in TS packets.
//!
//! Only `splice_insert` and `time_signal` are interpreted. Other command
//! types decode as [`SpliceCommand::Unknown`]; CRCs are not validated and
//! encrypted sections are rejected.
//!
//! ```rust
//! use cuemark::scte35::{parse_splice_section, SpliceCommand};
//!
//! let section = [
//!     0xFC, 0x30, 0x16, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xF0, 0x05,
//!     0x06, 0xFE, 0x42, 0x3A, 0x35, 0xBD, 0x00, 0x00, 0xBB, 0x0C, 0x73, 0xF4,
//! ];
//! let parsed = parse_splice_section(&section).unwrap();
//! assert!(matches!(parsed.command, SpliceCommand::TimeSignal(_)));
//! ```

/// Section encoder and TS packetizer
pub mod builder;

/// Normalised cue events
pub mod event;

/// splice_info_section decoder
pub mod section;

pub use builder::{packetize_section, SpliceSectionBuilder};
pub use event::{CueEvent, CueKind};
pub use section::{
    parse_splice_section, SpliceCommand, SpliceInsert, SpliceSection, TimeSignal,
    SPLICE_INSERT, TABLE_ID_SCTE35, TIME_SIGNAL,
};
