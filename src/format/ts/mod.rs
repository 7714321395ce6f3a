//! # MPEG Transport Stream (TS)
//!
//! The transport stream side of cue detection:
//!
//! - **Demuxing**: zero-copy iteration over the 188-byte packets of a buffer
//! - **Headers**: TS header parsing and writing, PID encoding
//! - **HLS**: media playlists carrying cue tags
//!
//! ## Example Usage
//!
//! ```rust
//! use cuemark::format::ts::{demux, TS_PACKET_SIZE};
//!
//! let mut buffer = vec![0xFFu8; TS_PACKET_SIZE * 2 + 10];
//! buffer[0] = 0x47;
//! buffer[1] = 0x1F;
//! buffer[2] = 0x00;
//! buffer[3] = 0x10;
//! buffer[TS_PACKET_SIZE] = 0x00; // lost sync
//!
//! let pids: Vec<u16> = demux(&buffer, 0).map(|p| p.pid()).collect();
//! assert_eq!(pids, vec![0x1F00]);
//! ```

/// Packet iteration over raw buffers
pub mod demuxer;

/// Cue-annotated HLS media playlists
pub mod hls;

/// Core TS types and constants
pub mod types;

pub use demuxer::{demux, TSPacket, TSPacketIter};
pub use hls::{CuePlaylist, CueSegment};
pub use types::{
    pid_from_bytes, pid_to_bytes, AdaptationFieldControl, TSHeader, DEFAULT_CUE_PID, MAX_PID,
    PTS_HZ, TS_HEADER_SIZE, TS_PACKET_SIZE, TS_SYNC_BYTE,
};
