#![doc(html_root_url = "https://docs.rs/cuemark/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # cuemark - SCTE-35 cue detection for HLS packaging
//!
//! `cuemark` watches MPEG transport streams for SCTE-35 splice information,
//! keeps per-stream cue state and tells an HLS packager where to cut
//! segments and which ad-break tags to put on them.
//!
//! ## Features
//!
//! ### Detection
//! - Zero-copy 188-byte TS packet iteration with PID filtering
//! - `splice_info_section` decoding for `splice_insert` and `time_signal`
//! - Bounded, de-duplicated history of recent cue events per stream
//!
//! ### Scheduling
//! - Segment boundary correction so breaks start and end on segment edges
//! - Event-driven or fixed-interval ad breaks, one in flight per stream
//! - `EXT-X-CUE-OUT`, `EXT-X-CUE-OUT-CONT` and `EXT-X-CUE-IN` tags
//! - Detected sections passed through as `EXT-X-SCTE35` tags
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! cuemark = "0.1.0"
//! ```
//!
//! ### Wiring a packager
//!
//! ```rust
//! use cuemark::config::CueConfig;
//! use cuemark::cue::CueRegistry;
//! use cuemark::format::ts::CuePlaylist;
//! use cuemark::scte35::{packetize_section, SpliceSectionBuilder};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> cuemark::Result<()> {
//! let registry = CueRegistry::new(CueConfig {
//!     break_duration_ms: 8_000,
//!     ..Default::default()
//! });
//! registry.start_stream("live");
//!
//! let cue = SpliceSectionBuilder::splice_insert(42).out_of_network(true).build();
//! registry.on_segment_start("live", 0);
//! registry.ingest_at("live", &packetize_section(0x1F00, &cue, 0), Some(0));
//!
//! let mut playlist = CuePlaylist::new(Duration::from_secs(6));
//! let mut start = 0;
//! for n in 0..4 {
//!     if n > 0 {
//!         registry.on_segment_start("live", start);
//!     }
//!     let stop = registry.on_segment_end_candidate("live", start + 4_000);
//!     let tags = registry.on_segment_closed("live", start, stop);
//!     playlist.push_segment(format!("seg{}.ts", n), Duration::from_millis((stop - start) as u64), tags);
//!     start = stop;
//! }
//!
//! let m3u8 = playlist.render().await?;
//! assert!(m3u8.contains("#EXT-X-CUE-OUT:8.000\n#EXTINF:4.000,\nseg0.ts"));
//! assert!(m3u8.contains("#EXT-X-CUE-IN\n#EXTINF:4.000,\nseg1.ts"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `format`: transport stream packets, packet sources and HLS playlists
//! - `scte35`: splice section decoding, cue events and a section encoder
//! - `cue`: per-stream tracking, break scheduling and the host-facing registry
//! - `config`: defaults, config file and environment settings
//! - `error`: error type and `Result` alias
//! - `utils`: bit reading and CRC-32/MPEG-2

/// Configuration module
pub mod config;

/// Cue tracking, scheduling and tag emission
pub mod cue;

/// Error types and utilities
pub mod error;

/// Transport stream and playlist formats
pub mod format;

/// SCTE-35 splice information
pub mod scte35;

/// Common utilities and helper functions
pub mod utils;

pub use error::{CueError, Result};
