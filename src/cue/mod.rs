//! # Cue tracking and break scheduling
//!
//! Per-stream state that turns transport stream buffers into [`CueEvent`]s
//! and packager segment notifications into playlist cue tags.
//!
//! ## Example
//!
//! ```rust
//! use cuemark::config::CueConfig;
//! use cuemark::cue::CueRegistry;
//! use cuemark::scte35::{packetize_section, SpliceSectionBuilder};
//!
//! let registry = CueRegistry::new(CueConfig::default());
//! registry.start_stream("live");
//!
//! let section = SpliceSectionBuilder::splice_insert(42).out_of_network(true).build();
//! let packets = packetize_section(0x1F00, &section, 0);
//!
//! registry.on_segment_start("live", 0);
//! let events = registry.ingest("live", &packets);
//! assert_eq!(events[0].event_id(), Some(42));
//!
//! let stop = registry.on_segment_end_candidate("live", 6_000);
//! let tags = registry.on_segment_closed("live", 0, stop);
//! assert_eq!(tags.len(), 2);
//! assert!(tags[0].starts_with("EXT-X-SCTE35:CUE="));
//! assert_eq!(tags[1], "EXT-X-CUE-OUT:30.000");
//! ```
//!
//! [`CueEvent`]: crate::scte35::CueEvent

/// PID list resolution
pub mod pids;

/// Stream-id keyed contexts and the host-facing API
pub mod registry;

/// Fixed-capacity event ring
pub mod ring;

/// Segment-boundary cue state machine
pub mod scheduler;

/// Playlist tag wire format
pub mod tags;

/// Per-stream cue detection
pub mod tracker;

pub use pids::{parse_pid, resolve_pids};
pub use registry::{
    CueRegistry, SegmentBoundaryNotifier, SegmentEvent, SegmentOutcome, StreamContext, StreamStatus,
};
pub use ring::CueRing;
pub use scheduler::{
    correct_boundary, CueState, CueTrigger, FixedBounds, PackagerBounds, ScheduledCue,
    SchedulerConfig, SchedulerState, SegmentCueScheduler, Timecode,
};
pub use tags::{format_seconds, CueTag};
pub use tracker::{CueTotals, StreamCueTracker, TrackerStats};
