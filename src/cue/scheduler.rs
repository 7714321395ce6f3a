//! Segment-boundary-aware cue scheduling.
//!
//! The packager reports three things per segment: that one is starting, the
//! stop time it proposes, and that one has closed. The scheduler bends the
//! proposed stop so that the break's start and end land exactly on segment
//! edges, and decides which cue tags the closing segment carries.

use super::tags::CueTag;
use crate::scte35::{CueEvent, CueKind};
use bytes::Bytes;
use log::{debug, info};
use std::collections::VecDeque;

/// Milliseconds on the packager's timeline.
pub type Timecode = i64;

/// Sections waiting for their segment to close; older ones are dropped.
const PASSTHROUGH_CAPACITY: usize = 64;

/// A millisecond count on the timeline, clamped to `Timecode::MAX`.
pub fn to_timecode(ms: u64) -> Timecode {
    Timecode::try_from(ms).unwrap_or(Timecode::MAX)
}

/// Segment duration limits of the packager.
pub trait PackagerBounds {
    fn min_chunk_duration(&self) -> Timecode;
    fn chunk_duration_target(&self) -> Timecode;
}

/// Plain [`PackagerBounds`] for hosts with static segment settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBounds {
    pub min_chunk_duration: Timecode,
    pub chunk_duration_target: Timecode,
}

impl PackagerBounds for FixedBounds {
    fn min_chunk_duration(&self) -> Timecode {
        self.min_chunk_duration
    }

    fn chunk_duration_target(&self) -> Timecode {
        self.chunk_duration_target
    }
}

/// What opens an ad break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueTrigger {
    /// A recorded splice_insert with out_of_network set.
    OnCueEvent,
    /// The first segment start at least `interval_ms` after the previous
    /// break ended, or after the first segment seen.
    Interval { interval_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub trigger: CueTrigger,
    /// Planned length of every break.
    pub break_duration_ms: u64,
    /// Tolerance for ending a break one rounding error early.
    pub guard_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            trigger: CueTrigger::OnCueEvent,
            break_duration_ms: 30_000,
            guard_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueState {
    Pending,
    Active,
    Expired,
}

/// The single break in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCue {
    pub start: Timecode,
    pub duration_ms: u64,
    pub state: CueState,
    pub event_id: Option<u32>,
    payload: Option<Bytes>,
    cue_out_sent: bool,
}

impl ScheduledCue {
    /// Where the break ends and a clean cue-in boundary is needed.
    pub fn end(&self) -> Timecode {
        self.start.saturating_add(to_timecode(self.duration_ms))
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }
}

/// Coarse scheduler state for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Pending,
    Active,
}

#[derive(Debug, Clone)]
struct Deferred {
    event_id: Option<u32>,
    payload: Option<Bytes>,
}

/// Moves `chunk_end` so that `t` lands on a segment edge.
///
/// - `chunk_start < t < chunk_end`: split early at `t`
/// - `t == chunk_start`: stop no earlier than `chunk_start + min_duration`
/// - `t > chunk_end` within `[min_duration, target_duration]` of the start:
///   extend to `t`
/// - otherwise `chunk_end` is returned untouched
pub fn correct_boundary(
    chunk_start: Timecode,
    chunk_end: Timecode,
    t: Timecode,
    min_duration: Timecode,
    target_duration: Timecode,
) -> Timecode {
    if chunk_start < t && t < chunk_end {
        t
    } else if t == chunk_start {
        chunk_end.max(chunk_start.saturating_add(min_duration))
    } else if t > chunk_end && (min_duration..=target_duration).contains(&t.saturating_sub(chunk_start)) {
        t
    } else {
        chunk_end
    }
}

#[derive(Debug)]
pub struct SegmentCueScheduler {
    config: SchedulerConfig,
    cue: Option<ScheduledCue>,
    deferred: Option<Deferred>,
    passthrough: VecDeque<(Option<Timecode>, Bytes)>,
    open_segment: Option<Timecode>,
    last_closed_end: Option<Timecode>,
    interval_anchor: Option<Timecode>,
    breaks_completed: u64,
}

impl SegmentCueScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            cue: None,
            deferred: None,
            passthrough: VecDeque::new(),
            open_segment: None,
            last_closed_end: None,
            interval_anchor: None,
            breaks_completed: 0,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        match &self.cue {
            Some(cue) if cue.state == CueState::Active => SchedulerState::Active,
            Some(_) => SchedulerState::Pending,
            None if self.deferred.is_some() => SchedulerState::Pending,
            None => SchedulerState::Idle,
        }
    }

    pub fn scheduled(&self) -> Option<&ScheduledCue> {
        self.cue.as_ref()
    }

    /// Start of the open segment, or the end of the last closed one.
    pub fn segment_start(&self) -> Option<Timecode> {
        self.open_segment.or(self.last_closed_end)
    }

    pub fn breaks_completed(&self) -> u64 {
        self.breaks_completed
    }

    /// When the interval trigger will next open a break, if it is armed.
    pub fn next_interval_break(&self) -> Option<Timecode> {
        match (self.config.trigger, self.interval_anchor) {
            (CueTrigger::Interval { interval_ms }, Some(anchor)) if self.state() == SchedulerState::Idle => {
                Some(anchor.saturating_add(to_timecode(interval_ms)))
            }
            _ => None,
        }
    }

    /// Opens a break at `start` unless one is already pending or active.
    pub fn schedule(&mut self, start: Timecode, event_id: Option<u32>, payload: Option<Bytes>) -> bool {
        if self.state() != SchedulerState::Idle {
            debug!("break already in flight, ignoring request at {}", start);
            return false;
        }

        info!(
            "cue pending at {} for {} ms (event {:?})",
            start, self.config.break_duration_ms, event_id
        );
        self.cue = Some(ScheduledCue {
            start,
            duration_ms: self.config.break_duration_ms,
            state: CueState::Pending,
            event_id,
            payload,
            cue_out_sent: false,
        });
        true
    }

    /// Event-driven trigger. Only cue-out splice_inserts open a break, and
    /// only when the scheduler runs with [`CueTrigger::OnCueEvent`].
    pub fn on_cue_event(&mut self, event: &CueEvent) -> bool {
        if self.config.trigger != CueTrigger::OnCueEvent || !event.is_cue_out() {
            return false;
        }

        let start = match self.place(event.timecode()) {
            Some(start) => start,
            None => {
                // No timeline yet: the break opens with the first segment
                if self.state() != SchedulerState::Idle {
                    return false;
                }
                debug!("no segment seen yet, deferring cue until the next segment start");
                self.deferred = Some(Deferred {
                    event_id: event.event_id(),
                    payload: Some(event.raw_section().clone()),
                });
                return true;
            }
        };

        self.schedule(start, event.event_id(), Some(event.raw_section().clone()))
    }

    /// Queues a recorded splice_insert or time_signal for an `EXT-X-SCTE35`
    /// tag on the segment containing its timecode. Without a timeline the
    /// section goes on the next segment to close.
    pub fn on_cue_section(&mut self, event: &CueEvent) {
        if !matches!(event.kind(), CueKind::SpliceInsert | CueKind::TimeSignal) {
            return;
        }
        if self.passthrough.len() == PASSTHROUGH_CAPACITY {
            if let Some((at, _)) = self.passthrough.pop_front() {
                debug!("dropping unplaced cue section at {:?}", at);
            }
        }
        let at = self.place(event.timecode());
        self.passthrough.push_back((at, event.raw_section().clone()));
    }

    /// Where on the timeline something seen now at `timecode` belongs.
    fn place(&self, timecode: Option<Timecode>) -> Option<Timecode> {
        match (timecode, self.segment_start()) {
            (Some(at), Some(floor)) => Some(at.max(floor)),
            (at, floor) => at.or(floor),
        }
    }

    /// Pass-through tags for sections inside `[chunk_start, chunk_end)`.
    fn take_sections(&mut self, chunk_start: Timecode, chunk_end: Timecode) -> Vec<CueTag> {
        let mut tags = Vec::new();
        self.passthrough.retain(|(at, payload)| match *at {
            Some(at) if at >= chunk_end => true,
            Some(at) if at < chunk_start => {
                debug!("cue section at {} predates segment [{}, {}]", at, chunk_start, chunk_end);
                false
            }
            _ => {
                tags.push(CueTag::Scte35 {
                    payload: payload.clone(),
                });
                false
            }
        });
        tags
    }

    /// A segment begins at `start`. `latest_payload` is the most recent
    /// cue-out section seen on the stream, carried by interval-triggered breaks.
    pub fn on_segment_start(&mut self, start: Timecode, latest_payload: Option<Bytes>) {
        self.open_segment = Some(start);

        if let Some(deferred) = self.deferred.take() {
            self.schedule(start, deferred.event_id, deferred.payload);
            return;
        }

        if let CueTrigger::Interval { interval_ms } = self.config.trigger {
            let anchor = *self.interval_anchor.get_or_insert(start);
            if self.state() == SchedulerState::Idle
                && start.saturating_sub(anchor) >= to_timecode(interval_ms)
            {
                info!("ad interval of {} ms reached at {}", interval_ms, start);
                self.schedule(start, None, latest_payload);
            }
        }
    }

    /// The packager proposes to close the segment opened at `chunk_start`
    /// at `candidate`. Returns the stop it must use instead.
    pub fn on_segment_end_candidate(
        &mut self,
        chunk_start: Timecode,
        candidate: Timecode,
        bounds: &dyn PackagerBounds,
    ) -> Timecode {
        let Some(cue) = &self.cue else {
            return candidate;
        };

        let min = bounds.min_chunk_duration();
        let target = bounds.chunk_duration_target();
        let mut edges = Vec::with_capacity(2);
        if cue.state == CueState::Pending {
            edges.push(cue.start);
        }
        edges.push(cue.end());

        let corrected = edges
            .into_iter()
            .map(|t| correct_boundary(chunk_start, candidate, t, min, target))
            .filter(|&stop| stop != candidate)
            .min()
            .unwrap_or(candidate);

        if corrected != candidate {
            debug!(
                "segment from {} moved from {} to {} for cue at {}",
                chunk_start, candidate, corrected, cue.start
            );
        }
        corrected
    }

    /// The segment `[chunk_start, chunk_end]` has closed. Returns the tags it
    /// carries: pass-through sections first, then the break's own tags.
    pub fn on_segment_closed(&mut self, chunk_start: Timecode, chunk_end: Timecode) -> Vec<CueTag> {
        self.open_segment = None;
        self.last_closed_end = Some(chunk_end);

        let mut tags = self.take_sections(chunk_start, chunk_end);
        let Some(cue) = self.cue.as_mut() else {
            return tags;
        };

        if cue.state == CueState::Pending && chunk_end >= cue.start {
            info!("cue at {} active", cue.start);
            cue.state = CueState::Active;
        }
        if cue.state != CueState::Active || chunk_end <= cue.start {
            return tags;
        }

        let cue_out = !cue.cue_out_sent;
        if cue_out {
            cue.cue_out_sent = true;
            tags.push(CueTag::CueOut {
                duration_ms: cue.duration_ms,
            });
        }

        let elapsed_at_close = chunk_end.saturating_sub(cue.start) as u64;
        if elapsed_at_close.saturating_add(self.config.guard_ms) >= cue.duration_ms {
            tags.push(CueTag::CueIn);
            cue.state = CueState::Expired;
            info!("cue at {} expired at {}", cue.start, chunk_end);
            self.cue = None;
            self.breaks_completed += 1;
            self.interval_anchor = Some(chunk_end);
        } else if !cue_out {
            let elapsed_ms = chunk_start.saturating_sub(cue.start).max(0) as u64;
            tags.push(CueTag::CueOutCont {
                elapsed_ms,
                remaining_ms: cue.duration_ms.saturating_sub(elapsed_ms),
                payload: cue.payload.clone(),
            });
        }
        tags
    }
}
