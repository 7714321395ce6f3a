use super::scheduler::{FixedBounds, SchedulerState, SegmentCueScheduler, Timecode};
use super::tags::CueTag;
use super::tracker::{CueTotals, StreamCueTracker, TrackerStats};
use crate::config::CueConfig;
use crate::format::PacketSource;
use crate::scte35::CueEvent;
use crate::Result;
use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A packager segment notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentEvent {
    /// A segment begins at `start`.
    Starting { start: Timecode },
    /// The packager proposes to close the open segment at `candidate`.
    EndCandidate { candidate: Timecode },
    /// The segment `[start, end]` has been finalized.
    Closed { start: Timecode, end: Timecode },
}

/// What the packager must do in response to a [`SegmentEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    Continue,
    /// Close the segment here instead of at the proposed candidate.
    StopAt(Timecode),
    /// Tags for the segment that just closed.
    Tags(Vec<CueTag>),
}

/// Consumer of packager segment notifications for one stream.
pub trait SegmentBoundaryNotifier: Send + Sync {
    fn on_segment_event(&self, event: SegmentEvent) -> SegmentOutcome;
}

/// Point-in-time view of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStatus {
    pub stream_id: String,
    pub monitoring: bool,
    pub pids: BTreeSet<u16>,
    pub scheduler_state: SchedulerState,
    pub in_break: bool,
    pub events_detected: u64,
    pub last_event_at: Option<DateTime<Utc>>,
    pub next_interval_break: Option<Timecode>,
    pub breaks_completed: u64,
    pub stats: TrackerStats,
}

/// Everything the core keeps for one stream.
#[derive(Debug)]
pub struct StreamContext {
    tracker: StreamCueTracker,
    scheduler: Mutex<SegmentCueScheduler>,
    bounds: FixedBounds,
}

impl StreamContext {
    pub fn new(stream_id: &str, config: &CueConfig, totals: Arc<CueTotals>) -> Self {
        let tracker = StreamCueTracker::new(stream_id, &config.pids, config.recent_capacity)
            .with_debug(config.debug)
            .with_totals(totals);
        Self {
            tracker,
            scheduler: Mutex::new(SegmentCueScheduler::new(config.scheduler_config())),
            bounds: config.bounds(),
        }
    }

    pub fn tracker(&self) -> &StreamCueTracker {
        &self.tracker
    }

    /// Detects cues in `buf`, handing newly recorded ones to the scheduler.
    pub fn ingest(&self, buf: &[u8], timecode: Option<Timecode>) -> Vec<CueEvent> {
        self.tracker.ingest_with(buf, timecode, |event| {
            let mut scheduler = self.scheduler.lock();
            scheduler.on_cue_section(event);
            scheduler.on_cue_event(event);
        })
    }

    pub fn on_segment_start(&self, start: Timecode) {
        let latest = self.tracker.latest_cue_out().map(|e| e.raw_section().clone());
        self.scheduler.lock().on_segment_start(start, latest);
    }

    pub fn on_segment_end_candidate(&self, candidate: Timecode) -> Timecode {
        let mut scheduler = self.scheduler.lock();
        match scheduler.segment_start() {
            Some(chunk_start) => scheduler.on_segment_end_candidate(chunk_start, candidate, &self.bounds),
            None => candidate,
        }
    }

    pub fn on_segment_closed(&self, start: Timecode, end: Timecode) -> Vec<CueTag> {
        let tags = self.scheduler.lock().on_segment_closed(start, end);
        if !tags.is_empty() {
            debug!("{}: segment [{}, {}] tagged {:?}", self.tracker.stream_id(), start, end, tags);
        }
        tags
    }

    pub fn status(&self) -> StreamStatus {
        let (scheduler_state, next_interval_break, breaks_completed) = {
            let scheduler = self.scheduler.lock();
            (
                scheduler.state(),
                scheduler.next_interval_break(),
                scheduler.breaks_completed(),
            )
        };
        StreamStatus {
            stream_id: self.tracker.stream_id().to_string(),
            monitoring: self.tracker.is_monitoring(),
            pids: self.tracker.pids().clone(),
            scheduler_state,
            in_break: scheduler_state == SchedulerState::Active,
            events_detected: self.tracker.events_detected(),
            last_event_at: self.tracker.last_event_at(),
            next_interval_break,
            breaks_completed,
            stats: self.tracker.stats(),
        }
    }
}

impl SegmentBoundaryNotifier for StreamContext {
    fn on_segment_event(&self, event: SegmentEvent) -> SegmentOutcome {
        match event {
            SegmentEvent::Starting { start } => {
                self.on_segment_start(start);
                SegmentOutcome::Continue
            }
            SegmentEvent::EndCandidate { candidate } => {
                let stop = self.on_segment_end_candidate(candidate);
                if stop == candidate {
                    SegmentOutcome::Continue
                } else {
                    SegmentOutcome::StopAt(stop)
                }
            }
            SegmentEvent::Closed { start, end } => {
                let tags = self.on_segment_closed(start, end);
                if tags.is_empty() {
                    SegmentOutcome::Continue
                } else {
                    SegmentOutcome::Tags(tags)
                }
            }
        }
    }
}

/// Stream-id keyed table of [`StreamContext`]s.
///
/// The table lock only guards lookup, insertion and removal; each stream's
/// work runs under that stream's own locks.
#[derive(Debug, Default)]
pub struct CueRegistry {
    config: CueConfig,
    streams: RwLock<HashMap<String, Arc<StreamContext>>>,
    totals: Arc<CueTotals>,
}

impl CueRegistry {
    pub fn new(config: CueConfig) -> Self {
        Self {
            config,
            streams: RwLock::new(HashMap::new()),
            totals: Arc::new(CueTotals::default()),
        }
    }

    pub fn config(&self) -> &CueConfig {
        &self.config
    }

    /// Creates the stream's context if needed and starts monitoring it.
    pub fn start_stream(&self, stream_id: &str) -> Arc<StreamContext> {
        self.start_stream_with(stream_id, &self.config)
    }

    /// Like [`start_stream`](Self::start_stream) with per-stream settings.
    ///
    /// `config` only applies when the stream is created; an existing stream
    /// keeps its settings and is just resumed.
    pub fn start_stream_with(&self, stream_id: &str, config: &CueConfig) -> Arc<StreamContext> {
        let context = match self.streams.write().entry(stream_id.to_string()) {
            Entry::Occupied(entry) => {
                debug!("{}: already known, keeping its settings", stream_id);
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry
                .insert(Arc::new(StreamContext::new(stream_id, config, self.totals.clone())))
                .clone(),
        };
        context.tracker().start();
        context
    }

    /// Stops and forgets the stream. Returns whether it existed.
    pub fn stop_stream(&self, stream_id: &str) -> bool {
        let removed = self.streams.write().remove(stream_id);
        match removed {
            Some(context) => {
                context.tracker().stop();
                info!("removed stream {}", stream_id);
                true
            }
            None => false,
        }
    }

    pub fn stream(&self, stream_id: &str) -> Option<Arc<StreamContext>> {
        self.streams.read().get(stream_id).cloned()
    }

    pub fn stream_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.streams.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Events decoded from `buf`; empty for unknown streams.
    pub fn ingest(&self, stream_id: &str, buf: &[u8]) -> Vec<CueEvent> {
        self.ingest_at(stream_id, buf, None)
    }

    pub fn ingest_at(&self, stream_id: &str, buf: &[u8], timecode: Option<Timecode>) -> Vec<CueEvent> {
        match self.stream(stream_id) {
            Some(context) => context.ingest(buf, timecode),
            None => Vec::new(),
        }
    }

    /// Drains `source` into the stream until it is exhausted or the stream
    /// is removed. Returns every event decoded on the way.
    pub async fn ingest_from<S>(&self, stream_id: &str, source: &mut S) -> Result<Vec<CueEvent>>
    where
        S: PacketSource + ?Sized,
    {
        let mut events = Vec::new();
        while let Some(buf) = source.next_buffer().await? {
            let Some(context) = self.stream(stream_id) else {
                debug!("{}: stream gone, no longer reading", stream_id);
                break;
            };
            events.extend(context.ingest(&buf, None));
        }
        Ok(events)
    }

    pub fn on_segment_start(&self, stream_id: &str, start: Timecode) {
        if let Some(context) = self.stream(stream_id) {
            context.on_segment_start(start);
        }
    }

    /// The stop the packager must use; `candidate` for unknown streams.
    pub fn on_segment_end_candidate(&self, stream_id: &str, candidate: Timecode) -> Timecode {
        match self.stream(stream_id) {
            Some(context) => context.on_segment_end_candidate(candidate),
            None => candidate,
        }
    }

    /// Wire-format tags for the closed segment `[start, end]`.
    pub fn on_segment_closed(&self, stream_id: &str, start: Timecode, end: Timecode) -> Vec<String> {
        match self.stream(stream_id) {
            Some(context) => context
                .on_segment_closed(start, end)
                .iter()
                .map(ToString::to_string)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn status(&self, stream_id: &str) -> Option<StreamStatus> {
        self.stream(stream_id).map(|context| context.status())
    }

    pub fn statuses(&self) -> Vec<StreamStatus> {
        let contexts: Vec<Arc<StreamContext>> = self.streams.read().values().cloned().collect();
        let mut statuses: Vec<StreamStatus> = contexts.iter().map(|c| c.status()).collect();
        statuses.sort_by(|a, b| a.stream_id.cmp(&b.stream_id));
        statuses
    }

    pub fn totals(&self) -> &CueTotals {
        &self.totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::scheduler::CueTrigger;
    use crate::scte35::{packetize_section, CueKind, SpliceSectionBuilder};
    use pretty_assertions::assert_eq;

    fn cue_out(event_id: u32) -> Vec<u8> {
        let section = SpliceSectionBuilder::splice_insert(event_id)
            .out_of_network(true)
            .build();
        packetize_section(0x1F00, &section, 0)
    }

    fn registry(break_ms: u64) -> CueRegistry {
        CueRegistry::new(CueConfig {
            break_duration_ms: break_ms,
            ..Default::default()
        })
    }

    #[test]
    fn test_unknown_stream_is_a_no_op() {
        let registry = registry(10_000);
        assert!(registry.ingest("missing", &cue_out(1)).is_empty());
        assert_eq!(registry.on_segment_end_candidate("missing", 4_000), 4_000);
        assert!(registry.on_segment_closed("missing", 0, 4_000).is_empty());
        assert!(registry.status("missing").is_none());
        assert!(!registry.stop_stream("missing"));
    }

    #[test]
    fn test_cue_out_drives_tags() {
        let registry = registry(8_000);
        registry.start_stream("live");

        registry.on_segment_start("live", 0);
        assert_eq!(registry.ingest_at("live", &cue_out(42), Some(1_000)).len(), 1);
        assert_eq!(registry.on_segment_end_candidate("live", 4_000), 1_000);
        assert!(registry.on_segment_closed("live", 0, 1_000).is_empty());

        registry.on_segment_start("live", 1_000);
        assert_eq!(registry.on_segment_end_candidate("live", 5_000), 5_000);
        let tags = registry.on_segment_closed("live", 1_000, 5_000);
        assert_eq!(tags.len(), 2);
        assert!(tags[0].starts_with("EXT-X-SCTE35:CUE=\"/DA"));
        assert_eq!(tags[1], "EXT-X-CUE-OUT:8.000");

        let status = registry.status("live").unwrap();
        assert!(status.in_break);
        assert_eq!(status.events_detected, 1);

        registry.on_segment_start("live", 5_000);
        assert_eq!(registry.on_segment_end_candidate("live", 9_000), 9_000);
        assert_eq!(registry.on_segment_closed("live", 5_000, 9_000), vec!["EXT-X-CUE-IN"]);
        assert_eq!(registry.status("live").unwrap().breaks_completed, 1);
    }

    #[test]
    fn test_notifier_outcomes() {
        let registry = registry(10_000);
        let context = registry.start_stream("live");

        assert_eq!(
            context.on_segment_event(SegmentEvent::Starting { start: 478_000 }),
            SegmentOutcome::Continue
        );
        let event = context.ingest(&cue_out(1), Some(480_000)).remove(0);
        assert_eq!(
            context.on_segment_event(SegmentEvent::EndCandidate { candidate: 481_500 }),
            SegmentOutcome::StopAt(480_000)
        );
        assert_eq!(
            context.on_segment_event(SegmentEvent::Closed { start: 478_000, end: 480_000 }),
            SegmentOutcome::Continue
        );
        context.on_segment_event(SegmentEvent::Starting { start: 480_000 });
        assert_eq!(
            context.on_segment_event(SegmentEvent::Closed { start: 480_000, end: 484_000 }),
            SegmentOutcome::Tags(vec![
                CueTag::Scte35 {
                    payload: event.raw_section().clone()
                },
                CueTag::CueOut { duration_ms: 10_000 },
            ])
        );
    }

    #[test]
    fn test_stop_stream_tears_down() {
        let registry = registry(10_000);
        let context = registry.start_stream("live");
        assert!(registry.stop_stream("live"));

        // a caller still holding the context records nothing
        assert!(context.ingest(&cue_out(3), None).is_empty());
        assert!(registry.ingest("live", &cue_out(3)).is_empty());
        assert!(registry.stream_ids().is_empty());
        assert_eq!(registry.totals().events_detected(), 0);
    }

    #[test]
    fn test_interval_status() {
        let registry = CueRegistry::new(CueConfig {
            trigger: CueTrigger::Interval { interval_ms: 60_000 },
            ..Default::default()
        });
        registry.start_stream("b");
        registry.start_stream("a");
        registry.on_segment_start("a", 10_000);

        let statuses = registry.statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].stream_id, "a");
        assert_eq!(statuses[0].next_interval_break, Some(70_000));
        assert_eq!(statuses[1].next_interval_break, None);
        assert!(statuses.iter().all(|s| s.monitoring && !s.in_break));
    }

    #[test]
    fn test_restart_reuses_context() {
        let registry = registry(10_000);
        let first = registry.start_stream("live");
        let second = registry.start_stream_with(
            "live",
            &CueConfig {
                break_duration_ms: 1_000,
                ..Default::default()
            },
        );
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.scheduler.lock().config().break_duration_ms, 10_000);
    }

    #[test]
    fn test_out_of_range_config_keeps_running() {
        let mut config = CueConfig::default();
        config.merge_str("guard = 18446744073709551615\nad_interval = 1\nad_duration = 18446744073709551615");
        let registry = CueRegistry::new(config);
        registry.start_stream("live");

        registry.on_segment_start("live", 0);
        assert!(registry.on_segment_closed("live", 0, 4_000).is_empty());
        registry.on_segment_start("live", 4_000);
        assert_eq!(registry.on_segment_end_candidate("live", 8_000), 8_000);
        assert_eq!(
            registry.on_segment_closed("live", 4_000, 8_000),
            vec!["EXT-X-CUE-OUT:30.000", "EXT-X-CUE-IN"]
        );
    }

    #[test]
    fn test_time_signal_reaches_playlist() {
        let registry = registry(10_000);
        registry.start_stream("live");
        let signal = SpliceSectionBuilder::time_signal(Some(0x423A35BD)).build();

        registry.on_segment_start("live", 0);
        let events = registry.ingest_at("live", &packetize_section(0x1F00, &signal, 0), Some(2_000));
        assert_eq!(events.len(), 1);
        assert_eq!(registry.status("live").unwrap().scheduler_state, SchedulerState::Idle);

        assert_eq!(registry.on_segment_end_candidate("live", 4_000), 4_000);
        assert_eq!(
            registry.on_segment_closed("live", 0, 4_000),
            vec![CueTag::Scte35 { payload: signal }.to_string()]
        );
    }

    #[test]
    fn test_interval_break_carries_latest_cue_out_only() {
        let registry = CueRegistry::new(CueConfig {
            trigger: CueTrigger::Interval { interval_ms: 4_000 },
            break_duration_ms: 8_000,
            ..Default::default()
        });
        let context = registry.start_stream("live");
        let insert = SpliceSectionBuilder::splice_insert(5).out_of_network(true).build();
        let signal = SpliceSectionBuilder::time_signal(None).build();

        context.ingest(&packetize_section(0x1F00, &insert, 0), None);
        context.ingest(&packetize_section(0x1F00, &signal, 1), None);
        assert_eq!(context.tracker().latest_event().unwrap().kind(), CueKind::TimeSignal);

        context.on_segment_start(0);
        context.on_segment_closed(0, 4_000);
        context.on_segment_start(4_000);
        assert_eq!(context.scheduler.lock().scheduled().unwrap().payload(), Some(&insert));
    }
}
