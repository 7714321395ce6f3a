use super::pids::resolve_pids;
use super::ring::CueRing;
use crate::format::ts::demux;
use crate::scte35::{parse_splice_section, CueEvent, CueKind, TABLE_ID_SCTE35};
use chrono::{DateTime, Utc};
use log::{info, log, Level};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub const DEFAULT_RECENT_CAPACITY: usize = 50;

/// Process-wide counters, shared by every tracker created from the same registry.
#[derive(Debug, Default)]
pub struct CueTotals {
    events_detected: AtomicU64,
    duplicates: AtomicU64,
    rejected_sections: AtomicU64,
}

impl CueTotals {
    pub fn events_detected(&self) -> u64 {
        self.events_detected.load(Ordering::Relaxed)
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    pub fn rejected_sections(&self) -> u64 {
        self.rejected_sections.load(Ordering::Relaxed)
    }
}

/// Read-only copy of a tracker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub packets_matched: u64,
    pub events_detected: u64,
    pub duplicates: u64,
    pub rejected_sections: u64,
    pub sync_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    packets_matched: AtomicU64,
    events_detected: AtomicU64,
    duplicates: AtomicU64,
    rejected_sections: AtomicU64,
    sync_errors: AtomicU64,
}

#[derive(Debug)]
struct Recent {
    ring: CueRing<CueEvent>,
    last_event_at: Option<DateTime<Utc>>,
}

/// Per-stream cue detection: filters packets by PID, decodes sections and
/// keeps the most recent events.
#[derive(Debug)]
pub struct StreamCueTracker {
    stream_id: Arc<str>,
    pids: BTreeSet<u16>,
    debug: bool,
    monitoring: AtomicBool,
    recent: Mutex<Recent>,
    counters: Counters,
    totals: Arc<CueTotals>,
}

impl StreamCueTracker {
    /// Creates an inactive tracker. `pids` is a comma-separated PID list.
    pub fn new(stream_id: impl Into<Arc<str>>, pids: &str, recent_capacity: usize) -> Self {
        Self::with_pid_set(stream_id, resolve_pids(pids), recent_capacity)
    }

    pub fn with_pid_set(
        stream_id: impl Into<Arc<str>>,
        pids: BTreeSet<u16>,
        recent_capacity: usize,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            pids,
            debug: false,
            monitoring: AtomicBool::new(false),
            recent: Mutex::new(Recent {
                ring: CueRing::with_capacity(recent_capacity),
                last_event_at: None,
            }),
            counters: Counters::default(),
            totals: Arc::new(CueTotals::default()),
        }
    }

    /// Promotes per-packet diagnostics from `trace` to `info`.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_totals(mut self, totals: Arc<CueTotals>) -> Self {
        self.totals = totals;
        self
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn pids(&self) -> &BTreeSet<u16> {
        &self.pids
    }

    pub fn start(&self) {
        if !self.monitoring.swap(true, Ordering::SeqCst) {
            info!("started SCTE-35 monitoring for {} on pids {:04x?}", self.stream_id, self.pids);
        }
    }

    /// Stops recording. Once this returns no further event is recorded,
    /// including by ingest calls already running on other threads.
    pub fn stop(&self) {
        let was_monitoring = self.monitoring.swap(false, Ordering::SeqCst);
        // wait out any ingest that passed the monitoring check before the swap
        drop(self.recent.lock());
        if was_monitoring {
            info!(
                "stopped SCTE-35 monitoring for {} after {} events",
                self.stream_id,
                self.counters.events_detected.load(Ordering::Relaxed)
            );
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    /// Decodes every cue section in `buf` on this stream's PIDs.
    pub fn ingest(&self, buf: &[u8]) -> Vec<CueEvent> {
        self.ingest_at(buf, None)
    }

    /// Like [`ingest`](Self::ingest), stamping events with the host timeline
    /// position of the buffer.
    pub fn ingest_at(&self, buf: &[u8], timecode: Option<i64>) -> Vec<CueEvent> {
        self.ingest_with(buf, timecode, |_| {})
    }

    /// Runs the demux and parse pipeline over `buf` and records the results.
    ///
    /// Returns every event decoded while monitoring, duplicates included.
    /// `on_recorded` is called, after the recent-event lock is released, for
    /// each event that was new to the ring.
    pub fn ingest_with<F>(&self, buf: &[u8], timecode: Option<i64>, mut on_recorded: F) -> Vec<CueEvent>
    where
        F: FnMut(&CueEvent),
    {
        let decoded = self.decode(buf, timecode);
        if decoded.is_empty() {
            return decoded;
        }

        let mut events = Vec::with_capacity(decoded.len());
        let mut recorded = Vec::new();
        {
            let mut recent = self.recent.lock();
            if !self.is_monitoring() {
                self.diag(format_args!(
                    "{}: dropping {} events, not monitoring",
                    self.stream_id,
                    decoded.len()
                ));
                return Vec::new();
            }

            for event in decoded {
                let duplicate = recent
                    .ring
                    .iter()
                    .any(|seen| seen.raw_section() == event.raw_section());
                if duplicate {
                    self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
                    self.totals.duplicates.fetch_add(1, Ordering::Relaxed);
                    self.diag(format_args!("{}: repeated section for {}", self.stream_id, event));
                } else {
                    self.counters.events_detected.fetch_add(1, Ordering::Relaxed);
                    self.totals.events_detected.fetch_add(1, Ordering::Relaxed);
                    recent.last_event_at = Some(event.detected_at());
                    recent.ring.push(event.clone());
                    recorded.push(event.clone());
                    info!("SCTE-35 {}", event);
                }
                events.push(event);
            }
        }

        for event in &recorded {
            on_recorded(event);
        }
        events
    }

    fn decode(&self, buf: &[u8], timecode: Option<i64>) -> Vec<CueEvent> {
        let mut events = Vec::new();
        let mut packets = demux(buf, 0);

        for packet in packets.by_ref() {
            if !self.pids.contains(&packet.pid()) {
                continue;
            }
            self.counters.packets_matched.fetch_add(1, Ordering::Relaxed);

            let mut payload = packet.payload();
            if packet.payload_unit_start() {
                if let Some(&pointer) = payload.first() {
                    if pointer != TABLE_ID_SCTE35 {
                        payload = payload.get(1 + pointer as usize..).unwrap_or(&[]);
                    }
                }
            }
            self.diag(format_args!(
                "{}: {} payload bytes on pid 0x{:04x}",
                self.stream_id,
                payload.len(),
                packet.pid()
            ));

            match parse_splice_section(payload) {
                Ok(section) => {
                    let event =
                        CueEvent::from_section(&section, self.stream_id.clone(), packet.pid(), timecode);
                    if let CueKind::Unknown(code) = event.kind() {
                        info!(
                            "{}: unhandled splice command 0x{:02x} on pid 0x{:04x}",
                            self.stream_id,
                            code,
                            packet.pid()
                        );
                    }
                    events.push(event);
                }
                Err(e) => {
                    self.counters.rejected_sections.fetch_add(1, Ordering::Relaxed);
                    self.totals.rejected_sections.fetch_add(1, Ordering::Relaxed);
                    self.diag(format_args!("{}: no section on pid 0x{:04x}: {}", self.stream_id, packet.pid(), e));
                }
            }
        }

        let sync_errors = packets.sync_errors() as u64;
        if sync_errors > 0 {
            self.counters.sync_errors.fetch_add(sync_errors, Ordering::Relaxed);
        }
        events
    }

    fn diag(&self, args: fmt::Arguments<'_>) {
        let level = if self.debug { Level::Info } else { Level::Trace };
        log!(level, "{}", args);
    }

    /// Most recent last.
    pub fn recent_events(&self) -> Vec<CueEvent> {
        self.recent.lock().ring.snapshot()
    }

    pub fn latest_event(&self) -> Option<CueEvent> {
        self.recent.lock().ring.latest().cloned()
    }

    /// Most recent uncancelled splice_insert with out_of_network set.
    pub fn latest_cue_out(&self) -> Option<CueEvent> {
        self.recent.lock().ring.iter().rev().find(|e| e.is_cue_out()).cloned()
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.recent.lock().last_event_at
    }

    pub fn events_detected(&self) -> u64 {
        self.counters.events_detected.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            packets_matched: self.counters.packets_matched.load(Ordering::Relaxed),
            events_detected: self.counters.events_detected.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            rejected_sections: self.counters.rejected_sections.load(Ordering::Relaxed),
            sync_errors: self.counters.sync_errors.load(Ordering::Relaxed),
        }
    }

    pub fn totals(&self) -> &Arc<CueTotals> {
        &self.totals
    }
}
