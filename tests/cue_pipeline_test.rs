#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use cuemark::config::CueConfig;
    use cuemark::cue::{CueRegistry, SchedulerState, Timecode};
    use cuemark::format::ts::{pid_to_bytes, CuePlaylist, TS_PACKET_SIZE, TS_SYNC_BYTE};
    use cuemark::format::ReaderPacketSource;
    use cuemark::scte35::{packetize_section, CueKind, SpliceSectionBuilder};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const STREAM: &str = "live/channel1";
    const VIDEO_PID: u16 = 0x100;

    fn filler_packet(pid: u16, cc: u8) -> Vec<u8> {
        let mut packet = vec![0xFF; TS_PACKET_SIZE];
        let [hi, lo] = pid_to_bytes(pid);
        packet[0] = TS_SYNC_BYTE;
        packet[1] = hi;
        packet[2] = lo;
        packet[3] = 0x10 | (cc & 0x0F);
        packet
    }

    /// A few video packets around one splice_insert on 0x1F00.
    fn synthetic_stream(event_id: u32) -> Vec<u8> {
        let section = SpliceSectionBuilder::splice_insert(event_id)
            .out_of_network(true)
            .break_duration(Duration::from_secs(30))
            .auto_return(true)
            .build();

        let mut stream = Vec::new();
        for cc in 0..4 {
            stream.extend(filler_packet(VIDEO_PID, cc));
        }
        stream.extend(packetize_section(0x1F00, &section, 0));
        for cc in 4..8 {
            stream.extend(filler_packet(VIDEO_PID, cc));
        }
        stream
    }

    fn registry() -> CueRegistry {
        CueRegistry::new(CueConfig {
            pids: "0x1F00".to_string(),
            break_duration_ms: 30_000,
            ..Default::default()
        })
    }

    /// Runs segments of `len` ms from `from` until `until`, returning
    /// `(start, end, tags)` for every closed segment.
    fn run_segments(
        registry: &CueRegistry,
        from: Timecode,
        until: Timecode,
        len: Timecode,
    ) -> Vec<(Timecode, Timecode, Vec<String>)> {
        let mut closed = Vec::new();
        let mut start = from;
        while start < until {
            registry.on_segment_start(STREAM, start);
            let stop = registry.on_segment_end_candidate(STREAM, start + len);
            assert!(stop > start, "segment [{}, {}] is empty", start, stop);
            closed.push((start, stop, registry.on_segment_closed(STREAM, start, stop)));
            start = stop;
        }
        closed
    }

    #[tokio::test]
    async fn test_splice_insert_end_to_end() {
        let registry = registry();
        registry.start_stream(STREAM);

        // 12 s of content before the cue arrives
        let before = run_segments(&registry, 0, 12_000, 6_000);
        assert!(before.iter().all(|(_, _, tags)| tags.is_empty()));

        let data = synthetic_stream(42);
        let mut source = ReaderPacketSource::new(&data[..]);
        let events = registry.ingest_from(STREAM, &mut source).await.unwrap();

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.kind(), CueKind::SpliceInsert);
        assert_eq!(event.event_id(), Some(42));
        assert!(event.out_of_network());
        assert!(event.has_duration());
        assert_eq!(event.pid(), 0x1F00);
        assert_eq!(registry.status(STREAM).unwrap().scheduler_state, SchedulerState::Pending);

        let closed = run_segments(&registry, 12_000, 80_000, 6_000);
        let all_tags: Vec<&str> = closed
            .iter()
            .flat_map(|(_, _, tags)| tags.iter().map(String::as_str))
            .collect();

        let cue_outs: Vec<&str> = all_tags
            .iter()
            .copied()
            .filter(|t| t.starts_with("EXT-X-CUE-OUT:"))
            .collect();
        assert_eq!(cue_outs, vec!["EXT-X-CUE-OUT:30.000"]);
        assert_eq!(all_tags.iter().filter(|t| **t == "EXT-X-CUE-IN").count(), 1);

        let payload = event.payload_base64();
        let conts: Vec<&str> = all_tags
            .iter()
            .copied()
            .filter(|t| t.starts_with("EXT-X-CUE-OUT-CONT:"))
            .collect();
        let expected: Vec<String> = [(6, 24), (12, 18), (18, 12)]
            .iter()
            .map(|(elapsed, remaining)| {
                format!(
                    "EXT-X-CUE-OUT-CONT:ElapsedTime={}.000,Duration={}.000,SCTE35={}",
                    elapsed, remaining, payload
                )
            })
            .collect();
        assert_eq!(conts, expected);

        // the break opens at 12 s and closes exactly 30 s later
        let out_segment = closed.iter().find(|(_, _, t)| t.iter().any(|t| t.starts_with("EXT-X-CUE-OUT:")));
        let in_segment = closed.iter().find(|(_, _, t)| t.iter().any(|t| t == "EXT-X-CUE-IN"));
        assert_eq!(out_segment.map(|s| s.0), Some(12_000));
        assert_eq!(
            out_segment.map(|s| s.2.clone()),
            Some(vec![
                format!("EXT-X-SCTE35:CUE=\"{}\"", payload),
                "EXT-X-CUE-OUT:30.000".to_string(),
            ])
        );
        assert_eq!(in_segment.map(|s| s.1), Some(42_000));

        let status = registry.status(STREAM).unwrap();
        assert_eq!(status.scheduler_state, SchedulerState::Idle);
        assert_eq!(status.events_detected, 1);
        assert_eq!(status.breaks_completed, 1);
        assert!(status.last_event_at.is_some());
    }

    #[tokio::test]
    async fn test_playlist_output() {
        let registry = registry();
        registry.start_stream(STREAM);
        registry.on_segment_start(STREAM, 0);
        registry.ingest(STREAM, &synthetic_stream(7));

        let mut playlist = CuePlaylist::new(Duration::from_secs(6)).with_max_segments(0);
        let mut start = 0;
        let mut n = 0;
        while start < 48_000 {
            if n > 0 {
                registry.on_segment_start(STREAM, start);
            }
            let stop = registry.on_segment_end_candidate(STREAM, start + 6_000);
            let tags = registry.on_segment_closed(STREAM, start, stop);
            playlist.push_segment(
                format!("segment{}.ts", n),
                Duration::from_millis((stop - start) as u64),
                tags,
            );
            start = stop;
            n += 1;
        }

        let m3u8 = playlist.render().await.unwrap();
        assert!(m3u8.starts_with("#EXTM3U\n"));
        assert!(m3u8.contains("#EXT-X-CUE-OUT:30.000\n#EXTINF:6.000,\nsegment0.ts\n"));
        assert!(m3u8.contains("#EXT-X-CUE-OUT-CONT:ElapsedTime=6.000,Duration=24.000,SCTE35="));
        assert!(m3u8.contains("#EXT-X-CUE-OUT-CONT:ElapsedTime=18.000,Duration=12.000,SCTE35="));
        assert_eq!(m3u8.matches("#EXT-X-SCTE35:CUE=").count(), 1);
        assert!(m3u8.contains("#EXT-X-CUE-IN\n#EXTINF:6.000,\nsegment4.ts\n"));
        assert_eq!(m3u8.matches("#EXT-X-CUE-OUT-CONT").count(), 3);
    }

    #[tokio::test]
    async fn test_channel_fed_stream() {
        let registry = registry();
        registry.start_stream(STREAM);

        let (tx, mut rx) = mpsc::channel::<Bytes>(8);
        let feeder = tokio::spawn(async move {
            for id in [1u32, 2, 2, 3] {
                tx.send(Bytes::from(synthetic_stream(id))).await.unwrap();
            }
        });

        let events = registry.ingest_from(STREAM, &mut rx).await.unwrap();
        feeder.await.unwrap();

        let ids: Vec<_> = events.iter().map(|e| e.event_id()).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(2), Some(3)]);
        let status = registry.status(STREAM).unwrap();
        assert_eq!(status.events_detected, 3);
        assert_eq!(status.stats.duplicates, 1);
        assert_eq!(registry.totals().duplicates(), 1);
    }

    #[test]
    fn test_streams_are_independent_across_threads() {
        let registry = Arc::new(registry());
        let streams: Vec<String> = (0..8).map(|i| format!("stream{}", i)).collect();
        for id in &streams {
            registry.start_stream(id);
        }

        let handles: Vec<_> = streams
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, id)| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for n in 0..20u32 {
                        registry.ingest(&id, &synthetic_stream(i as u32 * 100 + n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for status in registry.statuses() {
            assert_eq!(status.events_detected, 20);
        }
        assert_eq!(registry.totals().events_detected(), 160);
    }

    #[test]
    fn test_nothing_recorded_after_stop() {
        let registry = Arc::new(registry());
        let context = registry.start_stream(STREAM);

        let writer = {
            let context = context.clone();
            thread::spawn(move || {
                for n in 0..500u32 {
                    context.ingest(&synthetic_stream(n), None);
                }
            })
        };

        thread::sleep(Duration::from_millis(1));
        assert!(registry.stop_stream(STREAM));
        let recorded_at_stop = context.tracker().events_detected();
        let recent_at_stop = context.tracker().recent_events();

        writer.join().unwrap();
        assert_eq!(context.tracker().events_detected(), recorded_at_stop);
        assert_eq!(context.tracker().recent_events(), recent_at_stop);
        assert!(registry.status(STREAM).is_none());
    }

    #[test]
    fn test_other_pids_and_garbage_produce_nothing() {
        let registry = CueRegistry::new(CueConfig {
            pids: "0x1F01".to_string(),
            ..Default::default()
        });
        registry.start_stream(STREAM);

        assert!(registry.ingest(STREAM, &synthetic_stream(42)).is_empty());

        let mut garbage = vec![0x47u8; TS_PACKET_SIZE * 3 + 17];
        garbage[TS_PACKET_SIZE] = 0x00;
        assert!(registry.ingest(STREAM, &garbage).is_empty());
        assert_eq!(registry.status(STREAM).unwrap().events_detected, 0);
    }
}
