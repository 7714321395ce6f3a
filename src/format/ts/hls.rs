use crate::error::Result;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

const DEFAULT_TARGET_DURATION: Duration = Duration::from_secs(6);
const DEFAULT_PLAYLIST_SIZE: usize = 5;

/// A closed media segment and the cue tags it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueSegment {
    pub uri: String,
    pub duration: Duration,
    pub sequence_number: u64,
    /// Tag bodies without the leading `#`, e.g. `EXT-X-CUE-IN`.
    pub tags: Vec<String>,
}

/// Sliding-window media playlist with cue tags written ahead of each
/// segment's `#EXTINF`.
#[derive(Debug)]
pub struct CuePlaylist {
    pub version: u8,
    pub target_duration: Duration,
    pub media_sequence: u64,
    pub segments: VecDeque<CueSegment>,
    pub max_segments: usize,
    pub is_endlist: bool,
    next_sequence: u64,
}

impl Default for CuePlaylist {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_DURATION)
    }
}

impl CuePlaylist {
    pub fn new(target_duration: Duration) -> Self {
        Self {
            version: 3,
            target_duration,
            media_sequence: 0,
            segments: VecDeque::new(),
            max_segments: DEFAULT_PLAYLIST_SIZE,
            is_endlist: false,
            next_sequence: 0,
        }
    }

    /// Zero keeps every segment.
    pub fn with_max_segments(mut self, count: usize) -> Self {
        self.max_segments = count;
        self
    }

    /// Appends a closed segment, dropping the oldest ones past the window.
    pub fn push_segment<I, S>(&mut self, uri: impl Into<String>, duration: Duration, tags: I) -> &CueSegment
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.segments.push_back(CueSegment {
            uri: uri.into(),
            duration,
            sequence_number: self.next_sequence,
            tags: tags.into_iter().map(|t| t.to_string()).collect(),
        });
        self.next_sequence += 1;

        while self.max_segments > 0 && self.segments.len() > self.max_segments {
            self.segments.pop_front();
            self.media_sequence += 1;
        }
        &self.segments[self.segments.len() - 1]
    }

    pub fn finish(&mut self) {
        self.is_endlist = true;
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(b"#EXTM3U\n").await?;
        writer
            .write_all(format!("#EXT-X-VERSION:{}\n", self.version).as_bytes())
            .await?;

        // ceiling of the longest segment
        let max_duration = self
            .segments
            .iter()
            .map(|s| s.duration)
            .max()
            .unwrap_or(self.target_duration);
        writer
            .write_all(
                format!(
                    "#EXT-X-TARGETDURATION:{}\n",
                    max_duration.as_secs_f64().ceil() as u64
                )
                .as_bytes(),
            )
            .await?;
        writer
            .write_all(format!("#EXT-X-MEDIA-SEQUENCE:{}\n", self.media_sequence).as_bytes())
            .await?;

        for segment in &self.segments {
            for tag in &segment.tags {
                writer.write_all(format!("#{}\n", tag).as_bytes()).await?;
            }
            writer
                .write_all(format!("#EXTINF:{:.3},\n", segment.duration.as_secs_f64()).as_bytes())
                .await?;
            writer.write_all(segment.uri.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }

        if self.is_endlist {
            writer.write_all(b"#EXT-X-ENDLIST\n").await?;
        }

        writer.flush().await?;
        Ok(())
    }

    /// Renders the playlist into a string.
    pub async fn render(&self) -> Result<String> {
        let mut out = Vec::new();
        self.write_to(&mut out).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}
