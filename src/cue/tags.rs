use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use std::fmt;

/// A playlist cue annotation, rendered without the leading `#`.
///
/// ```
/// use cuemark::cue::CueTag;
///
/// assert_eq!(CueTag::CueOut { duration_ms: 30_000 }.to_string(), "EXT-X-CUE-OUT:30.000");
/// assert_eq!(CueTag::CueIn.to_string(), "EXT-X-CUE-IN");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CueTag {
    /// `EXT-X-CUE-OUT:<seconds>.<millis>`, total planned break duration
    CueOut { duration_ms: u64 },
    /// `EXT-X-CUE-OUT-CONT:ElapsedTime=<s>,Duration=<s>,SCTE35=<base64>`,
    /// where `Duration` is the time left in the break
    CueOutCont {
        elapsed_ms: u64,
        remaining_ms: u64,
        payload: Option<Bytes>,
    },
    /// `EXT-X-CUE-IN`
    CueIn,
    /// `EXT-X-SCTE35:CUE="<base64>"`, a detected section passed through as is
    Scte35 { payload: Bytes },
}

/// `<seconds>.<millis>`
pub fn format_seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

impl CueTag {
    pub fn name(&self) -> &'static str {
        match self {
            CueTag::CueOut { .. } => "EXT-X-CUE-OUT",
            CueTag::CueOutCont { .. } => "EXT-X-CUE-OUT-CONT",
            CueTag::CueIn => "EXT-X-CUE-IN",
            CueTag::Scte35 { .. } => "EXT-X-SCTE35",
        }
    }

    /// Time left in the break when this tag was emitted.
    pub fn remaining_ms(&self) -> Option<u64> {
        match self {
            CueTag::CueOut { duration_ms } => Some(*duration_ms),
            CueTag::CueOutCont { remaining_ms, .. } => Some(*remaining_ms),
            CueTag::CueIn | CueTag::Scte35 { .. } => None,
        }
    }
}

impl fmt::Display for CueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CueTag::CueOut { duration_ms } => {
                write!(f, "{}:{}", self.name(), format_seconds(*duration_ms))
            }
            CueTag::CueOutCont {
                elapsed_ms,
                remaining_ms,
                payload,
            } => {
                write!(
                    f,
                    "{}:ElapsedTime={},Duration={}",
                    self.name(),
                    format_seconds(*elapsed_ms),
                    format_seconds(*remaining_ms)
                )?;
                if let Some(payload) = payload {
                    write!(f, ",SCTE35={}", STANDARD.encode(payload))?;
                }
                Ok(())
            }
            CueTag::CueIn => f.write_str(self.name()),
            CueTag::Scte35 { payload } => {
                write!(f, "{}:CUE=\"{}\"", self.name(), STANDARD.encode(payload))
            }
        }
    }
}
