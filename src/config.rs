use crate::cue::scheduler::{to_timecode, CueTrigger, FixedBounds, SchedulerConfig};
use crate::cue::tracker::DEFAULT_RECENT_CAPACITY;
use crate::error::Result;
use log::warn;
use std::env;
use std::path::Path;

const ENV_PREFIX: &str = "CUEMARK_";

/// Settings for cue detection and break scheduling.
///
/// Built from defaults, then a `key = value` file, then `CUEMARK_*`
/// environment variables, later sources overriding earlier ones. Values that
/// do not parse are ignored with a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueConfig {
    /// Comma-separated SCTE-35 PIDs, decimal or `0x` hex.
    pub pids: String,
    pub debug: bool,
    pub recent_capacity: usize,
    pub trigger: CueTrigger,
    pub break_duration_ms: u64,
    pub min_chunk_duration_ms: u64,
    pub chunk_duration_target_ms: u64,
    pub guard_ms: u64,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            pids: String::from("0x1F00"),
            debug: false,
            recent_capacity: DEFAULT_RECENT_CAPACITY,
            trigger: CueTrigger::OnCueEvent,
            break_duration_ms: 30_000,
            min_chunk_duration_ms: 2_000,
            chunk_duration_target_ms: 6_000,
            guard_ms: 1_000,
        }
    }
}

impl CueConfig {
    /// Defaults overridden by the file at `path`.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::default();
        config.merge_file(path)?;
        Ok(config)
    }

    /// Defaults, then `path` if it can be read, then the environment.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = Self::default();
        if let Some(path) = path {
            if let Err(e) = config.merge_file(&path) {
                warn!("skipping config file {}: {}", path.as_ref().display(), e);
            }
        }
        config.apply_env();
        config
    }

    pub fn merge_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.merge_str(&content);
        Ok(())
    }

    /// Applies `key = value` lines. `#` starts a comment; values may be quoted.
    pub fn merge_str(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!("ignoring config line without '=': {:?}", line);
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            self.set(key.trim(), value);
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_vars(env::vars());
    }

    /// Applies `CUEMARK_<KEY>` pairs; other names are skipped.
    pub fn apply_vars<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                self.set(&key.to_ascii_lowercase(), value.trim());
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        match key {
            "scte35_pids" => self.pids = value.to_string(),
            "scte35_debug" => match parse_bool(value) {
                Some(debug) => self.debug = debug,
                None => warn!("scte35_debug: expected a boolean, got {:?}", value),
            },
            "recent_capacity" => {
                if let Some(n) = parse_number(key, value) {
                    self.recent_capacity = usize::try_from(n).unwrap_or(usize::MAX).max(1);
                }
            }
            "ad_interval" => {
                if let Some(interval_ms) = parse_seconds(key, value) {
                    self.trigger = if interval_ms == 0 {
                        CueTrigger::OnCueEvent
                    } else {
                        CueTrigger::Interval { interval_ms }
                    };
                }
            }
            "ad_duration" => {
                if let Some(ms) = parse_seconds(key, value) {
                    self.break_duration_ms = ms;
                }
            }
            "min_chunk_duration" => {
                if let Some(ms) = parse_number(key, value) {
                    self.min_chunk_duration_ms = ms;
                }
            }
            "chunk_duration_target" => {
                if let Some(ms) = parse_number(key, value) {
                    self.chunk_duration_target_ms = ms;
                }
            }
            "guard" => {
                if let Some(ms) = parse_number(key, value) {
                    self.guard_ms = ms;
                }
            }
            _ => {}
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            trigger: self.trigger,
            break_duration_ms: self.break_duration_ms,
            guard_ms: self.guard_ms,
        }
    }

    pub fn bounds(&self) -> FixedBounds {
        FixedBounds {
            min_chunk_duration: to_timecode(self.min_chunk_duration_ms),
            chunk_duration_target: to_timecode(self.chunk_duration_target_ms),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_number(key: &str, value: &str) -> Option<u64> {
    match value.parse::<u64>() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("{}: {:?} is not a number: {}", key, value, e);
            None
        }
    }
}

/// Seconds to milliseconds; values past `u64::MAX` ms are rejected.
fn parse_seconds(key: &str, value: &str) -> Option<u64> {
    let secs = parse_number(key, value)?;
    let ms = secs.checked_mul(1000);
    if ms.is_none() {
        warn!("{}: {} seconds is out of range", key, secs);
    }
    ms
}

/// Writes a commented template to `path` unless a file is already there.
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# cuemark configuration

# SCTE-35 PIDs, comma separated
scte35_pids = "0x1F00"
scte35_debug = false
recent_capacity = 50

# seconds between breaks; 0 opens breaks on splice_insert cue-outs only
ad_interval = 0
ad_duration = 30

# packager segment bounds, milliseconds
min_chunk_duration = 2000
chunk_duration_target = 6000
"#;
        std::fs::write(path, template)?;
    }
    Ok(())
}
