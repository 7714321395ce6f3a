use crate::error::{CueError, Result};
use crate::format::ts::{DEFAULT_CUE_PID, MAX_PID};
use log::warn;
use std::collections::BTreeSet;

/// Parses one PID token: decimal, or hexadecimal with a `0x`/`0X` prefix.
pub fn parse_pid(token: &str) -> Result<u16> {
    let token = token.trim();
    let value = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16)?,
        None => token.parse::<u32>()?,
    };
    if value > MAX_PID as u32 {
        return Err(CueError::Config(format!(
            "PID {} outside 0..=0x1FFF",
            token
        )));
    }
    Ok(value as u16)
}

/// Resolves a comma-separated PID list.
///
/// Bad tokens are dropped with a warning. An empty result falls back to
/// `{0x1F00}`.
///
/// ```
/// use cuemark::cue::resolve_pids;
///
/// assert_eq!(resolve_pids("0x1F00,0x1F01").into_iter().collect::<Vec<_>>(), vec![0x1F00, 0x1F01]);
/// assert_eq!(resolve_pids("garbage").into_iter().collect::<Vec<_>>(), vec![0x1F00]);
/// ```
pub fn resolve_pids(list: &str) -> BTreeSet<u16> {
    let mut pids = BTreeSet::new();
    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match parse_pid(token) {
            Ok(pid) => {
                pids.insert(pid);
            }
            Err(e) => warn!("ignoring SCTE-35 PID token {:?}: {}", token, e),
        }
    }

    if pids.is_empty() {
        pids.insert(DEFAULT_CUE_PID);
    }
    pids
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(pids: &[u16]) -> BTreeSet<u16> {
        pids.iter().copied().collect()
    }

    #[test]
    fn test_hex_and_decimal() {
        assert_eq!(resolve_pids("0x1F00,0x1F01"), set(&[0x1F00, 0x1F01]));
        assert_eq!(resolve_pids("500, 0X1f02"), set(&[500, 0x1F02]));
    }

    #[test]
    fn test_fallback_to_default() {
        assert_eq!(resolve_pids(""), set(&[DEFAULT_CUE_PID]));
        assert_eq!(resolve_pids("garbage"), set(&[DEFAULT_CUE_PID]));
        assert_eq!(resolve_pids(" , ,"), set(&[DEFAULT_CUE_PID]));
    }

    #[test]
    fn test_bad_tokens_are_dropped_individually() {
        assert_eq!(resolve_pids("0x1F00,nope,0x2000,8191"), set(&[0x1F00, 0x1FFF]));
        assert_eq!(resolve_pids("0x,-1,0x1F05"), set(&[0x1F05]));
    }

    #[test]
    fn test_idempotent() {
        let first = resolve_pids("0x1F01,0x1F00,0x1F01");
        assert_eq!(first, resolve_pids("0x1F01,0x1F00,0x1F01"));
        assert_eq!(first, set(&[0x1F00, 0x1F01]));
    }

    #[test]
    fn test_parse_pid_bounds() {
        assert_eq!(parse_pid("0x1FFF").unwrap(), 0x1FFF);
        assert_eq!(parse_pid("0").unwrap(), 0);
        assert!(parse_pid("0x2000").is_err());
        assert!(parse_pid("8192").is_err());
    }
}
