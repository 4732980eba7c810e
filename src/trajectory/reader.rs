//! Reading and checking a recorded `data.jsonl`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use crate::error::{TraceError, TraceResult};
use crate::trajectory::types::TurnRecord;

/// Parse every non-blank line of a trajectory log.
pub fn read_log(path: impl AsRef<Path>) -> TraceResult<Vec<TurnRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| TraceError::io(path, e))?;

    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| TraceError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("turn sequence broken at record {index}: expected t={expected}, found t={found}")]
pub struct TurnSequenceError {
    pub index: usize,
    pub expected: u64,
    pub found: u64,
}

/// Check that `ts` is exactly `0, 1, 2, ...`.
pub fn verify_turn_sequence(ts: impl IntoIterator<Item = u64>) -> Result<(), TurnSequenceError> {
    for (index, found) in ts.into_iter().enumerate() {
        let expected = index as u64;
        if found != expected {
            return Err(TurnSequenceError {
                index,
                expected,
                found,
            });
        }
    }
    Ok(())
}

/// Split a log into recording sessions. The log is append-only across runs,
/// so every `t == 0` starts a new session.
pub fn split_sessions(records: &[TurnRecord]) -> Vec<&[TurnRecord]> {
    let mut sessions = Vec::new();
    let mut start = 0;
    for (i, record) in records.iter().enumerate() {
        if record.t == 0 && i > start {
            sessions.push(&records[start..i]);
            start = i;
        }
    }
    if start < records.len() {
        sessions.push(&records[start..]);
    }
    sessions
}

/// Aggregate facts about a log, as printed by the `inspect` command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSummary {
    pub records: usize,
    pub sessions: usize,
    pub episodes: usize,
    /// Sessions whose turn sequence is not gapless.
    pub broken_sessions: usize,
    pub channel_counts: BTreeMap<String, usize>,
}

pub fn summarize(records: &[TurnRecord]) -> LogSummary {
    let sessions = split_sessions(records);
    let broken_sessions = sessions
        .iter()
        .filter(|s| verify_turn_sequence(s.iter().map(|r| r.t)).is_err())
        .count();

    let mut episodes: Vec<(&str, u64, usize)> = Vec::new();
    let mut channel_counts = BTreeMap::new();
    for (session_idx, session) in sessions.iter().enumerate() {
        for record in session.iter() {
            let key = (record.env_name.as_str(), record.episode.unwrap_or(0), session_idx);
            if !episodes.contains(&key) {
                episodes.push(key);
            }
            for name in record.channels.keys() {
                *channel_counts.entry(name.clone()).or_insert(0) += 1;
            }
        }
    }

    LogSummary {
        records: records.len(),
        sessions: sessions.len(),
        episodes: episodes.len(),
        broken_sessions,
        channel_counts,
    }
}
