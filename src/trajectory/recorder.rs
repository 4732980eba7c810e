//! Turning a live stepping loop into an append-only trajectory log.
//!
//! The [`TrajectoryRecorder`] holds the run-level constants (output directory,
//! environment name, instruction, goal, requested channels). The mutable turn
//! counter lives in a [`RecordSession`] owned by the caller and passed into
//! every [`TrajectoryRecorder::record`] call.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{TraceError, TraceResult};
use crate::observation::{encode_channel, EncodeContext, ObservationBundle};
use crate::trajectory::types::{TurnRecord, LOG_FILE_NAME};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Per-run recording state threaded between the episode loop and the recorder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSession {
    next_turn: u64,
    episode: u64,
}

impl RecordSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `t` the next appended record will carry.
    pub fn next_turn(&self) -> u64 {
        self.next_turn
    }

    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Mark the start of the next episode. Turn numbering continues.
    pub fn begin_episode(&mut self, episode: u64) {
        self.episode = episode;
    }
}

/// What a call to [`TrajectoryRecorder::record`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A line was appended for turn `t` holding `channels` encoded channels.
    Appended { t: u64, channels: usize },
    /// Recording is switched off; nothing was written and `t` did not move.
    Skipped,
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TrajectoryRecorder {
    output_dir: PathBuf,
    env_name: String,
    instruction: String,
    goal: String,
    channels: Vec<String>,
    enabled: bool,
}

impl TrajectoryRecorder {
    /// Create a recorder that appends to `<output_dir>/data.jsonl`.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        env_name: &str,
        instruction: &str,
        goal: &str,
        channels: Vec<String>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            env_name: env_name.to_string(),
            instruction: instruction.to_string(),
            goal: goal.to_string(),
            channels,
            enabled: true,
        }
    }

    /// A recorder that skips every call.
    pub fn disabled() -> Self {
        Self {
            output_dir: PathBuf::new(),
            env_name: String::new(),
            instruction: String::new(),
            goal: String::new(),
            channels: Vec::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(LOG_FILE_NAME)
    }

    /// Encode the requested channels of `bundle` and append one record.
    ///
    /// Image side-files are written while encoding, before the log line. The
    /// session's turn counter advances only once the line is on disk.
    pub fn record(
        &self,
        session: &mut RecordSession,
        action: Option<usize>,
        bundle: &ObservationBundle,
    ) -> TraceResult<RecordOutcome> {
        if !self.enabled {
            return Ok(RecordOutcome::Skipped);
        }

        let t = session.next_turn;
        std::fs::create_dir_all(&self.output_dir).map_err(|e| TraceError::io(&self.output_dir, e))?;

        let ctx = EncodeContext {
            turn: t,
            output_dir: &self.output_dir,
        };
        let mut channels = BTreeMap::new();
        for name in &self.channels {
            match bundle.get(name) {
                Some(raw) => {
                    channels.insert(name.clone(), encode_channel(name, raw, &ctx)?);
                }
                None => debug!(channel = %name, t, "requested channel missing from observation"),
            }
        }
        let captured = channels.len();

        let record = TurnRecord {
            env_name: self.env_name.clone(),
            instruction: self.instruction.clone(),
            t,
            goal: self.goal.clone(),
            action,
            episode: Some(session.episode),
            channels,
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.log_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TraceError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| TraceError::io(&path, e))?;

        session.next_turn += 1;
        debug!(t, channels = captured, path = %path.display(), "appended turn record");

        Ok(RecordOutcome::Appended {
            t,
            channels: captured,
        })
    }
}
