//! The persisted per-turn record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// File name of the append-only trajectory log inside an output directory.
pub const LOG_FILE_NAME: &str = "data.jsonl";

/// One line of `data.jsonl`.
///
/// The fixed keys come first; every captured channel is flattened alongside
/// them under its own name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Environment that produced the run.
    pub env_name: String,
    /// Free-text instruction given for the run.
    pub instruction: String,
    /// Turn index; gapless from 0 within one recording session.
    pub t: u64,
    /// Goal string (may be empty).
    pub goal: String,
    /// Index into the action set of the action that led to this state.
    /// `None` for the state right after the first reset.
    pub action: Option<usize>,
    /// Episode the turn belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u64>,
    /// Encoded observation channels, keyed by channel name.
    #[serde(flatten)]
    pub channels: BTreeMap<String, Value>,
}
