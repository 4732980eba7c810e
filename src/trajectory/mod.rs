//! Trajectory logs: the persisted record type, the recorder that appends to
//! the log, and helpers that read it back.
//!
//! - [`types::TurnRecord`] -- one line of `data.jsonl`.
//! - [`recorder::TrajectoryRecorder`] / [`recorder::RecordSession`] -- encode
//!   a step's observation bundle and append it.
//! - [`reader`] -- parse, split into sessions, verify, and summarise a log.

pub mod reader;
pub mod recorder;
pub mod types;

pub use reader::{read_log, summarize, verify_turn_sequence, LogSummary};
pub use recorder::{RecordOutcome, RecordSession, TrajectoryRecorder};
pub use types::{TurnRecord, LOG_FILE_NAME};
