//! Error types shared by the recording and windowing layers.
//!
//! Fatal conditions (undecodable channels, log I/O, empty GIF frame sets) are
//! variants of [`TraceError`]. An illegal interactive key is not fatal and has
//! its own type, [`IllegalAction`], so the reprompt loop can match on it
//! without inspecting a larger enum.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for the recording and windowing layers.
pub type TraceResult<T> = std::result::Result<T, TraceError>;

#[derive(Debug, Error)]
pub enum TraceError {
    /// A channel's raw bytes could not be turned into text.
    #[error("failed to decode channel `{channel}` at turn {turn}: {reason}")]
    Decode {
        channel: String,
        turn: u64,
        reason: String,
    },

    /// The log directory, log file, or a side-file could not be created or written.
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An image side-file or GIF frame could not be encoded.
    #[error("image failure on {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("JSON failure: {0}")]
    Json(#[from] serde_json::Error),

    /// GIF assembly was requested but no frame was ever buffered.
    #[error("GIF assembly requested with zero buffered frames")]
    EmptyFrameSet,
}

impl TraceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(channel: &str, turn: u64, reason: impl Into<String>) -> Self {
        Self::Decode {
            channel: channel.to_string(),
            turn,
            reason: reason.into(),
        }
    }
}

/// Interactive input that maps to no legal action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("selected action '{}' is not in the action list", key_char(.key))]
pub struct IllegalAction {
    pub key: u8,
}

fn key_char(key: &u8) -> char {
    char::from(*key)
}
