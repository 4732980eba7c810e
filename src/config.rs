use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::env::RenderMode;
use crate::episode::GIF_CHANNEL;
use crate::observation::known_channel_names;

/// Complete configuration for recording and templating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub play: PlayConfig,
    pub window: WindowConfig,
}

/// How actions are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Read one key per turn from the terminal.
    #[default]
    Human,
    /// Sample uniformly from the legal action set.
    Random,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Random => "random",
        }
    }
}

/// Which environment backend to drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Backend {
    /// In-process room simulation.
    Mock,
    /// External game bridge reachable over HTTP.
    Http { base_url: String },
}

impl Default for Backend {
    fn default() -> Self {
        Self::Mock
    }
}

/// Episode loop and recording configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayConfig {
    /// Environment name (default: `MiniHack-Room-Random-5x5-v0`; `raw`
    /// selects the bare game without reward or step limit).
    pub env: String,
    pub backend: Backend,
    pub mode: ControlMode,
    /// Episodes to play before exiting; 0 plays until interrupted.
    pub ngames: u64,
    /// Maximum steps per episode (default: 10000).
    pub max_steps: usize,
    pub seed: Option<u64>,
    /// Output directory for `data.jsonl` and image side-files. The literal
    /// `args` expands to `<timestamp>_<mode>_<env>`.
    pub savedir: PathBuf,
    pub render: bool,
    pub render_mode: RenderMode,
    pub save_gif: bool,
    pub gif_path: PathBuf,
    /// Per-frame GIF duration in milliseconds (default: 300).
    pub gif_duration_ms: u32,
    /// Append turn records to the trajectory log.
    pub record: bool,
    /// Observation channels to capture.
    pub channels: Vec<String>,
    pub instruction: String,
    pub goal: String,
}

/// Which grid the windowed template shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScreenType {
    Chars,
    #[default]
    CharsCrop,
}

impl ScreenType {
    /// Channel the screen content is read from.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Chars => "chars",
            Self::CharsCrop => "chars_crop",
        }
    }

    /// Heading used in the state block.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Chars => "Chars",
            Self::CharsCrop => "Chars Crop",
        }
    }
}

/// Whether the rolling window spans the whole log or one episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WindowScope {
    /// One buffer for the whole stream.
    #[default]
    Shared,
    /// One buffer per `(env_name, episode)`.
    PerEpisode,
}

/// Sliding-window template configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Maximum number of state blocks per window (default: 6).
    pub window_size: usize,
    pub screen: ScreenType,
    pub scope: WindowScope,
    /// Instruction text of the prior-context render.
    pub prior_instruction: String,
    /// Instruction text of the complete render.
    pub complete_instruction: String,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            env: "MiniHack-Room-Random-5x5-v0".into(),
            backend: Backend::Mock,
            mode: ControlMode::Human,
            ngames: 1,
            max_steps: 10_000,
            seed: None,
            savedir: PathBuf::from("nle_data/play_data"),
            render: true,
            render_mode: RenderMode::Human,
            save_gif: false,
            gif_path: PathBuf::from("replay.gif"),
            gif_duration_ms: 300,
            record: true,
            channels: known_channel_names().map(String::from).collect(),
            instruction: "Go down the stairs.".into(),
            goal: String::new(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: 6,
            screen: ScreenType::CharsCrop,
            scope: WindowScope::Shared,
            prior_instruction: "Your instruction here".into(),
            complete_instruction: "Your complete instruction here".into(),
        }
    }
}

impl TraceConfig {
    /// Read a JSON config file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }
}

impl PlayConfig {
    /// The directory records are written to, with `args` expanded using the
    /// given timestamp.
    pub fn resolved_savedir(&self, now: chrono::DateTime<chrono::Local>) -> PathBuf {
        if self.savedir.as_os_str() == "args" {
            PathBuf::from(format!(
                "{}_{}_{}",
                now.format("%Y%m%d-%H%M%S"),
                self.mode.as_str(),
                self.env
            ))
        } else {
            self.savedir.clone()
        }
    }

    /// Channels a backend must emit: the recorded ones, plus the frame
    /// channel when a replay GIF is requested.
    pub fn observation_keys(&self) -> Vec<String> {
        let mut keys = self.channels.clone();
        if self.save_gif && !keys.iter().any(|k| k == GIF_CHANNEL) {
            keys.push(GIF_CHANNEL.to_string());
        }
        keys
    }
}
