//! Per-episode and per-run statistics.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Incrementally updated arithmetic mean: `mean += (x - mean) / n`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    mean: f64,
    count: u64,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one sample and return the updated mean.
    pub fn push(&mut self, x: f64) -> f64 {
        self.count += 1;
        self.mean += (x - self.mean) / self.count as f64;
        self.mean
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Summary emitted at each episode boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub episode: u64,
    pub steps: usize,
    pub steps_per_second: f64,
    pub end_status: Option<String>,
    /// Reward of the terminal transition, when the backend reports rewards.
    pub final_reward: Option<f64>,
    /// Mean per-step reward over the episode, when the backend reports rewards.
    pub mean_reward: Option<f64>,
}

/// Summary of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub episodes: u64,
    pub total_steps: u64,
    pub elapsed_secs: f64,
    /// Running mean of per-episode steps-per-second.
    pub mean_sps: f64,
    /// True when the run ended on an interactive interrupt.
    pub interrupted: bool,
    /// Number of turn records appended to the trajectory log.
    pub records_written: u64,
    pub gif_path: Option<PathBuf>,
    pub episode_stats: Vec<EpisodeStats>,
}
