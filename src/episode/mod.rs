//! The episode loop and its collaborators.
//!
//! - [`action`] -- sampled and interactive action sources.
//! - [`runner`] -- [`EpisodeRunner`], which steps the environment and feeds
//!   every observation to the trajectory recorder.
//! - [`stats`] -- running means and per-episode summaries.
//! - [`gif`] -- frame buffering and replay GIF assembly.

pub mod action;
pub mod gif;
pub mod runner;
pub mod stats;

pub use action::{ActionChoice, ActionSource, InteractiveActions, SampledActions};
pub use gif::{FrameBuffer, GIF_CHANNEL};
pub use runner::EpisodeRunner;
pub use stats::{EpisodeStats, RunSummary, RunningMean};
