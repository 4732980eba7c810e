//! Core environment trait and shared types.
//!
//! The episode loop only sees an environment through [`Environment`]: it
//! resets, steps with an action index, and reads back observation bundles.

use serde::{Deserialize, Serialize};

use super::actions::ActionSet;
use crate::observation::ObservationBundle;

/// What the environment returns after one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub observation: ObservationBundle,
    /// Scalar reward, when the backend produces one.
    #[serde(default)]
    pub reward: Option<f64>,
    /// Whether the episode terminated (or was truncated by the backend).
    pub done: bool,
    /// Backend-specific end status, e.g. `TASK_SUCCESSFUL`.
    #[serde(default)]
    pub end_status: Option<String>,
}

/// How the environment should render itself for a human watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Human,
    Full,
    Ansi,
}

/// The core environment trait.
#[allow(async_fn_in_trait)]
pub trait Environment: Send {
    /// Start a new episode and return its first observation.
    async fn reset(&mut self) -> anyhow::Result<ObservationBundle>;

    /// Apply the action at `action` (an index into [`Environment::actions`]).
    async fn step(&mut self, action: usize) -> anyhow::Result<StepOutcome>;

    /// Environment identifier written into every record.
    fn name(&self) -> &str;

    /// The legal action set.
    fn actions(&self) -> &ActionSet;

    /// Whether the backend truncates episodes at its own step limit. When it
    /// does not, the episode loop enforces `max_steps` itself.
    fn enforces_step_limit(&self) -> bool;

    /// Text rendering of the current state, if the backend has one.
    fn render(&self, mode: RenderMode) -> Option<String>;

    /// Release backend resources.
    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
