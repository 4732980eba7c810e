//! Environment backed by an external game bridge over HTTP.
//!
//! The bridge wraps the real game process and exposes two endpoints:
//! - `POST {base_url}/reset` -- body: [`ResetRequest`]
//! - `POST {base_url}/step`  -- body: `{"action": <index>}`
//!
//! Both return an observation bundle in the tagged [`RawObservation`] JSON
//! form, so the recorder sees exactly what it would see from a local backend.
//!
//! [`RawObservation`]: crate::observation::RawObservation

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::actions::ActionSet;
use super::traits::{Environment, RenderMode, StepOutcome};
use crate::observation::ObservationBundle;

#[derive(Debug)]
pub struct HttpGridEnv {
    /// Base URL of the bridge (e.g. `http://localhost:5000`).
    base_url: String,
    http: reqwest::Client,
    name: String,
    seed: Option<u64>,
    max_steps: usize,
    observation_keys: Vec<String>,
    render_mode: RenderMode,
    actions: ActionSet,
    last_render: Option<String>,
    done: bool,
}

#[derive(Debug, Serialize)]
struct ResetRequest<'a> {
    env: &'a str,
    seed: Option<u64>,
    max_episode_steps: usize,
    observation_keys: &'a [String],
    render_mode: RenderMode,
}

#[derive(Debug, Deserialize)]
struct ResetResponse {
    observation: ObservationBundle,
    /// Legal key codes, when the bridge reports them.
    #[serde(default)]
    actions: Option<Vec<u8>>,
    #[serde(default)]
    render: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StepResponse {
    #[serde(flatten)]
    outcome: StepOutcome,
    #[serde(default)]
    render: Option<String>,
}

impl HttpGridEnv {
    pub fn new(
        base_url: &str,
        name: &str,
        seed: Option<u64>,
        max_steps: usize,
        observation_keys: Vec<String>,
        render_mode: RenderMode,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            name: name.to_string(),
            seed,
            max_steps,
            observation_keys,
            render_mode,
            actions: ActionSet::navigation(),
            last_render: None,
            done: false,
        }
    }
}

impl Environment for HttpGridEnv {
    async fn reset(&mut self) -> Result<ObservationBundle> {
        self.done = false;

        let body = ResetRequest {
            env: &self.name,
            seed: self.seed,
            max_episode_steps: self.max_steps,
            observation_keys: &self.observation_keys,
            render_mode: self.render_mode,
        };
        let resp: ResetResponse = self
            .http
            .post(format!("{}/reset", self.base_url))
            .json(&body)
            .send()
            .await
            .context("failed to reach environment bridge on reset")?
            .error_for_status()
            .context("environment bridge rejected reset")?
            .json()
            .await
            .context("failed to parse environment bridge reset response")?;

        if let Some(keys) = resp.actions {
            self.actions = ActionSet::new(keys);
        }
        self.last_render = resp.render;

        tracing::debug!(
            env = %self.name,
            channels = resp.observation.len(),
            actions = self.actions.len(),
            "bridge env reset"
        );
        Ok(resp.observation)
    }

    async fn step(&mut self, action: usize) -> Result<StepOutcome> {
        if self.done {
            bail!("cannot step in a terminated episode");
        }

        let body = serde_json::json!({ "action": action });
        let resp: StepResponse = self
            .http
            .post(format!("{}/step", self.base_url))
            .json(&body)
            .send()
            .await
            .context("failed to reach environment bridge on step")?
            .error_for_status()
            .context("environment bridge rejected step")?
            .json()
            .await
            .context("failed to parse environment bridge step response")?;

        self.done = resp.outcome.done;
        self.last_render = resp.render;
        Ok(resp.outcome)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> &ActionSet {
        &self.actions
    }

    fn enforces_step_limit(&self) -> bool {
        true
    }

    fn render(&self, _mode: RenderMode) -> Option<String> {
        self.last_render.clone()
    }
}
