//! The episode loop: acquire an action, step the environment, record the turn.
//!
//! [`EpisodeRunner::run`] records the observation *before* each action, so
//! the reset state lands in the log with `action: null` and every later
//! record carries the action taken from that state.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::action::{ActionChoice, ActionSource};
use super::gif::{FrameBuffer, GIF_CHANNEL};
use super::stats::{EpisodeStats, RunSummary, RunningMean};
use crate::config::PlayConfig;
use crate::env::Environment;
use crate::observation::encoder::{encode_grid, encode_message};
use crate::observation::{ObservationBundle, RawObservation};
use crate::trajectory::{RecordSession, TrajectoryRecorder};

/// Drives episodes according to a [`PlayConfig`].
#[derive(Debug, Clone)]
pub struct EpisodeRunner {
    config: PlayConfig,
}

/// Per-episode counters, reset at every boundary.
struct EpisodeState {
    steps: usize,
    started: Instant,
    mean_reward: RunningMean,
    last_reward: Option<f64>,
}

impl EpisodeState {
    fn new() -> Self {
        Self {
            steps: 0,
            started: Instant::now(),
            mean_reward: RunningMean::new(),
            last_reward: None,
        }
    }
}

impl EpisodeRunner {
    pub fn new(config: PlayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlayConfig {
        &self.config
    }

    /// Play until the episode quota is reached or the action source
    /// interrupts. `ngames == 0` plays until interrupted.
    ///
    /// The environment is closed on every exit path, including errors.
    pub async fn run<E, A>(
        &self,
        env: &mut E,
        actions: &mut A,
        recorder: &TrajectoryRecorder,
    ) -> Result<RunSummary>
    where
        E: Environment,
        A: ActionSource,
    {
        let result = self.play(env, actions, recorder).await;
        let closed = env.close().await.context("failed to close environment");
        match (result, closed) {
            (Ok(summary), closed) => closed.map(|()| summary),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(error = %close_err, "failed to close environment after error");
                Err(err)
            }
        }
    }

    async fn play<E, A>(
        &self,
        env: &mut E,
        actions: &mut A,
        recorder: &TrajectoryRecorder,
    ) -> Result<RunSummary>
    where
        E: Environment,
        A: ActionSource,
    {
        let run_id = Uuid::new_v4().to_string();
        let run_started = Instant::now();
        info!(
            run_id = %run_id,
            env = env.name(),
            ngames = self.config.ngames,
            max_steps = self.config.max_steps,
            "starting run"
        );

        let mut frames = if self.config.save_gif {
            Some(FrameBuffer::new()?)
        } else {
            None
        };
        let mut session = RecordSession::new();
        let mut episode_stats = Vec::new();
        let mut mean_sps = RunningMean::new();
        let mut total_steps = 0u64;
        let mut episodes = 0u64;
        let mut interrupted = false;

        let mut obs = env.reset().await.context("failed to reset environment")?;
        let mut action: Option<usize> = None;
        let mut state = EpisodeState::new();

        loop {
            if self.config.render {
                self.render(env, &obs, action, state.last_reward);
            }

            recorder.record(&mut session, action, &obs)?;

            if let Some(frames) = frames.as_mut() {
                match obs.get(GIF_CHANNEL) {
                    Some(frame) => {
                        frames.save_frame(episodes, state.steps, frame)?;
                    }
                    None => warn!(channel = GIF_CHANNEL, "no frame in observation, skipping"),
                }
            }

            let index = match actions.next_action(env.actions())? {
                ActionChoice::Act(index) => index,
                ActionChoice::Interrupt => {
                    interrupted = true;
                    break;
                }
            };

            let outcome = env
                .step(index)
                .await
                .with_context(|| format!("failed to step with action {index}"))?;
            action = Some(index);
            obs = outcome.observation;
            state.steps += 1;
            total_steps += 1;

            let mut done = outcome.done;
            if !env.enforces_step_limit() && state.steps >= self.config.max_steps {
                debug!(steps = state.steps, "step limit reached");
                done = true;
            }

            if let Some(reward) = outcome.reward {
                state.last_reward = Some(reward);
                state.mean_reward.push(reward);
            }

            if !done {
                continue;
            }

            let elapsed = state.started.elapsed().as_secs_f64();
            let steps_per_second = if elapsed > 0.0 {
                state.steps as f64 / elapsed
            } else {
                0.0
            };
            let stats = EpisodeStats {
                episode: episodes,
                steps: state.steps,
                steps_per_second,
                end_status: outcome.end_status,
                final_reward: outcome.reward,
                mean_reward: (state.mean_reward.count() > 0).then(|| state.mean_reward.mean()),
            };
            mean_sps.push(steps_per_second);
            info!(
                episode = stats.episode,
                steps = stats.steps,
                sps = format!("{:.2}", stats.steps_per_second),
                mean_sps = format!("{:.2}", mean_sps.mean()),
                end_status = stats.end_status.as_deref().unwrap_or("-"),
                mean_reward = ?stats.mean_reward,
                "episode finished"
            );
            episode_stats.push(stats);
            episodes += 1;

            if self.config.ngames > 0 && episodes >= self.config.ngames {
                break;
            }

            session.begin_episode(episodes);
            obs = env.reset().await.context("failed to reset environment")?;
            action = None;
            state = EpisodeState::new();
        }

        let gif_path = match frames {
            Some(frames) => {
                let written = frames.assemble(&self.config.gif_path, self.config.gif_duration_ms)?;
                info!(path = %self.config.gif_path.display(), frames = written, "saved replay GIF");
                Some(self.config.gif_path.clone())
            }
            None => None,
        };

        let summary = RunSummary {
            run_id,
            episodes,
            total_steps,
            elapsed_secs: run_started.elapsed().as_secs_f64(),
            mean_sps: mean_sps.mean(),
            interrupted,
            records_written: if recorder.is_enabled() {
                session.next_turn()
            } else {
                0
            },
            gif_path,
            episode_stats,
        };
        info!(
            run_id = %summary.run_id,
            episodes = summary.episodes,
            total_steps = summary.total_steps,
            records = summary.records_written,
            interrupted = summary.interrupted,
            "run finished"
        );
        Ok(summary)
    }

    fn render<E: Environment>(
        &self,
        env: &E,
        obs: &ObservationBundle,
        action: Option<usize>,
        reward: Option<f64>,
    ) {
        println!("Previous reward: {}", fmt_reward(reward));
        match action {
            Some(index) => println!("Previous action: {}", env.actions().describe(index)),
            None => println!("Previous action: None"),
        }
        match env.render(self.config.render_mode) {
            Some(screen) => println!("{screen}"),
            None => print_bundle(obs),
        }
    }
}

fn fmt_reward(reward: Option<f64>) -> String {
    reward.map_or_else(|| "None".to_string(), |r| r.to_string())
}

/// Fallback rendering for backends without a text screen.
fn print_bundle(obs: &ObservationBundle) {
    if let Some(RawObservation::Bytes { data, .. }) = obs.get("message") {
        if let Ok(message) = encode_message("message", data, 0) {
            println!("{message}");
        }
    }
    if let Some(RawObservation::Bytes { shape, data }) = obs.get("chars") {
        if let Ok(grid) = encode_grid("chars", shape, data, 0) {
            println!("{grid}");
        }
    }
    if let Some(stats) = obs.get("blstats").and_then(RawObservation::to_nested_json) {
        println!("{stats}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::env::mock::MockGridEnv;
    use crate::env::ActionSet;
    use crate::episode::action::SampledActions;
    use crate::trajectory::read_log;

    /// Replays a fixed list of choices, then interrupts.
    struct Scripted(VecDeque<ActionChoice>);

    impl Scripted {
        fn wait(n: usize) -> Self {
            Self((0..n).map(|_| ActionChoice::Act(0)).collect())
        }
    }

    impl ActionSource for Scripted {
        fn next_action(&mut self, _actions: &ActionSet) -> Result<ActionChoice> {
            Ok(self.0.pop_front().unwrap_or(ActionChoice::Interrupt))
        }
    }

    /// Counts `close` calls on a wrapped mock, optionally withholding the
    /// frame channel.
    struct TrackedEnv {
        inner: MockGridEnv,
        closes: usize,
        drop_frames: bool,
    }

    impl TrackedEnv {
        fn new(drop_frames: bool) -> Self {
            Self {
                inner: MockGridEnv::new("raw", 2, Some(7)),
                closes: 0,
                drop_frames,
            }
        }

        fn filter(&self, mut obs: ObservationBundle) -> ObservationBundle {
            if self.drop_frames {
                obs.remove(GIF_CHANNEL);
            }
            obs
        }
    }

    impl Environment for TrackedEnv {
        async fn reset(&mut self) -> Result<ObservationBundle> {
            let obs = self.inner.reset().await?;
            Ok(self.filter(obs))
        }

        async fn step(&mut self, action: usize) -> Result<crate::env::StepOutcome> {
            let mut outcome = self.inner.step(action).await?;
            outcome.observation = self.filter(outcome.observation);
            Ok(outcome)
        }

        fn name(&self) -> &str {
            self.inner.name()
        }

        fn actions(&self) -> &ActionSet {
            self.inner.actions()
        }

        fn enforces_step_limit(&self) -> bool {
            self.inner.enforces_step_limit()
        }

        fn render(&self, mode: crate::env::RenderMode) -> Option<String> {
            self.inner.render(mode)
        }

        async fn close(&mut self) -> Result<()> {
            self.closes += 1;
            Ok(())
        }
    }

    fn config(env: &str, ngames: u64, max_steps: usize) -> PlayConfig {
        PlayConfig {
            env: env.into(),
            ngames,
            max_steps,
            seed: Some(7),
            render: false,
            ..PlayConfig::default()
        }
    }

    fn recorder(dir: &std::path::Path, channels: &[&str]) -> TrajectoryRecorder {
        TrajectoryRecorder::new(
            dir.to_path_buf(),
            "test-env",
            "Go down the stairs.",
            "",
            channels.iter().map(|c| c.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn raw_mode_enforces_max_steps_in_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let runner = EpisodeRunner::new(config("raw", 1, 3));
        let mut env = MockGridEnv::new("raw", 3, Some(7));
        let mut actions = Scripted::wait(10);
        let recorder = recorder(dir.path(), &["message"]);

        let summary = runner.run(&mut env, &mut actions, &recorder).await.unwrap();
        assert_eq!(summary.episodes, 1);
        assert_eq!(summary.total_steps, 3);
        assert!(!summary.interrupted);
        assert_eq!(summary.episode_stats[0].end_status, None);
        assert_eq!(summary.episode_stats[0].mean_reward, None);

        // Reset state plus the states before the second and third actions.
        let records = read_log(&recorder.log_path()).unwrap();
        let ts: Vec<u64> = records.iter().map(|r| r.t).collect();
        assert_eq!(ts, vec![0, 1, 2]);
        assert_eq!(records[0].action, None);
        assert_eq!(records[1].action, Some(0));
    }

    #[tokio::test]
    async fn turns_run_across_episodes_and_reset_records_have_no_action() {
        let dir = tempfile::tempdir().unwrap();
        let runner = EpisodeRunner::new(config("MiniHack-Room-Random-5x5-v0", 2, 2));
        let mut env = MockGridEnv::new("MiniHack-Room-Random-5x5-v0", 2, Some(7));
        let mut actions = Scripted::wait(10);
        let recorder = recorder(dir.path(), &["blstats"]);

        let summary = runner.run(&mut env, &mut actions, &recorder).await.unwrap();
        assert_eq!(summary.episodes, 2);
        assert_eq!(summary.records_written, 4);
        for stats in &summary.episode_stats {
            assert_eq!(stats.steps, 2);
            assert_eq!(stats.end_status.as_deref(), Some("ABORTED"));
            assert_eq!(stats.mean_reward, Some(0.0));
        }

        let records = read_log(&recorder.log_path()).unwrap();
        let ts: Vec<u64> = records.iter().map(|r| r.t).collect();
        assert_eq!(ts, vec![0, 1, 2, 3]);
        let actions: Vec<Option<usize>> = records.iter().map(|r| r.action).collect();
        assert_eq!(actions, vec![None, Some(0), None, Some(0)]);
        let episodes: Vec<Option<u64>> = records.iter().map(|r| r.episode).collect();
        assert_eq!(episodes, vec![Some(0), Some(0), Some(1), Some(1)]);
    }

    #[tokio::test]
    async fn interrupt_stops_before_quota() {
        let dir = tempfile::tempdir().unwrap();
        let runner = EpisodeRunner::new(config("raw", 0, 100));
        let mut env = MockGridEnv::new("raw", 100, Some(7));
        let mut actions = Scripted::wait(2);
        let recorder = recorder(dir.path(), &[]);

        let summary = runner.run(&mut env, &mut actions, &recorder).await.unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.episodes, 0);
        assert_eq!(summary.total_steps, 2);
        // The state shown before the interrupt is still recorded.
        assert_eq!(summary.records_written, 3);
    }

    #[tokio::test]
    async fn sampled_episodes_finish_and_write_a_gif() {
        let dir = tempfile::tempdir().unwrap();
        let gif_path = dir.path().join("replay.gif");
        let runner = EpisodeRunner::new(PlayConfig {
            save_gif: true,
            gif_path: gif_path.clone(),
            ..config("MiniHack-Room-Random-5x5-v0", 1, 50)
        });
        let mut env = MockGridEnv::new("MiniHack-Room-Random-5x5-v0", 50, Some(3));
        let mut actions = SampledActions::new(Some(3));
        let recorder = TrajectoryRecorder::disabled();

        let summary = runner.run(&mut env, &mut actions, &recorder).await.unwrap();
        assert_eq!(summary.episodes, 1);
        assert_eq!(summary.records_written, 0);
        assert_eq!(summary.gif_path.as_deref(), Some(gif_path.as_path()));
        assert!(gif_path.is_file());
    }

    #[tokio::test]
    async fn env_is_closed_after_a_normal_run() {
        let dir = tempfile::tempdir().unwrap();
        let runner = EpisodeRunner::new(config("raw", 1, 2));
        let mut env = TrackedEnv::new(false);
        let recorder = recorder(dir.path(), &["message"]);

        runner.run(&mut env, &mut Scripted::wait(5), &recorder).await.unwrap();
        assert_eq!(env.closes, 1);
    }

    #[tokio::test]
    async fn env_is_closed_when_recording_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the output directory should go.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let runner = EpisodeRunner::new(config("raw", 1, 2));
        let mut env = TrackedEnv::new(false);
        let recorder = recorder(&blocked.join("traj"), &["message"]);

        let err = runner
            .run(&mut env, &mut Scripted::wait(5), &recorder)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<crate::error::TraceError>().is_some());
        assert_eq!(env.closes, 1);
    }

    #[tokio::test]
    async fn env_is_closed_when_gif_assembly_fails() {
        let dir = tempfile::tempdir().unwrap();
        let gif_path = dir.path().join("replay.gif");
        let runner = EpisodeRunner::new(PlayConfig {
            save_gif: true,
            gif_path: gif_path.clone(),
            ..config("raw", 1, 2)
        });
        let mut env = TrackedEnv::new(true);
        let recorder = TrajectoryRecorder::disabled();

        let err = runner
            .run(&mut env, &mut Scripted::wait(5), &recorder)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::TraceError>(),
            Some(crate::error::TraceError::EmptyFrameSet)
        ));
        assert!(!gif_path.exists());
        assert_eq!(env.closes, 1);
    }
}
