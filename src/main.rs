//! gridtrace: trajectory recording and windowed template export
//!
//! Provides subcommands for each stage:
//!
//! - `play`     -- Drive episodes and append per-turn records to `data.jsonl`
//! - `template` -- Rebuild sliding-window instruction templates from a log
//! - `inspect`  -- Summarise a recorded log and check its turn sequence

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gridtrace::config::{Backend, ControlMode, PlayConfig, ScreenType, TraceConfig, WindowScope};
use gridtrace::env::http::HttpGridEnv;
use gridtrace::env::mock::MockGridEnv;
use gridtrace::env::{AnyEnv, RenderMode};
use gridtrace::episode::{EpisodeRunner, InteractiveActions, SampledActions};
use gridtrace::observation::{channel_kind, known_channel_names};
use gridtrace::trajectory::{read_log, summarize, TrajectoryRecorder, LOG_FILE_NAME};
use gridtrace::window::export_templates;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// gridtrace: record grid-game trajectories and build instruction templates
#[derive(Parser)]
#[command(name = "gridtrace", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play episodes and record one JSON line per turn.
    Play(PlayArgs),

    /// Build windowed instruction templates from a trajectory log.
    Template {
        /// Path to the JSON Lines log.
        file: PathBuf,

        /// Screen grid to include in each state block.
        #[arg(long)]
        screen_type: Option<ScreenType>,

        /// Output path for the templates.
        #[arg(long, default_value = "./output.jsonl")]
        output_path: PathBuf,

        /// Number of state blocks per window.
        #[arg(long)]
        window_size: Option<usize>,

        /// Keep one rolling window for the whole log or one per episode.
        #[arg(long)]
        scope: Option<WindowScope>,
    },

    /// Summarise a trajectory log.
    Inspect {
        /// Path to a `data.jsonl` file or the directory holding one.
        #[arg(default_value = "nle_data/play_data")]
        path: PathBuf,
    },
}

#[derive(clap::Args)]
struct PlayArgs {
    /// Environment name; `raw` plays without reward or step limit.
    #[arg(short, long)]
    env: Option<String>,

    /// Base URL of an environment bridge. Uses the built-in room otherwise.
    #[arg(long)]
    server: Option<String>,

    /// Control mode.
    #[arg(short, long)]
    mode: Option<ControlMode>,

    /// Number of games to play before exiting (0 plays until interrupted).
    #[arg(long)]
    ngames: Option<u64>,

    /// Maximum steps per episode.
    #[arg(long)]
    max_steps: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Directory to save records to; `args` derives a name from the run.
    #[arg(long)]
    savedir: Option<PathBuf>,

    /// Disable rendering.
    #[arg(long)]
    no_render: bool,

    #[arg(long)]
    render_mode: Option<RenderMode>,

    /// Save a replay GIF of the cropped pixel view.
    #[arg(long)]
    save_gif: bool,

    #[arg(long)]
    gif_path: Option<PathBuf>,

    /// Per-frame GIF duration in milliseconds.
    #[arg(long)]
    gif_duration: Option<u32>,

    /// Do not write a trajectory log.
    #[arg(long)]
    no_record: bool,

    /// Observation channels to record (comma separated).
    #[arg(long, value_delimiter = ',')]
    channels: Option<Vec<String>>,

    /// Instruction stored in every record.
    #[arg(long)]
    instruction: Option<String>,

    #[arg(long)]
    goal: Option<String>,
}

impl PlayArgs {
    fn apply(self, play: &mut PlayConfig) {
        if let Some(env) = self.env {
            play.env = env;
        }
        if let Some(base_url) = self.server {
            play.backend = Backend::Http { base_url };
        }
        if let Some(mode) = self.mode {
            play.mode = mode;
        }
        if let Some(ngames) = self.ngames {
            play.ngames = ngames;
        }
        if let Some(max_steps) = self.max_steps {
            play.max_steps = max_steps;
        }
        if self.seed.is_some() {
            play.seed = self.seed;
        }
        if let Some(savedir) = self.savedir {
            play.savedir = savedir;
        }
        if self.no_render {
            play.render = false;
        }
        if let Some(mode) = self.render_mode {
            play.render_mode = mode;
        }
        if self.save_gif {
            play.save_gif = true;
        }
        if let Some(path) = self.gif_path {
            play.gif_path = path;
        }
        if let Some(ms) = self.gif_duration {
            play.gif_duration_ms = ms;
        }
        if self.no_record {
            play.record = false;
        }
        if let Some(channels) = self.channels {
            play.channels = channels;
        }
        if let Some(instruction) = self.instruction {
            play.instruction = instruction;
        }
        if let Some(goal) = self.goal {
            play.goal = goal;
        }
    }
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TraceConfig::load(path)?,
        None => TraceConfig::default(),
    };

    match cli.command {
        Commands::Play(args) => {
            args.apply(&mut config.play);
            cmd_play(config.play).await
        }
        Commands::Template {
            file,
            screen_type,
            output_path,
            window_size,
            scope,
        } => {
            if let Some(screen) = screen_type {
                config.window.screen = screen;
            }
            if let Some(size) = window_size {
                config.window.window_size = size;
            }
            if let Some(scope) = scope {
                config.window.scope = scope;
            }
            cmd_template(&config, &file, &output_path)
        }
        Commands::Inspect { path } => cmd_inspect(&path),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_play(play: PlayConfig) -> Result<()> {
    validate_channels(&play.channels)?;

    let savedir = play.resolved_savedir(chrono::Local::now());
    let recorder = if play.record {
        tracing::info!(path = %savedir.display(), "Recording trajectories");
        TrajectoryRecorder::new(
            savedir,
            &play.env,
            &play.instruction,
            &play.goal,
            play.channels.clone(),
        )
    } else {
        TrajectoryRecorder::disabled()
    };

    let mut env = create_env(&play);
    let runner = EpisodeRunner::new(play.clone());

    let summary = match play.mode {
        ControlMode::Random => {
            let mut actions = SampledActions::new(play.seed);
            runner.run(&mut env, &mut actions, &recorder).await?
        }
        ControlMode::Human => {
            let mut actions = InteractiveActions::stdin();
            runner.run(&mut env, &mut actions, &recorder).await?
        }
    };

    tracing::info!(
        episodes = summary.episodes,
        mean_sps = format!("{:.2}", summary.mean_sps),
        elapsed = format!("{:.1}s", summary.elapsed_secs),
        "Finished"
    );
    Ok(())
}

fn cmd_template(config: &TraceConfig, file: &Path, output: &Path) -> Result<()> {
    let written = export_templates(file, output, &config.window)
        .with_context(|| format!("Failed to build templates from {}", file.display()))?;
    tracing::info!(path = %output.display(), count = written, "Instructions written");
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let log_path = if path.is_dir() {
        path.join(LOG_FILE_NAME)
    } else {
        path.to_path_buf()
    };
    let records = read_log(&log_path)
        .with_context(|| format!("Failed to read log from {}", log_path.display()))?;
    let summary = summarize(&records);

    println!("Trajectory log: {}", log_path.display());
    println!("  Records: {}", summary.records);
    if let (Some(first), Some(last)) = (records.first(), records.last()) {
        println!("  Turns: {} .. {}", first.t, last.t);
    }
    println!("  Sessions: {}", summary.sessions);
    println!("  Episodes: {}", summary.episodes);
    if summary.broken_sessions > 0 {
        println!("  Sessions with turn gaps: {}", summary.broken_sessions);
    }
    println!();

    println!("Channels:");
    for (name, count) in &summary.channel_counts {
        let kind = channel_kind(name).map_or_else(|| "unknown".to_string(), |k| format!("{k:?}"));
        println!("  {name}: {count} ({kind})");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Environment construction
// ---------------------------------------------------------------------------

fn create_env(play: &PlayConfig) -> AnyEnv {
    match &play.backend {
        Backend::Mock => {
            tracing::info!(env = %play.env, "Using built-in room environment");
            AnyEnv::Mock(MockGridEnv::new(&play.env, play.max_steps, play.seed))
        }
        Backend::Http { base_url } => {
            tracing::info!(env = %play.env, url = %base_url, "Using environment bridge");
            AnyEnv::Http(HttpGridEnv::new(
                base_url,
                &play.env,
                play.seed,
                play.max_steps,
                play.observation_keys(),
                play.render_mode,
            ))
        }
    }
}

fn validate_channels(channels: &[String]) -> Result<()> {
    let unknown: Vec<&str> = channels
        .iter()
        .map(String::as_str)
        .filter(|c| channel_kind(c).is_none())
        .collect();
    if !unknown.is_empty() {
        let known: Vec<&str> = known_channel_names().collect();
        bail!(
            "unknown observation channel(s): {}. Known channels: {}",
            unknown.join(", "),
            known.join(", ")
        );
    }
    Ok(())
}
