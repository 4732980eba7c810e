//! Sliding-window reconstruction over a trajectory log.
//!
//! A [`WindowContext`] owns the rolling buffers for one windowing session.
//! Each call to [`WindowContext::build_window`] renders the current record,
//! prepends the buffered blocks of earlier turns, and pushes the new block.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use super::template::{render_instruction, render_state, StateFields};
use crate::config::{ScreenType, WindowConfig, WindowScope};
use crate::error::{TraceError, TraceResult};

/// Both renders produced for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub t: u64,
    /// Blocks of earlier turns only, wrapped in the instruction template.
    pub prior: String,
    /// Earlier blocks plus the current one, wrapped in the instruction template.
    pub complete: String,
}

/// Rolling window state for one windowing session.
#[derive(Debug, Clone)]
pub struct WindowContext {
    window_size: usize,
    screen: ScreenType,
    scope: WindowScope,
    prior_instruction: String,
    complete_instruction: String,
    buffers: HashMap<String, VecDeque<(u64, String)>>,
}

impl WindowContext {
    pub fn new(config: &WindowConfig) -> Self {
        Self {
            window_size: config.window_size,
            screen: config.screen,
            scope: config.scope,
            prior_instruction: config.prior_instruction.clone(),
            complete_instruction: config.complete_instruction.clone(),
            buffers: HashMap::new(),
        }
    }

    /// Render the window ending at `record`. Records without an integer `t`
    /// are skipped and leave the buffers untouched.
    pub fn build_window(&mut self, record: &Value) -> Option<RenderedTemplate> {
        let t = record.get("t").and_then(Value::as_u64)?;

        let block = render_state(&StateFields {
            t,
            goal: record.get("goal"),
            blstats: record.get("blstats"),
            screen: self.screen,
            screen_content: record.get(self.screen.channel()),
            inventory: record.get("inv_strs"),
            message: record.get("message"),
            action: record.get("action"),
        });

        let key = self.buffer_key(record);
        let window_size = self.window_size;
        let buffer = self.buffers.entry(key).or_default();
        let mut prior: Vec<&str> = buffer
            .iter()
            .filter(|(prev_t, _)| *prev_t < t)
            .map(|(_, text)| text.as_str())
            .collect();
        // The current block takes the last slot of the window.
        let excess = prior.len().saturating_sub(window_size.saturating_sub(1));
        prior.drain(..excess);
        let prior_text = prior.join("\n");
        let complete_text = if prior.is_empty() {
            block.clone()
        } else {
            format!("{prior_text}\n{block}")
        };

        buffer.push_back((t, block));
        while buffer.len() > window_size {
            buffer.pop_front();
        }

        let message = record.get("message");
        Some(RenderedTemplate {
            t,
            prior: render_instruction(message, &self.prior_instruction, &prior_text),
            complete: render_instruction(message, &self.complete_instruction, &complete_text),
        })
    }

    fn buffer_key(&self, record: &Value) -> String {
        match self.scope {
            WindowScope::Shared => String::new(),
            WindowScope::PerEpisode => {
                let env = record.get("env_name").and_then(Value::as_str).unwrap_or("");
                let episode = record.get("episode").and_then(Value::as_u64).unwrap_or(0);
                format!("{env}\u{0}{episode}")
            }
        }
    }
}

/// Stream the log at `input` and write one JSON string per templated record
/// (the complete render) to `output`. Returns the number of lines written.
pub fn export_templates(input: &Path, output: &Path, config: &WindowConfig) -> TraceResult<usize> {
    let reader = BufReader::new(File::open(input).map_err(|e| TraceError::io(input, e))?);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TraceError::io(parent, e))?;
    }
    let mut writer = BufWriter::new(File::create(output).map_err(|e| TraceError::io(output, e))?);

    let mut ctx = WindowContext::new(config);
    let mut written = 0usize;
    let mut skipped = 0usize;
    for line in reader.lines() {
        let line = line.map_err(|e| TraceError::io(input, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(&line)?;
        let Some(rendered) = ctx.build_window(&record) else {
            skipped += 1;
            continue;
        };
        debug!(t = rendered.t, "prior context:\n{}", rendered.prior);

        serde_json::to_writer(&mut writer, &rendered.complete)?;
        writer.write_all(b"\n").map_err(|e| TraceError::io(output, e))?;
        written += 1;
    }
    writer.flush().map_err(|e| TraceError::io(output, e))?;

    info!(path = %output.display(), written, skipped, "instructions written");
    Ok(written)
}
