//! Where actions come from: uniform sampling or a human at the keyboard.

use std::io::{Read, Stdin};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::env::{ActionSet, INTERRUPT_KEY};

/// The outcome of asking an [`ActionSource`] for the next move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionChoice {
    /// Take the action at this index of the action set.
    Act(usize),
    /// Stop the whole run.
    Interrupt,
}

pub trait ActionSource {
    fn next_action(&mut self, actions: &ActionSet) -> Result<ActionChoice>;
}

// ---------------------------------------------------------------------------
// Sampled
// ---------------------------------------------------------------------------

/// Draws uniformly from the legal action set.
#[derive(Debug, Clone)]
pub struct SampledActions {
    rng: StdRng,
}

impl SampledActions {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl ActionSource for SampledActions {
    fn next_action(&mut self, actions: &ActionSet) -> Result<ActionChoice> {
        anyhow::ensure!(!actions.is_empty(), "cannot sample from an empty action set");
        Ok(ActionChoice::Act(self.rng.gen_range(0..actions.len())))
    }
}

// ---------------------------------------------------------------------------
// Interactive
// ---------------------------------------------------------------------------

/// Reads one raw byte per decision. Keys outside the action set are reported
/// and re-read; `Ctrl-C` or end of input interrupts the run.
#[derive(Debug)]
pub struct InteractiveActions<R> {
    input: R,
    raw_terminal: bool,
}

impl InteractiveActions<Stdin> {
    /// Read from the terminal with echo and line buffering switched off.
    pub fn stdin() -> Self {
        Self {
            input: std::io::stdin(),
            raw_terminal: true,
        }
    }
}

impl<R: Read> InteractiveActions<R> {
    /// Read keys from an arbitrary byte stream; the terminal is left alone.
    pub fn from_reader(input: R) -> Self {
        Self {
            input,
            raw_terminal: false,
        }
    }

    fn read_key(&mut self) -> Result<Option<u8>> {
        let _guard = if self.raw_terminal {
            Some(RawModeGuard::enable()?)
        } else {
            None
        };
        let mut buf = [0u8; 1];
        let n = self.input.read(&mut buf).context("failed to read key")?;
        Ok((n == 1).then_some(buf[0]))
    }
}

impl<R: Read> ActionSource for InteractiveActions<R> {
    fn next_action(&mut self, actions: &ActionSet) -> Result<ActionChoice> {
        loop {
            let key = match self.read_key()? {
                Some(key) if key != INTERRUPT_KEY => key,
                Some(key) => {
                    info!(key, "Received exit code. Aborting.");
                    return Ok(ActionChoice::Interrupt);
                }
                None => {
                    info!("Input closed. Aborting.");
                    return Ok(ActionChoice::Interrupt);
                }
            };

            match actions.lookup(key) {
                Ok(index) => return Ok(ActionChoice::Act(index)),
                Err(illegal) => warn!("{illegal}. Please try again."),
            }
        }
    }
}

/// Keeps the terminal in raw mode for as long as it is alive.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        crossterm::terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(err) = crossterm::terminal::disable_raw_mode() {
            warn!(error = %err, "failed to restore terminal mode");
        }
    }
}
