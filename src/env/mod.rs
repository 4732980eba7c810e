//! Environment abstractions and concrete backends.
//!
//! Every backend implements the [`Environment`] trait so that the episode
//! loop can drive it uniformly.
//!
//! Included backends:
//! - **Mock** ([`mock`]) -- an in-process room-with-stairs simulation that
//!   emits every known observation channel.
//! - **HTTP** ([`http`]) -- a client for an external bridge wrapping the real
//!   game process.

pub mod actions;
pub mod http;
pub mod mock;
pub mod traits;

pub use actions::{ActionSet, INTERRUPT_KEY};
pub use traits::{Environment, RenderMode, StepOutcome};

use crate::observation::ObservationBundle;

// ---------------------------------------------------------------------------
// AnyEnv: enum dispatch wrapper for dynamic backend selection
// ---------------------------------------------------------------------------

/// An enum wrapper around all concrete backends, enabling runtime selection
/// without `dyn` (which is incompatible with async trait methods).
pub enum AnyEnv {
    Mock(mock::MockGridEnv),
    Http(http::HttpGridEnv),
}

impl Environment for AnyEnv {
    async fn reset(&mut self) -> anyhow::Result<ObservationBundle> {
        match self {
            Self::Mock(e) => e.reset().await,
            Self::Http(e) => e.reset().await,
        }
    }

    async fn step(&mut self, action: usize) -> anyhow::Result<StepOutcome> {
        match self {
            Self::Mock(e) => e.step(action).await,
            Self::Http(e) => e.step(action).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Mock(e) => e.name(),
            Self::Http(e) => e.name(),
        }
    }

    fn actions(&self) -> &ActionSet {
        match self {
            Self::Mock(e) => e.actions(),
            Self::Http(e) => e.actions(),
        }
    }

    fn enforces_step_limit(&self) -> bool {
        match self {
            Self::Mock(e) => e.enforces_step_limit(),
            Self::Http(e) => e.enforces_step_limit(),
        }
    }

    fn render(&self, mode: RenderMode) -> Option<String> {
        match self {
            Self::Mock(e) => e.render(mode),
            Self::Http(e) => e.render(mode),
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        match self {
            Self::Mock(e) => e.close().await,
            Self::Http(e) => e.close().await,
        }
    }
}
