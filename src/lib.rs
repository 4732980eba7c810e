//! gridtrace: record turn-based grid-game trajectories and rebuild them as
//! sliding-window instruction templates.
//!
//! Recording drives an [`env::Environment`] through the [`episode`] loop and
//! appends one JSON line per turn via the [`trajectory`] recorder. The
//! [`window`] module later streams such a log and renders the bounded
//! state-window templates used to build supervised datasets.

pub mod config;
pub mod env;
pub mod episode;
pub mod error;
pub mod observation;
pub mod trajectory;
pub mod window;
