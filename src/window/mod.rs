//! Instruction-tuning templates built from a trajectory log.
//!
//! - [`template`] -- the fixed state-block and instruction layouts.
//! - [`windower`] -- the rolling window and the JSON-lines export.

pub mod template;
pub mod windower;

pub use windower::{export_templates, RenderedTemplate, WindowContext};
