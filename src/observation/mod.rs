//! Observation channels and their JSON encoding.
//!
//! - [`channel`] -- the static channel-name to [`ChannelKind`] registry.
//! - [`raw`] -- [`RawObservation`] values as environments emit them.
//! - [`encoder`] -- per-kind encoding into log-ready JSON values.

pub mod channel;
pub mod encoder;
pub mod raw;

pub use channel::{channel_kind, is_image_channel, known_channel_names, ChannelKind, KNOWN_CHANNELS};
pub use encoder::{encode_channel, split_grid, EncodeContext};
pub use raw::{ObservationBundle, RawObservation};
