//! Static registry of the observation channels the recorder understands.
//!
//! Every known channel name maps to exactly one [`ChannelKind`]; the encoder
//! dispatches on the kind rather than on the runtime shape of a value.

use serde::{Deserialize, Serialize};

/// How a channel's raw value is turned into its logged form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Byte grid rendered as newline-joined rows of glyphs.
    Grid,
    /// Byte rows each decoded to one string; empty strings are dropped.
    TextList,
    /// Dense numeric array converted to a nested list of the same shape.
    Numeric,
    /// Pixel buffer persisted as a JPEG side-file; the log holds its path.
    Image,
    /// Message buffer flattened to a single line.
    Message,
}

/// Every channel a MiniHack-style environment can emit, in the order the
/// CLI lists them.
pub const KNOWN_CHANNELS: &[(&str, ChannelKind)] = &[
    ("glyphs", ChannelKind::Numeric),
    ("chars", ChannelKind::Grid),
    ("colors", ChannelKind::Numeric),
    ("specials", ChannelKind::Numeric),
    ("screen_descriptions", ChannelKind::TextList),
    ("pixel", ChannelKind::Image),
    ("blstats", ChannelKind::Numeric),
    ("message", ChannelKind::Message),
    ("inv_glyphs", ChannelKind::Numeric),
    ("inv_letters", ChannelKind::TextList),
    ("inv_oclasses", ChannelKind::TextList),
    ("inv_strs", ChannelKind::TextList),
    ("tty_chars", ChannelKind::Grid),
    ("tty_colors", ChannelKind::Numeric),
    ("tty_cursor", ChannelKind::Numeric),
    ("glyphs_crop", ChannelKind::Numeric),
    ("chars_crop", ChannelKind::Grid),
    ("colors_crop", ChannelKind::Numeric),
    ("specials_crop", ChannelKind::Numeric),
    ("pixel_crop", ChannelKind::Image),
    ("screen_descriptions_crop", ChannelKind::TextList),
    ("tty_chars_crop", ChannelKind::Grid),
    ("tty_colors_crop", ChannelKind::Numeric),
];

/// Look up the kind of a channel by name. Unknown names return `None` and
/// are passed through untouched by the encoder.
pub fn channel_kind(name: &str) -> Option<ChannelKind> {
    KNOWN_CHANNELS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, kind)| *kind)
}

/// Names of all known channels.
pub fn known_channel_names() -> impl Iterator<Item = &'static str> {
    KNOWN_CHANNELS.iter().map(|(name, _)| *name)
}

pub fn is_image_channel(name: &str) -> bool {
    channel_kind(name) == Some(ChannelKind::Image)
}
