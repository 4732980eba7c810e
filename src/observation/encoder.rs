//! Per-channel encoding of raw observations into line-delimited-JSON values.
//!
//! The encoder is stateless apart from the [`EncodeContext`], which carries the
//! turn index (for error reports and image file names) and the trajectory's
//! output directory (where image side-files land).

use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use serde_json::Value;

use super::channel::{channel_kind, ChannelKind};
use super::raw::{element_count, RawObservation};
use crate::error::{TraceError, TraceResult};

/// Where and when a channel is being encoded.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub turn: u64,
    pub output_dir: &'a Path,
}

/// Encode one named channel.
///
/// Channels whose name is unknown, or whose raw value does not fit the kind
/// registered for the name, are passed through in their shape-preserving JSON
/// form.
pub fn encode_channel(name: &str, raw: &RawObservation, ctx: &EncodeContext<'_>) -> TraceResult<Value> {
    match (channel_kind(name), raw) {
        (Some(ChannelKind::Grid), RawObservation::Bytes { shape, data }) => {
            encode_grid(name, shape, data, ctx.turn).map(Value::String)
        }
        (Some(ChannelKind::TextList), RawObservation::Bytes { shape, data }) => {
            let items = encode_text_list(name, shape, data, ctx.turn)?;
            Ok(Value::Array(items.into_iter().map(Value::String).collect()))
        }
        (Some(ChannelKind::Message), RawObservation::Bytes { data, .. }) => {
            encode_message(name, data, ctx.turn).map(Value::String)
        }
        (
            Some(ChannelKind::Image),
            RawObservation::Pixels {
                width,
                height,
                data,
            },
        ) => write_image(name, *width, *height, data, ctx).map(Value::String),
        (Some(ChannelKind::Numeric), _) => raw.to_nested_json().ok_or_else(|| {
            TraceError::decode(name, ctx.turn, "flat data length does not match shape")
        }),
        _ => Ok(passthrough(raw)),
    }
}

fn passthrough(raw: &RawObservation) -> Value {
    raw.to_nested_json()
        .unwrap_or_else(|| serde_json::to_value(raw).unwrap_or(Value::Null))
}

/// Decode one fixed-width byte cell: UTF-8, NULs removed, whitespace trimmed.
pub fn decode_cell(bytes: &[u8]) -> Result<String, std::str::Utf8Error> {
    let text = std::str::from_utf8(bytes)?;
    Ok(text.replace('\0', "").trim().to_string())
}

/// Decode a 2-D byte grid into its newline-joined row form.
pub fn encode_grid(channel: &str, shape: &[usize], data: &[u8], turn: u64) -> TraceResult<String> {
    let (rows, cols) = match shape {
        [rows, cols] if *rows > 0 && *cols > 0 && rows.checked_mul(*cols) == Some(data.len()) => {
            (*rows, *cols)
        }
        _ => {
            return Err(TraceError::decode(
                channel,
                turn,
                format!("expected a non-empty rectangular grid, got shape {shape:?} with {} bytes", data.len()),
            ))
        }
    };

    let mut lines = Vec::with_capacity(rows);
    for row in data.chunks(cols) {
        let line = decode_cell(row).map_err(|e| TraceError::decode(channel, turn, e.to_string()))?;
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// Split a newline-joined grid back into its rows.
pub fn split_grid(grid: &str) -> Vec<&str> {
    grid.split('\n').collect()
}

/// Decode a text-list channel. The last dimension is the string width; a 1-D
/// buffer holds one single-byte string per element. Empty strings are dropped.
pub fn encode_text_list(
    channel: &str,
    shape: &[usize],
    data: &[u8],
    turn: u64,
) -> TraceResult<Vec<String>> {
    let width = if shape.len() <= 1 {
        1
    } else {
        shape[shape.len() - 1]
    };
    if width == 0 || element_count(shape) != Some(data.len()) {
        return Err(TraceError::decode(
            channel,
            turn,
            format!("shape {shape:?} does not match {} bytes", data.len()),
        ));
    }

    let mut items = Vec::new();
    for cell in data.chunks(width) {
        let item = decode_cell(cell).map_err(|e| TraceError::decode(channel, turn, e.to_string()))?;
        if !item.is_empty() {
            items.push(item);
        }
    }
    Ok(items)
}

/// Flatten a message buffer into one line. NUL bytes, other control
/// characters, and whitespace all become single spaces before the result is
/// trimmed.
pub fn encode_message(channel: &str, data: &[u8], turn: u64) -> TraceResult<String> {
    let text = std::str::from_utf8(data).map_err(|e| TraceError::decode(channel, turn, e.to_string()))?;
    Ok(normalize_message(text))
}

/// The text half of [`encode_message`]; a no-op on already-normalised input.
pub fn normalize_message(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() || c.is_whitespace() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// File name of an image side-file, relative to the trajectory directory.
pub fn image_file_name(channel: &str, turn: u64) -> String {
    format!("{channel}_path{turn}.jpg")
}

/// Interpret a row-major RGB or RGBA buffer as an RGB image.
pub fn rgb_image(width: u32, height: u32, data: &[u8]) -> Option<RgbImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    if pixels.checked_mul(3) == Some(data.len()) {
        RgbImage::from_raw(width, height, data.to_vec())
    } else if pixels.checked_mul(4) == Some(data.len()) {
        RgbaImage::from_raw(width, height, data.to_vec())
            .map(|rgba| DynamicImage::ImageRgba8(rgba).to_rgb8())
    } else {
        None
    }
}

fn write_image(
    channel: &str,
    width: u32,
    height: u32,
    data: &[u8],
    ctx: &EncodeContext<'_>,
) -> TraceResult<String> {
    let rgb = rgb_image(width, height, data).ok_or_else(|| {
        TraceError::decode(
            channel,
            ctx.turn,
            format!("{} bytes is not a {width}x{height} RGB or RGBA buffer", data.len()),
        )
    })?;

    std::fs::create_dir_all(ctx.output_dir).map_err(|e| TraceError::io(ctx.output_dir, e))?;
    let file_name = image_file_name(channel, ctx.turn);
    let path = ctx.output_dir.join(&file_name);
    rgb.save_with_format(&path, ImageFormat::Jpeg)
        .map_err(|source| TraceError::Image {
            path: path.clone(),
            source,
        })?;
    Ok(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(dir: &Path, turn: u64) -> EncodeContext<'_> {
        EncodeContext {
            turn,
            output_dir: dir,
        }
    }

    #[test]
    fn grid_rows_round_trip_through_newline_form() {
        let rows = ["-----", "|.@.|", "|..>|", "-----"];
        let raw = RawObservation::text_rows(&rows, 5);
        let dir = tempfile::tempdir().unwrap();

        let value = encode_channel("chars", &raw, &ctx(dir.path(), 0)).unwrap();
        let grid = value.as_str().unwrap();
        assert_eq!(split_grid(grid), rows.to_vec());
    }

    #[test]
    fn grid_strips_nul_padding_per_row() {
        let raw = RawObservation::text_rows(&["ab", "c"], 4);
        let dir = tempfile::tempdir().unwrap();
        let value = encode_channel("chars_crop", &raw, &ctx(dir.path(), 0)).unwrap();
        assert_eq!(value, json!("ab\nc"));
    }

    #[test]
    fn ragged_grid_is_a_decode_error() {
        let raw = RawObservation::Bytes {
            shape: vec![2, 3],
            data: vec![b'a'; 5],
        };
        let dir = tempfile::tempdir().unwrap();
        let err = encode_channel("tty_chars", &raw, &ctx(dir.path(), 4)).unwrap_err();
        match err {
            TraceError::Decode { channel, turn, .. } => {
                assert_eq!(channel, "tty_chars");
                assert_eq!(turn, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn overflowing_shapes_are_decode_errors() {
        let dir = tempfile::tempdir().unwrap();
        let huge_bytes = |shape: Vec<usize>| RawObservation::Bytes {
            shape,
            data: vec![b'a'; 8],
        };
        let cases = [
            ("chars", huge_bytes(vec![usize::MAX, 2])),
            ("inv_strs", huge_bytes(vec![usize::MAX, 2, 4])),
            ("glyphs_crop", RawObservation::ints(vec![usize::MAX, 2], vec![1, 2])),
            (
                "pixel_crop",
                RawObservation::Pixels {
                    width: u32::MAX,
                    height: u32::MAX,
                    data: vec![0; 12],
                },
            ),
        ];
        for (name, raw) in cases {
            match encode_channel(name, &raw, &ctx(dir.path(), 2)) {
                Err(TraceError::Decode { channel, turn, .. }) => {
                    assert_eq!(channel, name);
                    assert_eq!(turn, 2);
                }
                other => panic!("{name}: unexpected result {other:?}"),
            }
        }
        assert!(rgb_image(u32::MAX, u32::MAX, &[0; 12]).is_none());
    }

    #[test]
    fn invalid_utf8_names_channel_and_turn() {
        let raw = RawObservation::Bytes {
            shape: vec![1, 2],
            data: vec![0xff, 0xfe],
        };
        let dir = tempfile::tempdir().unwrap();
        let err = encode_channel("chars", &raw, &ctx(dir.path(), 9)).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("`chars`"));
        assert!(text.contains("turn 9"));
    }

    #[test]
    fn inventory_drops_empty_entries() {
        let raw = RawObservation::text_rows(&["sword", "", "shield"], 8);
        let dir = tempfile::tempdir().unwrap();
        let value = encode_channel("inv_strs", &raw, &ctx(dir.path(), 0)).unwrap();
        assert_eq!(value, json!(["sword", "shield"]));
    }

    #[test]
    fn one_dimensional_text_list_is_one_string_per_byte() {
        let raw = RawObservation::Bytes {
            shape: vec![4],
            data: vec![b'a', 0, b'b', 0],
        };
        let dir = tempfile::tempdir().unwrap();
        let value = encode_channel("inv_letters", &raw, &ctx(dir.path(), 0)).unwrap();
        assert_eq!(value, json!(["a", "b"]));
    }

    #[test]
    fn message_is_flattened_and_trimmed() {
        let mut data = b"Hello\0Agent, welcome.\n".to_vec();
        data.resize(32, 0);
        let raw = RawObservation::Bytes {
            shape: vec![32],
            data,
        };
        let dir = tempfile::tempdir().unwrap();
        let value = encode_channel("message", &raw, &ctx(dir.path(), 0)).unwrap();
        assert_eq!(value, json!("Hello Agent, welcome."));
        assert!(!value.as_str().unwrap().contains('\0'));
    }

    #[test]
    fn normalizing_a_clean_message_is_a_no_op() {
        let clean = "You see here a scroll labeled FOOBIE BLETCH.";
        assert_eq!(normalize_message(clean), clean);
        assert_eq!(normalize_message(&normalize_message("  x\0y ")), "x y");
    }

    #[test]
    fn numeric_channels_keep_shape() {
        let raw = RawObservation::ints(vec![2, 2], vec![1, -2, 3, 4]);
        let dir = tempfile::tempdir().unwrap();
        let value = encode_channel("glyphs_crop", &raw, &ctx(dir.path(), 0)).unwrap();
        assert_eq!(value, json!([[1, -2], [3, 4]]));
    }

    #[test]
    fn image_channel_writes_side_file_and_returns_path() {
        let raw = RawObservation::Pixels {
            width: 4,
            height: 2,
            data: vec![128; 4 * 2 * 3],
        };
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("traj");

        let value = encode_channel("pixel_crop", &raw, &ctx(&out, 3)).unwrap();
        assert_eq!(value, json!("pixel_crop_path3.jpg"));
        assert!(out.join("pixel_crop_path3.jpg").is_file());
    }

    #[test]
    fn unknown_channels_pass_through() {
        let raw = RawObservation::Json {
            value: json!({"depth": 1}),
        };
        let dir = tempfile::tempdir().unwrap();
        let value = encode_channel("internal", &raw, &ctx(dir.path(), 0)).unwrap();
        assert_eq!(value, json!({"depth": 1}));

        let bytes = RawObservation::Bytes {
            shape: vec![2],
            data: vec![1, 2],
        };
        let value = encode_channel("program_state", &bytes, &ctx(dir.path(), 0)).unwrap();
        assert_eq!(value, json!([1, 2]));
    }
}
