//! Raw observation values as produced by an environment backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step's worth of observation channels, keyed by channel name.
pub type ObservationBundle = BTreeMap<String, RawObservation>;

/// A raw channel value with its shape made explicit.
///
/// Arrays are stored flat in row-major order; `shape` gives the dimensions.
/// Byte arrays that hold text use their last dimension as the string width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawObservation {
    Bytes { shape: Vec<usize>, data: Vec<u8> },
    Ints { shape: Vec<usize>, data: Vec<i64> },
    Floats { shape: Vec<usize>, data: Vec<f64> },
    /// Row-major RGB (3 bytes per pixel) or RGBA (4 bytes per pixel).
    Pixels { width: u32, height: u32, data: Vec<u8> },
    /// Anything else, carried opaquely.
    Json { value: Value },
}

impl RawObservation {
    /// Build a `rows x width` byte grid from text rows, padding each row with
    /// NUL bytes (and truncating rows that are too long).
    pub fn text_rows<S: AsRef<str>>(rows: &[S], width: usize) -> Self {
        let mut data = Vec::with_capacity(rows.len() * width);
        for row in rows {
            let bytes = row.as_ref().as_bytes();
            let take = bytes.len().min(width);
            data.extend_from_slice(&bytes[..take]);
            data.resize(data.len() + (width - take), 0);
        }
        Self::Bytes {
            shape: vec![rows.len(), width],
            data,
        }
    }

    /// A 1-D NUL-padded byte buffer, as used for the message channel.
    pub fn text_buffer(text: &str, len: usize) -> Self {
        let mut data: Vec<u8> = text.as_bytes().iter().copied().take(len).collect();
        data.resize(len, 0);
        Self::Bytes {
            shape: vec![len],
            data,
        }
    }

    pub fn ints(shape: Vec<usize>, data: Vec<i64>) -> Self {
        Self::Ints { shape, data }
    }

    /// Shape-preserving JSON conversion used for numeric channels and for
    /// values the encoder does not otherwise interpret.
    ///
    /// Returns `None` when the flat data length does not match the shape.
    pub fn to_nested_json(&self) -> Option<Value> {
        match self {
            Self::Bytes { shape, data } => nest(shape, data, &|v| Value::from(v)),
            Self::Ints { shape, data } => nest(shape, data, &|v| Value::from(v)),
            Self::Floats { shape, data } => nest(shape, data, &|v| {
                serde_json::Number::from_f64(v)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }),
            Self::Pixels {
                width,
                height,
                data,
            } => {
                let (w, h) = (*width as usize, *height as usize);
                let px = w.checked_mul(h)?;
                if px == 0 || data.len() % px != 0 {
                    return None;
                }
                nest(&[h, w, data.len() / px], data, &|v| Value::from(v))
            }
            Self::Json { value } => Some(value.clone()),
        }
    }
}

/// Number of elements a shape describes, or `None` if it overflows `usize`.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
}

fn nest<T: Copy>(shape: &[usize], data: &[T], leaf: &dyn Fn(T) -> Value) -> Option<Value> {
    if element_count(shape) != Some(data.len()) {
        return None;
    }
    Some(nest_exact(shape, data, leaf))
}

fn nest_exact<T: Copy>(shape: &[usize], data: &[T], leaf: &dyn Fn(T) -> Value) -> Value {
    match shape.split_first() {
        None => data.first().map(|v| leaf(*v)).unwrap_or(Value::Null),
        // The trailing dimensions of an empty axis may not have a finite product.
        Some((0, _)) => Value::Array(Vec::new()),
        Some((&len, rest)) => {
            let stride: usize = rest.iter().product();
            Value::Array(
                (0..len)
                    .map(|i| nest_exact(rest, &data[i * stride..(i + 1) * stride], leaf))
                    .collect(),
            )
        }
    }
}
