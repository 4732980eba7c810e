//! Buffering per-step frames and assembling them into a replay GIF.
//!
//! Frames are written as PNGs into a private temporary directory owned by the
//! [`FrameBuffer`]. The directory is removed when the buffer is dropped, which
//! happens on every exit path: after assembly, on an assembly error, or when
//! the episode loop bails out early.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat};
use tempfile::TempDir;

use crate::error::{TraceError, TraceResult};
use crate::observation::encoder::rgb_image;
use crate::observation::RawObservation;

/// Channel buffered for GIF frames.
pub const GIF_CHANNEL: &str = "pixel_crop";

#[derive(Debug)]
pub struct FrameBuffer {
    dir: TempDir,
    frames: usize,
}

impl FrameBuffer {
    pub fn new() -> TraceResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("gridtrace-frames-")
            .tempdir()
            .map_err(|e| TraceError::io(std::env::temp_dir(), e))?;
        Ok(Self { dir, frames: 0 })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn len(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Save one frame as `e_<episode>_s_<step>.png`.
    pub fn save_frame(&mut self, episode: u64, step: usize, frame: &RawObservation) -> TraceResult<PathBuf> {
        let path = self.dir.path().join(format!("e_{episode}_s_{step}.png"));
        let RawObservation::Pixels {
            width,
            height,
            data,
        } = frame
        else {
            return Err(TraceError::decode(GIF_CHANNEL, step as u64, "GIF frames need a pixel buffer"));
        };
        let image = rgb_image(*width, *height, data).ok_or_else(|| {
            TraceError::decode(GIF_CHANNEL, step as u64, "pixel buffer does not match its dimensions")
        })?;
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|source| TraceError::Image {
                path: path.clone(),
                source,
            })?;
        self.frames += 1;
        Ok(path)
    }

    /// Write every buffered frame, oldest modification time first, into one
    /// looping GIF at `gif_path`. Returns the number of frames written.
    pub fn assemble(self, gif_path: &Path, frame_duration_ms: u32) -> TraceResult<usize> {
        let paths = frames_by_mtime(self.dir.path())?;
        if paths.is_empty() {
            return Err(TraceError::EmptyFrameSet);
        }

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            let image = image::open(path).map_err(|source| TraceError::Image {
                path: path.clone(),
                source,
            })?;
            frames.push(Frame::from_parts(
                image.to_rgba8(),
                0,
                0,
                Delay::from_numer_denom_ms(frame_duration_ms, 1),
            ));
        }

        if let Some(parent) = gif_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TraceError::io(parent, e))?;
        }
        let file = File::create(gif_path).map_err(|e| TraceError::io(gif_path, e))?;
        let gif_error = |source| TraceError::Image {
            path: gif_path.to_path_buf(),
            source,
        };
        let mut encoder = GifEncoder::new(file);
        encoder.set_repeat(Repeat::Infinite).map_err(gif_error)?;
        encoder.encode_frames(frames).map_err(gif_error)?;

        Ok(paths.len())
    }
}

/// Buffered frame files in `dir`, ordered by ascending modification time.
/// Frames sharing a timestamp fall back to numeric `(episode, step)` order.
pub fn frames_by_mtime(dir: &Path) -> TraceResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| TraceError::io(dir, e))?;
    let mut frames: Vec<(SystemTime, (u64, usize), PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TraceError::io(dir, e))?;
        let Some(key) = parse_frame_name(&entry.file_name().to_string_lossy()) else {
            continue;
        };
        let path = entry.path();
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| TraceError::io(&path, e))?;
        frames.push((modified, key, path));
    }
    frames.sort();
    Ok(frames.into_iter().map(|(_, _, path)| path).collect())
}

/// `(episode, step)` of a file named `e_<episode>_s_<step>.png`.
fn parse_frame_name(name: &str) -> Option<(u64, usize)> {
    let rest = name.strip_prefix("e_")?.strip_suffix(".png")?;
    let (episode, step) = rest.split_once("_s_")?;
    Some((episode.parse().ok()?, step.parse().ok()?))
}
