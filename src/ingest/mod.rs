//! Frame capture sources.
//!
//! This module provides sources for sequential frames:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Camera devices via V4L2 (feature: ingest-v4l2)
//! - Synthetic `stub://` sources for both (testing)
//!
//! Every source owns its underlying file or device handle until `release`
//! is called or the source is dropped. Releasing is idempotent.

pub mod camera;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
mod synthetic;

use anyhow::Result;
use image::RgbImage;

pub use camera::{CameraConfig, CameraSource};
pub use file::{FileConfig, FileSource};

/// A capture handle yielding frames in order.
pub trait FrameSource: Send {
    /// Human-readable origin (path or device), for logs.
    fn describe(&self) -> String;

    /// Frame dimensions, when known before the first read.
    fn frame_size(&self) -> Option<(u32, u32)>;

    /// Read the next frame. `Ok(None)` means the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Close the underlying handle. Further reads return `Ok(None)`.
    fn release(&mut self) -> Result<()>;

    fn is_released(&self) -> bool;
}

/// Synthetic path prefix accepted by every source.
pub(crate) const STUB_SCHEME: &str = "stub://";

pub(crate) fn is_stub(path: &str) -> bool {
    path.starts_with(STUB_SCHEME)
}
