//! Local video file source.
//!
//! `FileSource` reads frames from a local video file. Real files are decoded
//! with FFmpeg (feature: ingest-file-ffmpeg); `stub://` paths produce a short
//! synthetic clip so the frame loop can be exercised without native codecs.
//!
//! The file source MUST NOT fetch remote URLs.

use anyhow::Result;
use image::RgbImage;

use super::synthetic::{synthetic_frame, SYNTHETIC_HEIGHT, SYNTHETIC_WIDTH};
use super::{is_stub, FrameSource};
#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::error::RecognizerError;

/// Length of a synthetic `stub://` clip.
pub const SYNTHETIC_CLIP_FRAMES: u64 = 12;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (e.g., "/outputs/uploaded_clip.mp4").
    pub path: String,
}

impl FileConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Local file frame source.
pub struct FileSource {
    path: String,
    backend: Option<FileBackend>,
    frames_read: u64,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Open the file. Fails for URLs, or for real files when FFmpeg support is
    /// not compiled in.
    pub fn open(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(RecognizerError::configuration(format!(
                "file capture only supports local paths, got '{}'",
                config.path
            )));
        }
        let backend = if is_stub(&config.path) {
            FileBackend::Synthetic(SyntheticFileSource::default())
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                FileBackend::Ffmpeg(FfmpegFileSource::open(&config.path)?)
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                return Err(RecognizerError::configuration(
                    "video file capture requires the ingest-file-ffmpeg feature",
                ));
            }
        };
        log::info!("FileSource: opened {}", config.path);
        Ok(Self {
            path: config.path,
            backend: Some(backend),
            frames_read: 0,
        })
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        self.path.clone()
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        match self.backend.as_ref()? {
            FileBackend::Synthetic(_) => Some((SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT)),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => Some(source.frame_size()),
        }
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame = match self.backend.as_mut() {
            None => return Ok(None),
            Some(FileBackend::Synthetic(source)) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            Some(FileBackend::Ffmpeg(source)) => source.next_frame()?,
        };
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    fn release(&mut self) -> Result<()> {
        if self.backend.take().is_some() {
            log::info!(
                "FileSource: released {} after {} frames",
                self.path,
                self.frames_read
            );
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.backend.is_none()
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

#[derive(Default)]
struct SyntheticFileSource {
    frame_count: u64,
}

impl SyntheticFileSource {
    fn next_frame(&mut self) -> Option<RgbImage> {
        if self.frame_count >= SYNTHETIC_CLIP_FRAMES {
            return None;
        }
        self.frame_count += 1;
        Some(synthetic_frame(self.frame_count))
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if is_stub(path) {
        return true;
    }
    !path.contains("://")
}
