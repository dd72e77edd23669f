use std::path::{Path, PathBuf};

use anyhow::Result;
use image::imageops::{self, FilterType};
use image::RgbImage;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::writer_ffmpeg::FfmpegVideoWriter;
use crate::error::RecognizerError;

/// Destination for processed frames.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and close. Further writes fail.
    fn release(&mut self) -> Result<()>;

    fn is_released(&self) -> bool;
}

/// Parameters for a persisted clip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Four character codec tag, e.g. "mp4v".
    pub codec: String,
}

/// Video file writer. Frames of another size are scaled to the clip size.
pub struct VideoWriter {
    path: PathBuf,
    settings: WriterSettings,
    backend: Option<WriterBackend>,
    frames_written: u64,
}

enum WriterBackend {
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegVideoWriter),
}

impl WriterBackend {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        match *self {
            #[cfg(feature = "ingest-file-ffmpeg")]
            Self::Ffmpeg(ref mut writer) => writer.write_frame(frame),
        }
    }

    fn finish(self) -> Result<()> {
        match self {
            #[cfg(feature = "ingest-file-ffmpeg")]
            Self::Ffmpeg(writer) => writer.finish(),
        }
    }
}

impl VideoWriter {
    pub fn create(path: &Path, settings: WriterSettings) -> Result<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(RecognizerError::configuration(format!(
                "cannot write a {}x{} video",
                settings.width, settings.height
            )));
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            let backend = WriterBackend::Ffmpeg(FfmpegVideoWriter::create(path, &settings)?);
            log::info!(
                "VideoWriter: writing {} ({}x{} @ {} fps, {})",
                path.display(),
                settings.width,
                settings.height,
                settings.fps,
                settings.codec
            );
            Ok(Self {
                path: path.to_path_buf(),
                settings,
                backend: Some(backend),
                frames_written: 0,
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(RecognizerError::configuration(format!(
                "writing {} requires the ingest-file-ffmpeg feature",
                path.display()
            )))
        }
    }
}

impl FrameSink for VideoWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let (width, height) = (self.settings.width, self.settings.height);
        let backend = self.backend.as_mut().ok_or_else(|| {
            anyhow::anyhow!("video writer for {} is already released", self.path.display())
        })?;
        if frame.dimensions() == (width, height) {
            backend.write_frame(frame)?;
        } else {
            let resized = imageops::resize(frame, width, height, FilterType::Triangle);
            backend.write_frame(&resized)?;
        }
        self.frames_written += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if let Some(backend) = self.backend.take() {
            backend.finish()?;
            log::info!(
                "VideoWriter: closed {} after {} frames",
                self.path.display(),
                self.frames_written
            );
        }
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.backend.is_none()
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            log::warn!("VideoWriter: failed to close {}: {}", self.path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(width: u32) -> WriterSettings {
        WriterSettings {
            width,
            height: 480,
            fps: 5,
            codec: "mp4v".to_string(),
        }
    }

    #[test]
    fn rejects_empty_frame_size() {
        assert!(VideoWriter::create(Path::new("/tmp/out.mp4"), settings(0)).is_err());
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    #[test]
    fn writing_needs_ffmpeg() {
        let err = VideoWriter::create(Path::new("/tmp/out.mp4"), settings(640))
            .err()
            .expect("writer without ffmpeg must fail");
        assert!(err.to_string().contains("ingest-file-ffmpeg"));
    }
}
