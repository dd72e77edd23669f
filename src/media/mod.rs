//! Media controller: runs the recognizer over single images, video files and
//! cameras, and persists annotated artifacts.
//!
//! Annotated outputs are named `DETECTED_{name}` inside the artifacts
//! directory. Video runs go through a `CaptureSession`, which owns the
//! capture and writer handles for the duration of one job.

mod preview;
mod session;
mod writer;
#[cfg(feature = "ingest-file-ffmpeg")]
mod writer_ffmpeg;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};

pub use preview::Preview;
pub use session::CaptureSession;
pub use writer::{FrameSink, VideoWriter, WriterSettings};

use crate::config::{RecognizerConfig, VideoSettings};
use crate::detect::{Detection, Recognizer};
use crate::error::RecognizerError;
use crate::ingest::{CameraConfig, CameraSource, FileConfig, FileSource, FrameSource};

/// Prefix of every annotated artifact.
pub const DETECTED_PREFIX: &str = "DETECTED_";
/// Prefix of raw video uploads kept next to their results.
pub const UPLOADED_PREFIX: &str = "uploaded_";
/// Output name used when a camera run is persisted.
pub const CAMERA_OUTPUT_NAME: &str = "camera.mp4";

/// Result of a single-image job.
pub struct ImageReport {
    pub detections: Vec<Detection>,
    /// The image with boxes drawn on it (unchanged when nothing was found).
    pub image: RgbImage,
    pub saved_to: Option<PathBuf>,
}

pub struct MediaController {
    recognizer: Arc<Recognizer>,
    artifacts_dir: PathBuf,
    video: VideoSettings,
}

impl MediaController {
    pub fn new(recognizer: Arc<Recognizer>, artifacts_dir: PathBuf, video: VideoSettings) -> Self {
        Self {
            recognizer,
            artifacts_dir,
            video,
        }
    }

    pub fn from_config(recognizer: Arc<Recognizer>, cfg: &RecognizerConfig) -> Self {
        Self::new(recognizer, cfg.artifacts_dir.clone(), cfg.video.clone())
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn video_settings(&self) -> &VideoSettings {
        &self.video
    }

    /// Where the annotated artifact for `name` is written.
    pub fn output_path(&self, name: &str) -> Result<PathBuf> {
        let name = artifact_name(name)?;
        Ok(self
            .artifacts_dir
            .join(format!("{DETECTED_PREFIX}{name}")))
    }

    /// Where a raw upload named `name` is kept.
    pub fn upload_path(&self, name: &str) -> Result<PathBuf> {
        let name = artifact_name(name)?;
        Ok(self.artifacts_dir.join(format!("{UPLOADED_PREFIX}{name}")))
    }

    /// Detect objects in an already decoded image, optionally persisting the
    /// annotated result as `DETECTED_{persist_as}`.
    pub fn detect_image(
        &self,
        mut image: RgbImage,
        persist_as: Option<&str>,
    ) -> Result<ImageReport> {
        let detections = self.recognizer.detect(&mut image)?;
        let saved_to = match persist_as {
            Some(name) => Some(self.save_image(&image, name)?),
            None => None,
        };
        log::info!(
            "image job: {} detections{}",
            detections.len(),
            saved_to
                .as_ref()
                .map(|p| format!(", saved {}", p.display()))
                .unwrap_or_default()
        );
        Ok(ImageReport {
            detections,
            image,
            saved_to,
        })
    }

    /// Decode encoded image bytes, then run `detect_image`.
    pub fn detect_image_bytes(
        &self,
        bytes: &[u8],
        persist_as: Option<&str>,
    ) -> Result<ImageReport> {
        let image = decode_image(bytes)?;
        self.detect_image(image, persist_as)
    }

    /// Read an image from disk. When `write` is set the result is persisted
    /// under the file's own name.
    pub fn detect_image_file(&self, path: &Path, write: bool) -> Result<ImageReport> {
        let bytes = std::fs::read(path).map_err(|e| {
            RecognizerError::decode(format!("failed to read image {}: {}", path.display(), e))
        })?;
        let name = file_name_of(path)?;
        self.detect_image_bytes(&bytes, write.then_some(name.as_str()))
    }

    /// Open a capture session over a local video file.
    pub fn open_video_file(&self, path: &Path, persist_as: Option<&str>) -> Result<CaptureSession> {
        let source = FileSource::open(FileConfig::new(path.to_string_lossy()))?;
        self.open_session(Box::new(source), persist_as)
    }

    /// Open a capture session over a camera device.
    pub fn open_camera(
        &self,
        config: CameraConfig,
        persist_as: Option<&str>,
    ) -> Result<CaptureSession> {
        let source = CameraSource::open(config)?;
        self.open_session(Box::new(source), persist_as)
    }

    /// Wrap an open source, adding a writer sized to its frames when
    /// `persist_as` is set.
    pub fn open_session(
        &self,
        source: Box<dyn FrameSource>,
        persist_as: Option<&str>,
    ) -> Result<CaptureSession> {
        let sink: Option<Box<dyn FrameSink>> = match persist_as {
            Some(name) => Some(Box::new(self.open_writer(source.as_ref(), name)?)),
            None => None,
        };
        Ok(CaptureSession::new(source, sink, self.video.frame_cap))
    }

    fn open_writer(&self, source: &dyn FrameSource, name: &str) -> Result<VideoWriter> {
        let (width, height) = source.frame_size().ok_or_else(|| {
            RecognizerError::configuration(format!(
                "frame size of {} is unknown, cannot open a writer",
                source.describe()
            ))
        })?;
        let path = self.output_path(name)?;
        VideoWriter::create(
            &path,
            WriterSettings {
                width,
                height,
                fps: self.video.output_fps,
                codec: self.video.codec.clone(),
            },
        )
    }

    /// Run the recognizer over every frame of `session` until the source
    /// ends or the frame cap is hit. Detections carry their 1-based frame
    /// index. `on_frame` sees each annotated frame after it was written.
    ///
    /// The session is released before returning, on success and on error.
    pub fn run_session<F>(
        &self,
        mut session: CaptureSession,
        mut on_frame: F,
    ) -> Result<Vec<Detection>>
    where
        F: FnMut(u32, &RgbImage, &[Detection]) -> Result<()>,
    {
        let origin = session.describe();
        let mut detections = Vec::new();
        while let Some((index, mut frame)) = session.next_frame()? {
            let found: Vec<Detection> = self
                .recognizer
                .detect(&mut frame)
                .with_context(|| format!("frame {index} of {origin}"))?
                .into_iter()
                .map(|d| d.with_frame(index))
                .collect();
            log::debug!("{origin}: frame {index}, {} detections", found.len());
            session.write_frame(&frame)?;
            on_frame(index, &frame, &found)?;
            detections.extend(found);
        }
        let frames = session.frames_read();
        let written = if session.is_writing() { ", written" } else { "" };
        session.release()?;
        log::info!(
            "video job {origin}: {frames} frames, {} detections{written}",
            detections.len()
        );
        Ok(detections)
    }

    /// Process a local video file, persisting the annotated clip as
    /// `DETECTED_{persist_as}` when given.
    pub fn detect_video_file(
        &self,
        path: &Path,
        persist_as: Option<&str>,
    ) -> Result<Vec<Detection>> {
        let session = self.open_video_file(path, persist_as)?;
        self.run_session(session, |_, _, _| Ok(()))
    }

    /// Process frames from a camera device up to the frame cap.
    pub fn detect_camera(&self, config: CameraConfig, write: bool) -> Result<Vec<Detection>> {
        let session = self.open_camera(config, write.then_some(CAMERA_OUTPUT_NAME))?;
        self.run_session(session, |_, _, _| Ok(()))
    }

    fn save_image(&self, image: &RgbImage, name: &str) -> Result<PathBuf> {
        let path = self.output_path(name)?;
        std::fs::create_dir_all(&self.artifacts_dir).with_context(|| {
            format!("create artifacts directory {}", self.artifacts_dir.display())
        })?;
        image
            .save_with_format(&path, output_format(&path))
            .with_context(|| format!("write annotated image {}", path.display()))?;
        Ok(path)
    }
}

/// Decode encoded image bytes into RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(RecognizerError::decode("image payload is empty"));
    }
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| RecognizerError::decode(format!("cannot decode image: {e}")))?;
    let image = decoded.to_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(RecognizerError::decode("decoded image has no pixels"));
    }
    Ok(image)
}

/// Reduce a client supplied name to a bare file name.
pub fn artifact_name(name: &str) -> Result<String> {
    let base = Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty());
    base.map(str::to_string).ok_or_else(|| {
        RecognizerError::decode(format!("'{name}' is not a usable file name"))
    })
}

fn file_name_of(path: &Path) -> Result<String> {
    artifact_name(&path.to_string_lossy())
}

fn output_format(path: &Path) -> ImageFormat {
    match ImageFormat::from_path(path) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Bmp)) => format,
        _ => ImageFormat::Png,
    }
}
