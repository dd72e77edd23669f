//! Object Recognizer
//!
//! Runs a pretrained single-shot detector (YOLOv3, ONNX) over still images,
//! video files and camera streams, and exposes it over HTTP.
//!
//! # Pipeline
//!
//! Every frame goes through the same stages:
//!
//! 1. **Preprocess**: resize to the network input, order channels, scale to [0, 1].
//! 2. **Infer**: forward pass returning the raw output layers.
//! 3. **Decode**: per-row argmax and confidence threshold into candidate boxes.
//! 4. **Suppress**: class-agnostic non-maximum suppression.
//! 5. **Annotate**: draw boxes and labels, emit `Detection`s.
//!
//! # Module Structure
//!
//! - `config`: `RecognizerConfig` (file + environment)
//! - `model`: model loading and inference backends
//! - `detect`: pipeline stages and the `Recognizer`
//! - `ingest`: frame sources (video files, cameras, `stub://`)
//! - `media`: image/video jobs, capture sessions, video writer
//! - `api`: HTTP + WebSocket surface

pub mod api;
pub mod config;
pub mod detect;
pub mod error;
pub mod ingest;
pub mod media;
pub mod model;

pub use config::RecognizerConfig;
pub use detect::{BoundingBox, Detection, Recognizer};
pub use error::RecognizerError;
pub use ingest::{CameraConfig, CameraSource, FileConfig, FileSource, FrameSource};
pub use media::{CaptureSession, ImageReport, MediaController};
pub use model::{InferenceBackend, ModelHandle};
