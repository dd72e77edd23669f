use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::Palette;
use crate::error::RecognizerError;

const DEFAULT_MODEL_DIR: &str = "/artifacts";
const DEFAULT_ARTIFACTS_DIR: &str = "/outputs";
const DEFAULT_WEIGHTS: &str = "yolov3.onnx";
const DEFAULT_MODEL_CONFIG: &str = "yolov3.json";
const DEFAULT_LABELS: &str = "coco.names";
const DEFAULT_API_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_NMS_SCORE_THRESHOLD: f32 = 0.5;
const DEFAULT_NMS_IOU_THRESHOLD: f32 = 0.4;
pub const DEFAULT_FRAME_CAP: u32 = 20;
pub const DEFAULT_OUTPUT_FPS: u32 = 5;
pub const DEFAULT_CODEC: &str = "mp4v";

#[derive(Debug, Deserialize, Default)]
struct RecognizerConfigFile {
    model: Option<ModelConfigFile>,
    artifacts_dir: Option<PathBuf>,
    api_addr: Option<String>,
    thresholds: Option<ThresholdConfigFile>,
    video: Option<VideoConfigFile>,
    annotate: Option<AnnotateConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    dir: Option<PathBuf>,
    weights: Option<String>,
    config: Option<String>,
    labels: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    confidence: Option<f32>,
    nms_score: Option<f32>,
    nms_iou: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    frame_cap: Option<u32>,
    output_fps: Option<u32>,
    codec: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnotateConfigFile {
    palette: Option<String>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    pub model: ModelFiles,
    pub artifacts_dir: PathBuf,
    pub api_addr: String,
    pub thresholds: Thresholds,
    pub video: VideoSettings,
    pub palette: Palette,
    pub font_path: Option<PathBuf>,
}

/// Where the network, its config and the label list live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub dir: PathBuf,
    pub weights: String,
    pub config: String,
    pub labels: String,
}

impl ModelFiles {
    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(&self.weights)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(&self.config)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.dir.join(&self.labels)
    }
}

impl Default for ModelFiles {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_MODEL_DIR),
            weights: DEFAULT_WEIGHTS.to_string(),
            config: DEFAULT_MODEL_CONFIG.to_string(),
            labels: DEFAULT_LABELS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum class score for a row to become a candidate.
    pub confidence: f32,
    /// Score floor applied again inside NMS.
    pub nms_score: f32,
    /// Overlap above which the weaker of two boxes is dropped.
    pub nms_iou: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_score: DEFAULT_NMS_SCORE_THRESHOLD,
            nms_iou: DEFAULT_NMS_IOU_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSettings {
    /// Hard upper bound on frames processed per clip.
    pub frame_cap: u32,
    pub output_fps: u32,
    /// Four character codec tag for persisted clips.
    pub codec: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            frame_cap: DEFAULT_FRAME_CAP,
            output_fps: DEFAULT_OUTPUT_FPS,
            codec: DEFAULT_CODEC.to_string(),
        }
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            model: ModelFiles::default(),
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            api_addr: DEFAULT_API_ADDR.to_string(),
            thresholds: Thresholds::default(),
            video: VideoSettings::default(),
            palette: Palette::default(),
            font_path: None,
        }
    }
}

impl RecognizerConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("RECOGNIZER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RecognizerConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let model = file.model.unwrap_or_default();
        let thresholds = file.thresholds.unwrap_or_default();
        let video = file.video.unwrap_or_default();
        let annotate = file.annotate.unwrap_or_default();

        let palette = match annotate.palette.as_deref() {
            Some(name) => parse_palette(name)?,
            None => defaults.palette,
        };

        Ok(Self {
            model: ModelFiles {
                dir: model.dir.unwrap_or(defaults.model.dir),
                weights: model.weights.unwrap_or(defaults.model.weights),
                config: model.config.unwrap_or(defaults.model.config),
                labels: model.labels.unwrap_or(defaults.model.labels),
            },
            artifacts_dir: file.artifacts_dir.unwrap_or(defaults.artifacts_dir),
            api_addr: file.api_addr.unwrap_or(defaults.api_addr),
            thresholds: Thresholds {
                confidence: thresholds
                    .confidence
                    .unwrap_or(defaults.thresholds.confidence),
                nms_score: thresholds.nms_score.unwrap_or(defaults.thresholds.nms_score),
                nms_iou: thresholds.nms_iou.unwrap_or(defaults.thresholds.nms_iou),
            },
            video: VideoSettings {
                frame_cap: video.frame_cap.unwrap_or(defaults.video.frame_cap),
                output_fps: video.output_fps.unwrap_or(defaults.video.output_fps),
                codec: video.codec.unwrap_or(defaults.video.codec),
            },
            palette,
            font_path: annotate.font_path,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("CONFIG_DIR") {
            if !dir.trim().is_empty() {
                self.model.dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("ARTIFACTS_DIR") {
            if !dir.trim().is_empty() {
                self.artifacts_dir = PathBuf::from(dir);
            }
        }
        if let Ok(addr) = std::env::var("RECOGNIZER_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(cap) = std::env::var("RECOGNIZER_FRAME_CAP") {
            self.video.frame_cap = cap.trim().parse().map_err(|_| {
                RecognizerError::configuration("RECOGNIZER_FRAME_CAP must be a positive integer")
            })?;
        }
        if let Ok(fps) = std::env::var("RECOGNIZER_OUTPUT_FPS") {
            self.video.output_fps = fps.trim().parse().map_err(|_| {
                RecognizerError::configuration("RECOGNIZER_OUTPUT_FPS must be a positive integer")
            })?;
        }
        if let Ok(path) = std::env::var("RECOGNIZER_FONT_PATH") {
            if !path.trim().is_empty() {
                self.font_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(palette) = std::env::var("RECOGNIZER_PALETTE") {
            if !palette.trim().is_empty() {
                self.palette = parse_palette(&palette)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("confidence threshold", self.thresholds.confidence),
            ("nms score threshold", self.thresholds.nms_score),
            ("nms iou threshold", self.thresholds.nms_iou),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(RecognizerError::configuration(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if self.video.frame_cap == 0 {
            return Err(RecognizerError::configuration(
                "frame cap must be greater than zero",
            ));
        }
        if self.video.output_fps == 0 {
            return Err(RecognizerError::configuration(
                "output fps must be greater than zero",
            ));
        }
        if self.video.codec.len() != 4 || !self.video.codec.is_ascii() {
            return Err(RecognizerError::configuration(format!(
                "codec tag must be four ASCII characters, got '{}'",
                self.video.codec
            )));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<RecognizerConfigFile> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        RecognizerError::configuration(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let parsed = if is_toml {
        toml::from_str(&raw).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| {
        RecognizerError::configuration(format!("invalid config file {}: {}", path.display(), e))
    })
}

fn parse_palette(value: &str) -> Result<Palette> {
    match value.trim().to_ascii_lowercase().as_str() {
        "class" => Ok(Palette::ByClass),
        "random" => Ok(Palette::Random),
        other => Err(RecognizerError::configuration(format!(
            "unknown palette '{other}' (expected 'class' or 'random')"
        ))),
    }
}
