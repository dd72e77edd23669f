use std::sync::Arc;

use anyhow::Result;
use image::RgbImage;

use super::annotate::Annotator;
use super::decode::decode_outputs;
use super::nms::suppress;
use super::preprocess::Preprocessor;
use super::types::Detection;
use crate::config::{RecognizerConfig, Thresholds};
use crate::error::RecognizerError;
use crate::model::ModelHandle;

/// Runs the per-frame pipeline: preprocess, infer, decode, suppress, annotate.
///
/// Holds no per-call state, so a single instance can be shared across
/// threads. The model handle is never mutated after loading.
pub struct Recognizer {
    model: Arc<ModelHandle>,
    preprocessor: Preprocessor,
    thresholds: Thresholds,
    annotator: Annotator,
}

impl Recognizer {
    pub fn new(model: Arc<ModelHandle>, thresholds: Thresholds, annotator: Annotator) -> Self {
        let preprocessor = Preprocessor::for_model(model.spec());
        Self {
            model,
            preprocessor,
            thresholds,
            annotator,
        }
    }

    /// Load the model and annotator described by `cfg`.
    pub fn from_config(cfg: &RecognizerConfig) -> Result<Self> {
        let model = ModelHandle::load(&cfg.model)?;
        log::info!(
            "model loaded from {} ({} labels, backend {})",
            cfg.model.dir.display(),
            model.num_classes(),
            model.backend_name()
        );
        let annotator = Annotator::new(cfg.palette, cfg.font_path.as_deref())?;
        if !annotator.has_font() {
            log::warn!("no label font found, boxes are drawn without text");
        }
        let recognizer = Self::new(Arc::new(model), cfg.thresholds, annotator);
        let size = recognizer.preprocessor.size();
        log::info!("network input {size}x{size}");
        Ok(recognizer)
    }

    /// Detect objects in `image`, drawing results onto it.
    ///
    /// Returns an empty list without touching the image when nothing
    /// survives suppression.
    pub fn detect(&self, image: &mut RgbImage) -> Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(RecognizerError::decode("frame has no pixels"));
        }

        let tensor = self.preprocessor.run(image);
        let outputs = self.model.forward(&tensor)?;
        let candidates = decode_outputs(
            &outputs,
            width,
            height,
            self.model.num_classes(),
            self.thresholds.confidence,
        )?;
        let keep = suppress(
            &candidates,
            self.thresholds.nms_score,
            self.thresholds.nms_iou,
        );
        log::debug!(
            "{} candidates above threshold, {} kept after suppression",
            candidates.len(),
            keep.len()
        );
        if keep.is_empty() {
            return Ok(Vec::new());
        }

        self.annotator
            .annotate(image, &candidates, &keep, self.model.labels())
    }
}
