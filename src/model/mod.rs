//! Model loading and inference backends.
//!
//! A `ModelHandle` bundles an inference backend with the ordered label list
//! (index = class id) and the small config describing the network's input.
//! It is built once at start-up and shared read-only afterwards.

mod backend;
mod backends;
mod loader;

pub use backend::{InferenceBackend, InputTensor, LayerOutput};
pub use backends::{StubBackend, TractBackend};
pub use loader::{load_labels, load_model_spec};

use anyhow::Result;
use serde::Deserialize;

use crate::config::ModelFiles;
use crate::error::RecognizerError;

/// Square input edge used by the bundled yolov3-320 network.
pub const DEFAULT_INPUT_SIZE: u32 = 320;

/// Channel order the network was trained on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Sidecar description of the network, read from the model config file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    pub input_size: u32,
    pub channel_order: ChannelOrder,
    /// Declared class count; checked against the label file when present.
    pub num_classes: Option<usize>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            channel_order: ChannelOrder::Rgb,
            num_classes: None,
        }
    }
}

/// Loaded network plus its labels. Read-only after construction.
pub struct ModelHandle {
    backend: Box<dyn InferenceBackend>,
    labels: Vec<String>,
    spec: ModelSpec,
}

impl ModelHandle {
    /// Assemble a handle, checking that backend, labels and spec agree.
    pub fn new(
        backend: Box<dyn InferenceBackend>,
        labels: Vec<String>,
        spec: ModelSpec,
    ) -> Result<Self> {
        if labels.is_empty() {
            return Err(RecognizerError::configuration("label list is empty"));
        }
        if spec.input_size == 0 {
            return Err(RecognizerError::configuration(
                "model input size must be greater than zero",
            ));
        }
        if let Some(declared) = spec.num_classes {
            if declared != labels.len() {
                return Err(RecognizerError::configuration(format!(
                    "model config declares {} classes but the label file lists {}",
                    declared,
                    labels.len()
                )));
            }
        }
        let expected_width = 5 + labels.len();
        for (layer, width) in backend.output_widths().into_iter().enumerate() {
            if let Some(width) = width {
                if width != expected_width {
                    return Err(RecognizerError::configuration(format!(
                        "output layer {} has width {}, expected {} for {} labels",
                        layer,
                        width,
                        expected_width,
                        labels.len()
                    )));
                }
            }
        }
        Ok(Self {
            backend,
            labels,
            spec,
        })
    }

    /// Load weights, model config and labels from `files`.
    pub fn load(files: &ModelFiles) -> Result<Self> {
        let spec = load_model_spec(&files.config_path())?;
        let labels = load_labels(&files.labels_path())?;
        let weights = files.weights_path();
        if !weights.is_file() {
            return Err(RecognizerError::configuration(format!(
                "model weights not found at {}",
                weights.display()
            )));
        }
        let backend = TractBackend::new(&weights, spec.input_size)?;
        Self::new(Box::new(backend), labels, spec)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run the network on a preprocessed tensor.
    pub fn forward(&self, input: &InputTensor) -> Result<Vec<LayerOutput>> {
        self.backend.forward(input)
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("backend", &self.backend.name())
            .field("labels", &self.labels.len())
            .field("spec", &self.spec)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("class{i}")).collect()
    }

    /// Model directory holding a label file and a model config, no weights.
    fn model_dir(config: Option<&str>) -> (tempfile::TempDir, ModelFiles) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("coco.names"), "person\ncar\n").unwrap();
        if let Some(config) = config {
            std::fs::write(dir.path().join("yolov3.json"), config).unwrap();
        }
        let files = ModelFiles {
            dir: dir.path().to_path_buf(),
            ..ModelFiles::default()
        };
        (dir, files)
    }

    fn assert_configuration_error(result: Result<ModelHandle>) {
        let err = result.err().expect("model load must fail");
        assert!(
            matches!(classify(&err), Some(RecognizerError::Configuration(_))),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn load_fails_without_weights() {
        let (_dir, files) = model_dir(Some(r#"{"input_size": 320}"#));
        assert_configuration_error(ModelHandle::load(&files));
    }

    #[test]
    fn load_fails_without_model_config() {
        let (dir, files) = model_dir(None);
        std::fs::write(dir.path().join("yolov3.onnx"), b"weights").unwrap();
        assert_configuration_error(ModelHandle::load(&files));
    }

    #[test]
    fn load_fails_on_invalid_model_config() {
        let (dir, files) = model_dir(Some("{ input_size: "));
        std::fs::write(dir.path().join("yolov3.onnx"), b"weights").unwrap();
        assert_configuration_error(ModelHandle::load(&files));
    }

    #[test]
    fn load_fails_on_unparseable_onnx() {
        let (dir, files) = model_dir(Some("{}"));
        std::fs::write(dir.path().join("yolov3.onnx"), b"\x00\x01 not a protobuf graph").unwrap();
        assert_configuration_error(ModelHandle::load(&files));
    }

    #[test]
    fn rejects_mismatched_output_width() {
        let backend = StubBackend::from_rows(&[vec![0.0; 5 + 3]]);
        let err = ModelHandle::new(Box::new(backend), labels(2), ModelSpec::default()).unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(RecognizerError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_declared_class_count_mismatch() {
        let backend = StubBackend::from_rows(&[vec![0.0; 5 + 2]]);
        let spec = ModelSpec {
            num_classes: Some(80),
            ..ModelSpec::default()
        };
        assert!(ModelHandle::new(Box::new(backend), labels(2), spec).is_err());
    }

    #[test]
    fn label_lookup_follows_file_order() {
        let backend = StubBackend::from_rows(&[vec![0.0; 5 + 3]]);
        let handle = ModelHandle::new(Box::new(backend), labels(3), ModelSpec::default()).unwrap();
        assert_eq!(handle.label(0), Some("class0"));
        assert_eq!(handle.label(2), Some("class2"));
        assert_eq!(handle.label(3), None);
        assert_eq!(handle.backend_name(), "stub");
    }
}
