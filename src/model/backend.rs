use anyhow::Result;
use tract_onnx::prelude::tract_ndarray::{Array2, Array4};

/// Batched NCHW input tensor, values scaled to [0, 1].
pub type InputTensor = Array4<f32>;

/// One terminal layer's rows: `(num_candidates, 5 + num_classes)`.
///
/// Columns are center-x, center-y, width, height (normalized to the input),
/// objectness, then one score per class.
pub type LayerOutput = Array2<f32>;

/// Inference backend trait.
///
/// A backend maps a preprocessed tensor to the raw outputs of the network's
/// unconnected layers. It is loaded once and then shared read-only between
/// invocations, so `forward` takes `&self` and implementations must be
/// `Send + Sync`.
pub trait InferenceBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run a forward pass.
    fn forward(&self, input: &InputTensor) -> Result<Vec<LayerOutput>>;

    /// Last-axis width of each output layer, when known before running.
    ///
    /// Used at load time to check the network against the label list.
    fn output_widths(&self) -> Vec<Option<usize>> {
        Vec::new()
    }
}
