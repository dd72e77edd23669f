use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use crate::model::backend::{InferenceBackend, InputTensor, LayerOutput};

/// Stub backend for testing. Returns the same canned layer outputs on every call.
pub struct StubBackend {
    outputs: Vec<LayerOutput>,
    calls: AtomicUsize,
}

impl StubBackend {
    pub fn new(outputs: Vec<LayerOutput>) -> Self {
        Self {
            outputs,
            calls: AtomicUsize::new(0),
        }
    }

    /// Build a single-layer stub from raw rows.
    ///
    /// Each row is `[cx, cy, w, h, objectness, class scores...]`.
    pub fn from_rows(rows: &[Vec<f32>]) -> Self {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let layer = LayerOutput::from_shape_vec((rows.len(), cols), flat)
            .unwrap_or_else(|_| LayerOutput::zeros((0, cols)));
        Self::new(vec![layer])
    }

    /// Number of forward passes served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn forward(&self, _input: &InputTensor) -> Result<Vec<LayerOutput>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.outputs.clone())
    }

    fn output_widths(&self) -> Vec<Option<usize>> {
        self.outputs.iter().map(|o| Some(o.ncols())).collect()
    }
}
