use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::error::RecognizerError;
use crate::model::backend::{InferenceBackend, InputTensor, LayerOutput};

/// Tract-based backend for ONNX inference.
///
/// Loads a local model file once and runs the optimized plan on every call.
/// The plan is immutable after construction, so one instance can serve
/// concurrent callers.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>,
    input_size: u32,
    output_widths: Vec<Option<usize>>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for square inputs of `input_size`.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let optimized = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| {
                RecognizerError::configuration(format!(
                    "failed to load ONNX model from {}: {}",
                    model_path.display(),
                    e
                ))
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_size as usize, input_size as usize),
                ),
            )
            .and_then(|model| model.into_optimized())
            .map_err(|e| {
                RecognizerError::configuration(format!(
                    "model {} does not accept a 1x3x{}x{} input: {}",
                    model_path.display(),
                    input_size,
                    input_size,
                    e
                ))
            })?;

        let output_widths = optimized
            .output_outlets()
            .map(|outlets| {
                outlets
                    .iter()
                    .map(|outlet| {
                        optimized
                            .outlet_fact(*outlet)
                            .ok()
                            .and_then(|fact| {
                                fact.shape.as_concrete().and_then(|s| s.last().copied())
                            })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let model = optimized
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({}x{} input, {} output layers)",
            model_path.display(),
            input_size,
            input_size,
            model.model().output_outlets().map(|o| o.len()).unwrap_or(0)
        );

        Ok(Self {
            model,
            input_size,
            output_widths,
        })
    }

    fn layer_rows(output: &TValue) -> Result<LayerOutput> {
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let cols = view
            .shape()
            .last()
            .copied()
            .ok_or_else(|| anyhow!("model output tensor is a scalar"))?;
        let rows = if cols == 0 { 0 } else { view.len() / cols };
        let flat: Vec<f32> = view.iter().copied().collect();
        tract_ndarray::Array2::from_shape_vec((rows, cols), flat)
            .context("failed to reshape model output into rows")
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn forward(&self, input: &InputTensor) -> Result<Vec<LayerOutput>> {
        let expected = [1, 3, self.input_size as usize, self.input_size as usize];
        if input.shape() != expected {
            return Err(anyhow!(
                "input tensor shape {:?} does not match model input {:?}",
                input.shape(),
                expected
            ));
        }
        let tensor: Tensor = input.clone().into_tensor();
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        outputs.iter().map(Self::layer_rows).collect()
    }

    fn output_widths(&self) -> Vec<Option<usize>> {
        self.output_widths.clone()
    }
}
