use anyhow::Result;
use tract_onnx::prelude::tract_ndarray::ArrayView1;

use crate::detect::types::BoundingBox;
use crate::error::RecognizerError;
use crate::model::LayerOutput;

/// Number of leading columns before the class scores: box (4) + objectness.
const BOX_COLUMNS: usize = 5;

/// Turn raw layer rows into candidate boxes.
///
/// Each row picks its best class; rows whose best score exceeds `threshold`
/// become candidates. Normalized coordinates are scaled by the original
/// frame size, not the network input size. Boxes are left unclipped.
pub fn decode_outputs(
    outputs: &[LayerOutput],
    frame_width: u32,
    frame_height: u32,
    num_classes: usize,
    threshold: f32,
) -> Result<Vec<BoundingBox>> {
    let expected = BOX_COLUMNS + num_classes;
    let width = frame_width as f32;
    let height = frame_height as f32;
    let mut candidates = Vec::new();

    for (layer, output) in outputs.iter().enumerate() {
        if output.nrows() > 0 && output.ncols() != expected {
            return Err(RecognizerError::model_output(format!(
                "layer {} rows have {} columns, expected {} for {} classes",
                layer,
                output.ncols(),
                expected,
                num_classes
            )));
        }

        for row in output.rows() {
            let Some((class_id, confidence)) = best_class(row) else {
                continue;
            };
            if confidence <= threshold {
                continue;
            }

            let center_x = (row[0] * width) as i32;
            let center_y = (row[1] * height) as i32;
            let w = (row[2] * width) as i32;
            let h = (row[3] * height) as i32;
            let x = (center_x as f32 - w as f32 / 2.0) as i32;
            let y = (center_y as f32 - h as f32 / 2.0) as i32;

            candidates.push(BoundingBox {
                x,
                y,
                w,
                h,
                class_id,
                confidence,
            });
        }
    }

    Ok(candidates)
}

/// Arg-max over the class scores of one row. Ties keep the lowest class id.
fn best_class(row: ArrayView1<'_, f32>) -> Option<(usize, f32)> {
    row.iter()
        .skip(BOX_COLUMNS)
        .enumerate()
        .fold(None, |best, (class_id, &score)| match best {
            Some((_, current)) if score <= current => best,
            _ => Some((class_id, score)),
        })
}
