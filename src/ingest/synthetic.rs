use image::{Rgb, RgbImage};

pub(crate) const SYNTHETIC_WIDTH: u32 = 640;
pub(crate) const SYNTHETIC_HEIGHT: u32 = 480;

const SQUARE: u32 = 96;

/// Deterministic test pattern: a bright square drifting across a gradient.
pub(crate) fn synthetic_frame(frame_index: u64) -> RgbImage {
    let span_x = (SYNTHETIC_WIDTH - SQUARE) as u64;
    let span_y = (SYNTHETIC_HEIGHT - SQUARE) as u64;
    let left = ((frame_index * 17) % span_x) as u32;
    let top = ((frame_index * 11) % span_y) as u32;

    RgbImage::from_fn(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, |x, y| {
        if (left..left + SQUARE).contains(&x) && (top..top + SQUARE).contains(&y) {
            Rgb([240, 220, 40])
        } else {
            let shade = ((x + y + frame_index as u32) % 64) as u8;
            Rgb([shade, shade / 2, 32])
        }
    })
}
