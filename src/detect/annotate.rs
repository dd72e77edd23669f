//! Drawing boxes and labels onto frames.
//!
//! Boxes are always drawn. Label text needs a TrueType font; when none is
//! configured and no common system font is found, text is skipped.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::detect::types::{format_confidence, round_confidence, BoundingBox, Detection};
use crate::error::RecognizerError;

const BOX_THICKNESS: i32 = 5;
const LABEL_OFFSET: i32 = 5;
/// Glyph height at unit text scale.
const BASE_TEXT_PX: f32 = 22.0;

const SYSTEM_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// How display colours are chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Palette {
    /// Stable colour per class id.
    #[default]
    ByClass,
    /// Fresh random colour per candidate on every call.
    Random,
}

pub struct Annotator {
    palette: Palette,
    font: Option<FontVec>,
}

impl Annotator {
    /// Build an annotator. An explicit `font_path` must load; otherwise a
    /// system font is tried.
    pub fn new(palette: Palette, font_path: Option<&Path>) -> Result<Self> {
        let font = match font_path {
            Some(path) => Some(load_font(path)?),
            None => system_font(),
        };
        Ok(Self { palette, font })
    }

    /// Annotator that draws boxes only.
    pub fn without_text(palette: Palette) -> Self {
        Self {
            palette,
            font: None,
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw every kept candidate and return the matching detections.
    ///
    /// `keep` holds indices into `boxes` in output order. An empty `keep`
    /// leaves the image untouched.
    pub fn annotate(
        &self,
        image: &mut RgbImage,
        boxes: &[BoundingBox],
        keep: &[usize],
        labels: &[String],
    ) -> Result<Vec<Detection>> {
        if keep.is_empty() {
            return Ok(Vec::new());
        }

        let random_colors: Vec<Rgb<u8>> = match self.palette {
            Palette::Random => {
                let mut rng = rand::thread_rng();
                (0..boxes.len())
                    .map(|_| Rgb([rng.gen(), rng.gen(), rng.gen()]))
                    .collect()
            }
            Palette::ByClass => Vec::new(),
        };

        let text_scale = text_scale(image.height());
        let mut detections = Vec::with_capacity(keep.len());

        for &index in keep {
            let candidate = boxes.get(index).ok_or_else(|| {
                RecognizerError::model_output(format!("kept index {index} has no candidate box"))
            })?;
            let label = labels.get(candidate.class_id).ok_or_else(|| {
                RecognizerError::model_output(format!(
                    "class id {} is outside the {} known labels",
                    candidate.class_id,
                    labels.len()
                ))
            })?;
            let confidence = round_confidence(candidate.confidence);
            let color = match self.palette {
                Palette::Random => random_colors[index],
                Palette::ByClass => class_color(candidate.class_id),
            };

            draw_box(image, candidate, color);
            if let Some(font) = &self.font {
                let text = format!("{label} {}", format_confidence(confidence));
                let x = candidate.x + candidate.w / 2;
                let y = candidate.y - LABEL_OFFSET - text_scale.y as i32;
                draw_text_mut(image, color, x, y, text_scale, font, &text);
            }

            detections.push(Detection {
                label: label.clone(),
                confidence,
                center: candidate.center(),
                frame: None,
            });
        }

        Ok(detections)
    }
}

/// Colour derived from the class id alone.
pub fn class_color(class_id: usize) -> Rgb<u8> {
    let digest = Sha256::digest((class_id as u64).to_le_bytes());
    Rgb([digest[0], digest[1], digest[2]])
}

/// Text grows with image height in whole steps, never below one.
fn text_scale(image_height: u32) -> PxScale {
    let steps = (image_height / 200).max(1) as f32;
    PxScale::from(BASE_TEXT_PX * steps)
}

fn draw_box(image: &mut RgbImage, candidate: &BoundingBox, color: Rgb<u8>) {
    if candidate.w <= 0 || candidate.h <= 0 {
        return;
    }
    // Edges outside the frame are parked one pixel past the border, so the
    // rectangle stays small no matter how large the decoded box is.
    let (width, height) = (i64::from(image.width()), i64::from(image.height()));
    let (x, y) = (i64::from(candidate.x), i64::from(candidate.y));
    let (w, h) = (i64::from(candidate.w), i64::from(candidate.h));
    for thickness in 0..i64::from(BOX_THICKNESS) {
        let left = (x - thickness).clamp(-1, width);
        let top = (y - thickness).clamp(-1, height);
        let right = (x + w + thickness - 1).clamp(-1, width);
        let bottom = (y + h + thickness - 1).clamp(-1, height);
        let rect = Rect::at(left as i32, top as i32)
            .of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

fn load_font(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path).map_err(|e| {
        RecognizerError::configuration(format!("failed to read font {}: {}", path.display(), e))
    })?;
    FontVec::try_from_vec(data).map_err(|_| {
        RecognizerError::configuration(format!("failed to parse font file {}", path.display()))
    })
}

fn system_font() -> Option<FontVec> {
    for path in SYSTEM_FONTS {
        if let Ok(data) = std::fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec(data) {
                log::info!("Annotator: using system font {}", path);
                return Some(font);
            }
        }
    }
    log::debug!("Annotator: no system font found, label text will be skipped");
    None
}
