use serde::{Serialize, Serializer};

/// One recognized object, as returned to callers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub label: String,
    /// Class score rounded to two decimals. Serialized as a decimal string.
    #[serde(serialize_with = "confidence_as_string")]
    pub confidence: f32,
    /// Box center in original image pixels.
    pub center: [i32; 2],
    /// 1-based frame index, set only for video and camera runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<u32>,
}

impl Detection {
    pub fn with_frame(mut self, frame: u32) -> Self {
        self.frame = Some(frame);
        self
    }
}

/// Candidate box between decoding and suppression.
///
/// Pixel units of the original image, top-left corner plus size. Boxes are
/// not clipped, so coordinates may be negative or exceed the image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub class_id: usize,
    pub confidence: f32,
}

impl BoundingBox {
    pub fn area(&self) -> i64 {
        if self.w <= 0 || self.h <= 0 {
            return 0;
        }
        self.w as i64 * self.h as i64
    }

    /// Intersection over union of two boxes. Zero when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let left = self.x.max(other.x) as i64;
        let top = self.y.max(other.y) as i64;
        let right = (self.x as i64 + self.w as i64).min(other.x as i64 + other.w as i64);
        let bottom = (self.y as i64 + self.h as i64).min(other.y as i64 + other.h as i64);
        let intersection = (right - left).max(0) * (bottom - top).max(0);
        let union = self.area() + other.area() - intersection;
        if union > 0 {
            intersection as f32 / union as f32
        } else {
            0.0
        }
    }

    /// Integer center, truncated the same way the box corners are.
    pub fn center(&self) -> [i32; 2] {
        [
            (self.x as f32 + self.w as f32 / 2.0) as i32,
            (self.y as f32 + self.h as f32 / 2.0) as i32,
        ]
    }
}

/// Round a score to two decimals, ties to even.
pub fn round_confidence(confidence: f32) -> f32 {
    ((f64::from(confidence) * 100.0).round_ties_even() / 100.0) as f32
}

/// Display form of a rounded score: whole values keep one decimal ("1.0").
pub fn format_confidence(confidence: f32) -> String {
    if confidence.fract() == 0.0 {
        format!("{confidence:.1}")
    } else {
        confidence.to_string()
    }
}

fn confidence_as_string<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_confidence(*value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: i32, y: i32, w: i32, h: i32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            w,
            h,
            class_id: 0,
            confidence: 0.9,
        }
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = bbox(10, 10, 20, 20);
        assert!((a.iou(&a) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        assert_eq!(bbox(0, 0, 10, 10).iou(&bbox(20, 20, 10, 10)), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        // 10x10 boxes offset by 5 horizontally: 50 / 150.
        let iou = bbox(0, 0, 10, 10).iou(&bbox(5, 0, 10, 10));
        assert!((iou - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_boxes_do_not_overlap() {
        assert_eq!(bbox(0, 0, 0, 10).iou(&bbox(0, 0, 0, 10)), 0.0);
        assert_eq!(bbox(0, 0, -5, 10).iou(&bbox(0, 0, 10, 10)), 0.0);
    }

    #[test]
    fn rounding_ties_go_to_even() {
        assert_eq!(format_confidence(round_confidence(0.625)), "0.62");
        assert_eq!(format_confidence(round_confidence(0.875)), "0.88");
        assert_eq!(format_confidence(round_confidence(0.8761)), "0.88");
        assert_eq!(format_confidence(round_confidence(0.5)), "0.5");
    }

    #[test]
    fn whole_confidences_keep_one_decimal() {
        assert_eq!(format_confidence(round_confidence(0.999)), "1.0");
        assert_eq!(format_confidence(1.0), "1.0");
        assert_eq!(format_confidence(0.95), "0.95");
    }

    #[test]
    fn detection_serializes_confidence_as_string() {
        let det = Detection {
            label: "dog".to_string(),
            confidence: round_confidence(0.8761),
            center: [120, 80],
            frame: None,
        };
        let json = serde_json::to_value(&det).unwrap();
        assert_eq!(json["confidence"], "0.88");
        assert_eq!(json["center"], serde_json::json!([120, 80]));
        assert!(json.get("frame").is_none());

        let json = serde_json::to_value(det.with_frame(3)).unwrap();
        assert_eq!(json["frame"], 3);
    }
}
