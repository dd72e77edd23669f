use crate::detect::types::BoundingBox;

/// Class-agnostic greedy non-maximum suppression.
///
/// Candidates scoring at or below `score_threshold` are ignored. The rest are
/// visited in descending confidence order (ties keep input order); a box is
/// kept unless its IoU with an already kept box exceeds `iou_threshold`.
/// Returns indices into `boxes`, best first.
pub fn suppress(boxes: &[BoundingBox], score_threshold: f32, iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len())
        .filter(|&i| boxes[i].confidence > score_threshold)
        .collect();
    order.sort_by(|&a, &b| boxes[b].confidence.total_cmp(&boxes[a].confidence));

    let mut kept: Vec<usize> = Vec::with_capacity(order.len().min(100));
    for candidate in order {
        let overlaps = kept
            .iter()
            .any(|&k| boxes[k].iou(&boxes[candidate]) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: i32, y: i32, w: i32, h: i32, confidence: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            w,
            h,
            class_id: 0,
            confidence,
        }
    }

    #[test]
    fn keeps_best_of_overlapping_cluster() {
        let boxes = [
            bbox(0, 0, 100, 100, 0.7),
            bbox(5, 5, 100, 100, 0.9),
            bbox(300, 300, 50, 50, 0.6),
        ];
        assert_eq!(suppress(&boxes, 0.5, 0.4), vec![1, 2]);
    }

    #[test]
    fn overlap_at_threshold_is_kept() {
        // IoU of these two is exactly 1/3.
        let boxes = [bbox(0, 0, 10, 10, 0.9), bbox(5, 0, 10, 10, 0.8)];
        assert_eq!(suppress(&boxes, 0.5, 1.0 / 3.0), vec![0, 1]);
        assert_eq!(suppress(&boxes, 0.5, 0.3), vec![0]);
    }

    #[test]
    fn ignores_classes() {
        let mut other = bbox(2, 2, 100, 100, 0.8);
        other.class_id = 7;
        let boxes = [bbox(0, 0, 100, 100, 0.9), other];
        assert_eq!(suppress(&boxes, 0.5, 0.4), vec![0]);
    }

    #[test]
    fn score_floor_removes_everything() {
        let boxes = [bbox(0, 0, 10, 10, 0.5), bbox(50, 50, 10, 10, 0.3)];
        assert!(suppress(&boxes, 0.5, 0.4).is_empty());
        assert!(suppress(&[], 0.5, 0.4).is_empty());
    }

    #[test]
    fn survivors_never_overlap_beyond_threshold() {
        let boxes: Vec<BoundingBox> = (0..40)
            .map(|i| {
                bbox(
                    (i * 7) % 90,
                    (i * 13) % 70,
                    30 + i % 5,
                    25 + i % 3,
                    0.5 + i as f32 / 100.0,
                )
            })
            .collect();
        let kept = suppress(&boxes, 0.5, 0.4);

        assert!(!kept.is_empty());
        for (n, &a) in kept.iter().enumerate() {
            assert!(a < boxes.len());
            for &b in &kept[n + 1..] {
                assert!(boxes[a].iou(&boxes[b]) <= 0.4);
            }
        }
    }
}
