//! Post-processing shared by the ONNX detection backends.

use crate::detection::domain::face_detection::{BoundingBox, FaceDetection};
use crate::detection::domain::face_landmarks::FaceLandmarks;

/// Decoded model output before suppression, in frame pixel coordinates.
#[derive(Clone, Debug)]
pub struct RawDetection {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub score: f64,
    pub keypoints: Option<Vec<(f64, f64)>>,
}

impl RawDetection {
    pub fn corners(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn into_detection(self) -> FaceDetection {
        let detection = FaceDetection::new(BoundingBox::from_corners(self.corners()), self.score);
        match self.keypoints {
            Some(points) => detection.with_landmarks(FaceLandmarks::new(points)),
            None => detection,
        }
    }
}

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Greedy NMS: highest score first, drop anything overlapping a kept box
/// by more than `iou_thresh`.
pub fn nms(mut dets: Vec<RawDetection>, iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::with_capacity(dets.len());
    for det in dets {
        let overlaps = keep
            .iter()
            .any(|k| bbox_iou(&k.corners(), &det.corners()) > iou_thresh);
        if !overlaps {
            keep.push(det);
        }
    }
    keep
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
