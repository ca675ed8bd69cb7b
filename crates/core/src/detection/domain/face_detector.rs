use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detection::domain::face_detection::FaceDetection;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Results are in the frame's own pixel coordinates. Implementations may
/// keep per-session buffers, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>>;
}

/// Which detection model backs the live overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorVariant {
    /// YOLO face pose model: boxes plus 5 landmarks.
    Yolo,
    /// BlazeFace short-range: fast, boxes plus 6 coarse keypoints.
    Blazeface,
}

impl DetectorVariant {
    pub const ALL: &[DetectorVariant] = &[DetectorVariant::Yolo, DetectorVariant::Blazeface];
}

impl fmt::Display for DetectorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorVariant::Yolo => write!(f, "yolo"),
            DetectorVariant::Blazeface => write!(f, "blazeface"),
        }
    }
}

impl std::str::FromStr for DetectorVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yolo" => Ok(DetectorVariant::Yolo),
            "blazeface" => Ok(DetectorVariant::Blazeface),
            other => Err(format!(
                "Detector must be 'yolo' or 'blazeface', got '{other}'"
            )),
        }
    }
}

/// Detection configuration: model variant and acceptance thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorOptions {
    pub variant: DetectorVariant,
    /// Minimum score in `0.0..=1.0`.
    pub confidence: f64,
    /// Faces whose shorter box side is below this many pixels are dropped.
    pub min_face_size: u32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            variant: DetectorVariant::Yolo,
            confidence: 0.5,
            min_face_size: 0,
        }
    }
}
