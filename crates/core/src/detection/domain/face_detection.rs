use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::dimensions::Dimensions;

/// Axis-aligned face box in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a box from corner coordinates `[x1, y1, x2, y2]`.
    pub fn from_corners(corners: [f64; 4]) -> Self {
        Self {
            x: corners[0],
            y: corners[1],
            width: (corners[2] - corners[0]).max(0.0),
            height: (corners[3] - corners[1]).max(0.0),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Clips the box to `[0, width] × [0, height]`.
    pub fn clamped(&self, bounds: Dimensions) -> Self {
        let x1 = self.x.clamp(0.0, bounds.width as f64);
        let y1 = self.y.clamp(0.0, bounds.height as f64);
        let x2 = self.right().clamp(0.0, bounds.width as f64);
        let y2 = self.bottom().clamp(0.0, bounds.height as f64);
        Self::from_corners([x1, y1, x2, y2])
    }

    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

/// One detected face: box, score and optional landmark points.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub score: f64,
    pub landmarks: Option<FaceLandmarks>,
}

impl FaceDetection {
    pub fn new(bbox: BoundingBox, score: f64) -> Self {
        Self {
            bbox,
            score,
            landmarks: None,
        }
    }

    pub fn with_landmarks(mut self, landmarks: FaceLandmarks) -> Self {
        self.landmarks = Some(landmarks);
        self
    }

    fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            bbox: self.bbox.scaled(sx, sy),
            score: self.score,
            landmarks: self.landmarks.as_ref().map(|lm| lm.scaled(sx, sy)),
        }
    }
}

/// Maps detections from one coordinate space onto another.
///
/// `from` must be the intrinsic video resolution the detector saw, not the
/// on-screen size of whatever displays the video. Identity when `from` and
/// `to` match.
pub fn rescale(detections: &[FaceDetection], from: Dimensions, to: Dimensions) -> Vec<FaceDetection> {
    if from == to {
        return detections.to_vec();
    }
    let (sx, sy) = from.scale_to(to);
    detections.iter().map(|d| d.scaled(sx, sy)).collect()
}

/// Drops faces whose shorter side is below `min_size` pixels.
pub fn retain_min_size(detections: &mut Vec<FaceDetection>, min_size: u32) {
    if min_size == 0 {
        return;
    }
    let min = min_size as f64;
    detections.retain(|d| d.bbox.width.min(d.bbox.height) >= min);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn detection(x: f64, y: f64, w: f64, h: f64) -> FaceDetection {
        FaceDetection::new(BoundingBox::new(x, y, w, h), 0.9)
    }

    #[test]
    fn test_from_corners() {
        let b = BoundingBox::from_corners([10.0, 20.0, 110.0, 70.0]);
        assert_relative_eq!(b.x, 10.0);
        assert_relative_eq!(b.y, 20.0);
        assert_relative_eq!(b.width, 100.0);
        assert_relative_eq!(b.height, 50.0);
    }

    #[test]
    fn test_from_corners_inverted_is_empty() {
        let b = BoundingBox::from_corners([50.0, 50.0, 10.0, 10.0]);
        assert_relative_eq!(b.width, 0.0);
        assert_relative_eq!(b.height, 0.0);
    }

    #[test]
    fn test_clamped_clips_to_bounds() {
        let b = BoundingBox::new(-10.0, 5.0, 50.0, 200.0).clamped(Dimensions::new(100, 100));
        assert_relative_eq!(b.x, 0.0);
        assert_relative_eq!(b.width, 40.0);
        assert_relative_eq!(b.bottom(), 100.0);
    }

    #[test]
    fn test_rescale_identity_when_dimensions_match() {
        let lm = FaceLandmarks::new(vec![(120.0, 130.0), (150.0, 131.0)]);
        let dets = vec![detection(100.0, 110.0, 80.0, 90.0).with_landmarks(lm)];
        let d = Dimensions::new(640, 480);

        let out = rescale(&dets, d, d);

        assert_eq!(out, dets);
    }

    #[test]
    fn test_rescale_maps_box_and_landmarks() {
        let lm = FaceLandmarks::new(vec![(100.0, 100.0)]);
        let dets = vec![detection(64.0, 48.0, 128.0, 96.0).with_landmarks(lm)];

        let out = rescale(&dets, Dimensions::new(640, 480), Dimensions::new(320, 240));

        assert_relative_eq!(out[0].bbox.x, 32.0);
        assert_relative_eq!(out[0].bbox.y, 24.0);
        assert_relative_eq!(out[0].bbox.width, 64.0);
        assert_relative_eq!(out[0].bbox.height, 48.0);
        let (px, py) = out[0].landmarks.as_ref().unwrap().points()[0];
        assert_relative_eq!(px, 50.0);
        assert_relative_eq!(py, 50.0);
        assert_relative_eq!(out[0].score, 0.9);
    }

    #[test]
    fn test_rescale_empty() {
        let out = rescale(&[], Dimensions::new(640, 480), Dimensions::new(1280, 960));
        assert!(out.is_empty());
    }

    #[test]
    fn test_retain_min_size_drops_small_faces() {
        let mut dets = vec![detection(0.0, 0.0, 10.0, 40.0), detection(0.0, 0.0, 40.0, 40.0)];
        retain_min_size(&mut dets, 20);
        assert_eq!(dets.len(), 1);
        assert_relative_eq!(dets[0].bbox.width, 40.0);
    }

    #[test]
    fn test_retain_min_size_zero_keeps_all() {
        let mut dets = vec![detection(0.0, 0.0, 1.0, 1.0)];
        retain_min_size(&mut dets, 0);
        assert_eq!(dets.len(), 1);
    }
}
