//! Facial landmark points attached to a detection.
//!
//! Point count depends on the model (5 for YOLO face pose, 6 for BlazeFace).
//! Points a model could not place are stored as `(0.0, 0.0)` and treated as
//! invisible.

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    points: Vec<(f64, f64)>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points with a positive x coordinate.
    pub fn visible(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().copied().filter(|(x, _)| *x > 0.0)
    }

    pub fn has_visible(&self) -> bool {
        self.visible().next().is_some()
    }

    /// Unweighted centroid of the visible points.
    pub fn center(&self) -> Option<(f64, f64)> {
        let (mut sx, mut sy, mut n) = (0.0, 0.0, 0usize);
        for (x, y) in self.visible() {
            sx += x;
            sy += y;
            n += 1;
        }
        (n > 0).then(|| (sx / n as f64, sy / n as f64))
    }

    /// Scales every visible point; invisible points stay at the origin.
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|&(x, y)| if x > 0.0 { (x * sx, y * sy) } else { (x, y) })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frontal_landmarks() -> FaceLandmarks {
        FaceLandmarks::new(vec![
            (440.0, 350.0), // left_eye
            (560.0, 350.0), // right_eye
            (500.0, 420.0), // nose
            (460.0, 470.0), // left_mouth
            (540.0, 470.0), // right_mouth
        ])
    }

    #[test]
    fn test_has_visible_all_visible() {
        assert!(frontal_landmarks().has_visible());
    }

    #[test]
    fn test_has_visible_none_visible() {
        let lm = FaceLandmarks::new(vec![(0.0, 0.0); 5]);
        assert!(!lm.has_visible());
    }

    #[test]
    fn test_center_frontal() {
        let (cx, cy) = frontal_landmarks().center().unwrap();
        assert_relative_eq!(cx, 500.0, epsilon = 0.01);
        assert_relative_eq!(cy, 412.0, epsilon = 0.01);
    }

    #[test]
    fn test_center_ignores_invisible() {
        let lm = FaceLandmarks::new(vec![(0.0, 0.0), (300.0, 400.0), (0.0, 0.0)]);
        let (cx, cy) = lm.center().unwrap();
        assert_relative_eq!(cx, 300.0);
        assert_relative_eq!(cy, 400.0);
    }

    #[test]
    fn test_center_no_visible_is_none() {
        let lm = FaceLandmarks::new(vec![(0.0, 0.0); 5]);
        assert!(lm.center().is_none());
    }

    #[test]
    fn test_scaled_keeps_invisible_at_origin() {
        let lm = FaceLandmarks::new(vec![(100.0, 50.0), (0.0, 0.0)]).scaled(2.0, 0.5);
        assert_eq!(lm.points(), &[(200.0, 25.0), (0.0, 0.0)]);
    }

    #[test]
    fn test_len_and_empty() {
        assert_eq!(frontal_landmarks().len(), 5);
        assert!(FaceLandmarks::new(Vec::new()).is_empty());
    }
}
