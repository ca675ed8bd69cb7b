use std::fmt;

/// Pixel extent of a video, frame, or drawing surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Per-axis factors mapping coordinates in `self` onto `target`.
    ///
    /// Returns `(1.0, 1.0)` when `self` is empty so degenerate sources
    /// never produce NaN or infinite coordinates.
    pub fn scale_to(&self, target: Dimensions) -> (f64, f64) {
        if self.is_empty() {
            return (1.0, 1.0);
        }
        (
            target.width as f64 / self.width as f64,
            target.height as f64 / self.height as f64,
        )
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scale_to_same_is_identity() {
        let d = Dimensions::new(640, 480);
        let (sx, sy) = d.scale_to(d);
        assert_relative_eq!(sx, 1.0);
        assert_relative_eq!(sy, 1.0);
    }

    #[test]
    fn test_scale_to_half() {
        let (sx, sy) = Dimensions::new(640, 480).scale_to(Dimensions::new(320, 240));
        assert_relative_eq!(sx, 0.5);
        assert_relative_eq!(sy, 0.5);
    }

    #[test]
    fn test_scale_to_non_uniform() {
        let (sx, sy) = Dimensions::new(100, 200).scale_to(Dimensions::new(300, 100));
        assert_relative_eq!(sx, 3.0);
        assert_relative_eq!(sy, 0.5);
    }

    #[test]
    fn test_empty_source_scales_by_one() {
        let (sx, sy) = Dimensions::new(0, 480).scale_to(Dimensions::new(320, 240));
        assert_relative_eq!(sx, 1.0);
        assert_relative_eq!(sy, 1.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Dimensions::new(1280, 720).to_string(), "1280x720");
    }
}
