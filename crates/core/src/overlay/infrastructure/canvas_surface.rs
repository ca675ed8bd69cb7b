use std::path::Path;
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};

use crate::detection::domain::face_detection::FaceDetection;
use crate::overlay::domain::render_surface::RenderSurface;
use crate::shared::dimensions::Dimensions;
use crate::shared::frame::Frame;

/// Colors and stroke sizes used when painting the overlay.
#[derive(Clone, Copy, Debug)]
pub struct OverlayStyle {
    pub box_color: Rgba<u8>,
    pub line_width: u32,
    pub landmark_color: Rgba<u8>,
    pub point_radius: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            box_color: Rgba([0, 0, 255, 255]),
            line_width: 2,
            landmark_color: Rgba([0, 255, 255, 255]),
            point_radius: 2,
        }
    }
}

/// Transparent RGBA canvas the detection loop paints on.
///
/// Each `present` publishes a copy of the canvas together with the frame it
/// annotates through an [`OverlayHandle`], which other threads read.
pub struct CanvasSurface {
    canvas: RgbaImage,
    style: OverlayStyle,
    presented: OverlayHandle,
}

impl CanvasSurface {
    pub fn new(dimensions: Dimensions, style: OverlayStyle) -> Self {
        Self {
            canvas: RgbaImage::new(dimensions.width, dimensions.height),
            style,
            presented: OverlayHandle::default(),
        }
    }

    pub fn handle(&self) -> OverlayHandle {
        self.presented.clone()
    }

    fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
        let (w, h) = (self.canvas.width() as i64, self.canvas.height() as i64);
        for y in y0.max(0)..y1.min(h) {
            for x in x0.max(0)..x1.min(w) {
                self.canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }

    fn stroke_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64) {
        let t = self.style.line_width.max(1) as i64;
        let color = self.style.box_color;
        self.fill_rect(x0, y0, x1, y0 + t, color);
        self.fill_rect(x0, y1 - t, x1, y1, color);
        self.fill_rect(x0, y0, x0 + t, y1, color);
        self.fill_rect(x1 - t, y0, x1, y1, color);
    }

    fn fill_circle(&mut self, cx: f64, cy: f64) {
        let r = self.style.point_radius as i64;
        let (px, py) = (cx.round() as i64, cy.round() as i64);
        let (w, h) = (self.canvas.width() as i64, self.canvas.height() as i64);
        for dy in -r..=r {
            for dx in -r..=r {
                let (x, y) = (px + dx, py + dy);
                if dx * dx + dy * dy > r * r || x < 0 || y < 0 || x >= w || y >= h {
                    continue;
                }
                self.canvas
                    .put_pixel(x as u32, y as u32, self.style.landmark_color);
            }
        }
    }
}

impl RenderSurface for CanvasSurface {
    fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.canvas.width(), self.canvas.height())
    }

    fn resize(&mut self, dimensions: Dimensions) {
        if dimensions != self.dimensions() {
            log::debug!("Overlay resized to {dimensions}");
            self.canvas = RgbaImage::new(dimensions.width, dimensions.height);
        }
    }

    fn clear(&mut self) {
        self.canvas.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
    }

    fn draw_detections(&mut self, detections: &[FaceDetection]) {
        for det in detections {
            let b = det.bbox;
            if b.width <= 0.0 || b.height <= 0.0 {
                continue;
            }
            self.stroke_rect(
                b.x.round() as i64,
                b.y.round() as i64,
                b.right().round() as i64,
                b.bottom().round() as i64,
            );
        }
    }

    fn draw_landmarks(&mut self, detections: &[FaceDetection]) {
        for landmarks in detections.iter().filter_map(|d| d.landmarks.as_ref()) {
            for (x, y) in landmarks.visible() {
                self.fill_circle(x, y);
            }
        }
    }

    fn present(&mut self, frame: &Frame) {
        self.presented.publish(self.canvas.clone(), frame.clone());
    }
}

// ---------------------------------------------------------------------------
// Shared snapshot
// ---------------------------------------------------------------------------

struct Presented {
    overlay: RgbaImage,
    frame: Frame,
    count: u64,
}

/// Read side of a [`CanvasSurface`]: the last presented overlay and frame.
#[derive(Clone, Default)]
pub struct OverlayHandle {
    inner: Arc<Mutex<Option<Presented>>>,
}

impl OverlayHandle {
    fn publish(&self, overlay: RgbaImage, frame: Frame) {
        let mut slot = self.lock();
        let count = slot.as_ref().map_or(0, |p| p.count) + 1;
        *slot = Some(Presented {
            overlay,
            frame,
            count,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Presented>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of overlays presented so far.
    pub fn presented_count(&self) -> u64 {
        self.lock().as_ref().map_or(0, |p| p.count)
    }

    /// The presented frame with the overlay alpha-blended on top, at the
    /// overlay's resolution.
    pub fn composite(&self) -> Option<image::RgbImage> {
        let slot = self.lock();
        let presented = slot.as_ref()?;
        let frame = &presented.frame;
        let base = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())?;
        let (w, h) = presented.overlay.dimensions();
        let mut base = if base.dimensions() != (w, h) {
            image::imageops::resize(&base, w, h, image::imageops::FilterType::Triangle)
        } else {
            base
        };

        for (dst, src) in base.pixels_mut().zip(presented.overlay.pixels()) {
            let alpha = src[3] as u32;
            if alpha == 0 {
                continue;
            }
            for c in 0..3 {
                dst[c] = ((src[c] as u32 * alpha + dst[c] as u32 * (255 - alpha)) / 255) as u8;
            }
        }
        Some(base)
    }

    /// Writes the composited overlay as an image file. Returns `false` when
    /// nothing has been presented yet.
    pub fn save_snapshot(&self, path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
        let Some(img) = self.composite() else {
            return Ok(false);
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        img.save(path)?;
        Ok(true)
    }
}
