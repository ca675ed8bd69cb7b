use crate::detection::domain::face_detection::FaceDetection;
use crate::shared::dimensions::Dimensions;
use crate::shared::frame::Frame;

/// Drawing target layered over the video.
///
/// Coordinates passed to the draw calls are in the surface's own pixel
/// space; callers rescale detections with
/// [`rescale`](crate::detection::domain::face_detection::rescale) first.
pub trait RenderSurface: Send {
    /// Size of the surface's pixel buffer.
    fn dimensions(&self) -> Dimensions;

    /// Reallocates the pixel buffer. Used to match the video's intrinsic size.
    fn resize(&mut self, dimensions: Dimensions);

    fn clear(&mut self);

    fn draw_detections(&mut self, detections: &[FaceDetection]);

    fn draw_landmarks(&mut self, detections: &[FaceDetection]);

    /// Publishes the current overlay alongside the frame it annotates.
    fn present(&mut self, frame: &Frame);
}
