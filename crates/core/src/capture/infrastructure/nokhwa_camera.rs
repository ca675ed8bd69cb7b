use std::thread;
use std::time::Duration;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};

use crate::capture::domain::camera::{Camera, CameraError};
use crate::capture::domain::live_stream::LiveStream;
use crate::shared::dimensions::Dimensions;
use crate::shared::frame::Frame;

const REQUESTED_FPS: u32 = 30;

/// Back-off after a failed frame grab.
const RETRY_DELAY: Duration = Duration::from_millis(10);

/// Webcam backed by the platform's native capture API.
///
/// The device is owned by a dedicated capture thread for its whole
/// lifetime; `open` waits until that thread reports whether the device
/// could be started.
pub struct NokhwaCamera {
    index: u32,
    requested: Dimensions,
}

impl NokhwaCamera {
    pub fn new(index: u32, requested: Dimensions) -> Self {
        Self { index, requested }
    }
}

impl Camera for NokhwaCamera {
    fn open(&mut self) -> Result<LiveStream, CameraError> {
        ensure_permission()?;

        let stream = LiveStream::new(self.requested);
        let worker_stream = stream.clone();
        let (index, requested) = (self.index, self.requested);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name("camera".into())
            .spawn(move || {
                let mut camera = match open_device(index, requested) {
                    Ok(camera) => camera,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let resolution = camera.resolution();
                worker_stream.set_dimensions(Dimensions::new(
                    resolution.width(),
                    resolution.height(),
                ));
                let _ = ready_tx.send(Ok(()));
                capture_frames(&mut camera, &worker_stream);
            })
            .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!(
                    "Camera {} streaming at {}",
                    self.index,
                    stream.dimensions()
                );
                stream.attach_worker(handle);
                Ok(stream)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CameraError::DeviceUnavailable(
                    "camera thread exited before the device opened".into(),
                ))
            }
        }
    }
}

fn open_device(index: u32, requested: Dimensions) -> Result<nokhwa::Camera, CameraError> {
    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(requested.width, requested.height),
            FrameFormat::MJPEG,
            REQUESTED_FPS,
        ),
    ));
    let mut camera = nokhwa::Camera::new(CameraIndex::Index(index), format)
        .map_err(|e| CameraError::from_message(e.to_string()))?;
    camera
        .open_stream()
        .map_err(|e| CameraError::from_message(e.to_string()))?;
    Ok(camera)
}

fn capture_frames(camera: &mut nokhwa::Camera, stream: &LiveStream) {
    let mut index: u64 = 0;
    while stream.is_active() {
        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                log::debug!("Failed to grab camera frame: {e}");
                thread::sleep(RETRY_DELAY);
                continue;
            }
        };
        match buffer.decode_image::<RgbFormat>() {
            Ok(image) => {
                let (width, height) = image.dimensions();
                stream.publish(Frame::new(image.into_raw(), width, height, 3, index));
                index += 1;
            }
            Err(e) => log::debug!("Failed to decode camera frame: {e}"),
        }
    }

    if let Err(e) = camera.stop_stream() {
        log::warn!("Error stopping camera stream: {e}");
    }
    log::info!("Camera released after {index} frames");
}

#[cfg(target_os = "macos")]
fn ensure_permission() -> Result<(), CameraError> {
    if nokhwa::nokhwa_check() {
        return Ok(());
    }
    let (tx, rx) = crossbeam_channel::bounded(1);
    nokhwa::nokhwa_initialize(move |granted| {
        let _ = tx.send(granted);
    });
    match rx.recv_timeout(Duration::from_secs(60)) {
        Ok(true) => Ok(()),
        _ => Err(CameraError::PermissionDenied(
            "camera access was not granted".into(),
        )),
    }
}

#[cfg(not(target_os = "macos"))]
fn ensure_permission() -> Result<(), CameraError> {
    Ok(())
}
