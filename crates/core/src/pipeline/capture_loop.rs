use std::sync::{Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{select, Receiver, Sender};
use thiserror::Error;

use crate::capture::domain::camera::{Camera, CameraError};
use crate::capture::domain::live_stream::LiveStream;
use crate::detection::domain::face_detection::rescale;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::detector_factory::ModelLoadError;
use crate::overlay::domain::render_surface::RenderSurface;

use super::frame_clock::FrameClock;
use super::loop_logger::LoopLogger;
use super::loop_state::LoopState;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("failed to start detection worker: {0}")]
    Worker(#[source] std::io::Error),
    #[error("capture loop already mounted (state: {0})")]
    AlreadyMounted(LoopState),
}

/// What a single loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The stream has not delivered a frame yet.
    NoFrame,
    /// Detection failed; the previous overlay is left in place.
    DetectFailed,
    Rendered { faces: usize },
}

/// Continuous capture → detect → render loop.
///
/// `mount` loads the detector, opens the camera and starts a worker thread
/// that runs one [`step`] per clock tick. `teardown` stops the worker and
/// releases the camera; it also runs on drop.
pub struct CaptureLoop {
    state: Mutex<LoopState>,
    clock: Option<FrameClock>,
    logger: Option<Box<dyn LoopLogger>>,
    stream: Option<LiveStream>,
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<Box<dyn LoopLogger>>>,
}

impl CaptureLoop {
    pub fn new(clock: FrameClock, logger: Box<dyn LoopLogger>) -> Self {
        Self {
            state: Mutex::new(LoopState::Idle),
            clock: Some(clock),
            logger: Some(logger),
            stream: None,
            shutdown: None,
            worker: None,
        }
    }

    pub fn state(&self) -> LoopState {
        lock(&self.state).clone()
    }

    /// The live stream once the camera has started.
    pub fn stream(&self) -> Option<&LiveStream> {
        self.stream.as_ref()
    }

    /// Loads the detector, starts the camera and begins detecting.
    ///
    /// A failure in either phase leaves the loop in `Failed` with no worker
    /// running. The camera is only opened once the detector is ready.
    pub fn mount<L>(
        &mut self,
        load_detector: L,
        camera: &mut dyn Camera,
        mut surface: Box<dyn RenderSurface>,
    ) -> Result<(), LoopError>
    where
        L: FnOnce() -> Result<Box<dyn FaceDetector>, ModelLoadError>,
    {
        let current = self.state();
        if current != LoopState::Idle {
            return Err(LoopError::AlreadyMounted(current));
        }

        self.transition(LoopState::LoadingModels);
        let detector = match load_detector() {
            Ok(detector) => detector,
            Err(e) => {
                log::warn!("Face model failed to load: {e}");
                self.transition(LoopState::Failed(e.to_string()));
                return Err(e.into());
            }
        };

        self.transition(LoopState::StartingCamera);
        let stream = match camera.open() {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Camera failed to start: {e}");
                self.transition(LoopState::Failed(e.to_string()));
                return Err(e.into());
            }
        };

        surface.resize(stream.dimensions());
        if let Err(e) = self.spawn_worker(stream.clone(), detector, surface) {
            stream.stop();
            self.transition(LoopState::Failed(e.to_string()));
            return Err(LoopError::Worker(e));
        }
        self.stream = Some(stream);
        self.transition(LoopState::Detecting);
        Ok(())
    }

    /// Stops the worker, waits for it to exit and releases the camera.
    /// No step runs after this returns. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(logger) => logger.summary(),
                Err(_) => log::warn!("Detection worker panicked"),
            }
        }
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        if self.state() != LoopState::Stopped {
            self.transition(LoopState::Stopped);
        }
    }

    fn spawn_worker(
        &mut self,
        stream: LiveStream,
        detector: Box<dyn FaceDetector>,
        surface: Box<dyn RenderSurface>,
    ) -> std::io::Result<()> {
        let (Some(clock), Some(logger)) = (self.clock.take(), self.logger.take()) else {
            return Err(std::io::Error::other("frame clock already consumed"));
        };
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let handle = std::thread::Builder::new()
            .name("detection".into())
            .spawn(move || run_worker(stream, detector, surface, clock, shutdown_rx, logger))?;
        self.shutdown = Some(shutdown_tx);
        self.worker = Some(handle);
        Ok(())
    }

    fn transition(&self, next: LoopState) {
        let mut state = lock(&self.state);
        if !state.can_transition_to(&next) {
            log::debug!("Ignoring loop transition {} -> {next}", *state);
            return;
        }
        log::info!("Capture loop: {} -> {next}", *state);
        *state = next;
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn run_worker(
    stream: LiveStream,
    mut detector: Box<dyn FaceDetector>,
    mut surface: Box<dyn RenderSurface>,
    clock: FrameClock,
    shutdown: Receiver<()>,
    mut logger: Box<dyn LoopLogger>,
) -> Box<dyn LoopLogger> {
    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(clock.ticks()) -> tick => {
                if tick.is_err() {
                    break;
                }
                step(&stream, detector.as_mut(), surface.as_mut(), logger.as_mut());
            }
        }
    }
    log::debug!("Detection worker exiting");
    logger
}

/// One loop iteration: detect on the latest frame, rescale from the frame's
/// own resolution to the surface and repaint the overlay.
pub fn step(
    stream: &LiveStream,
    detector: &mut dyn FaceDetector,
    surface: &mut dyn RenderSurface,
    logger: &mut dyn LoopLogger,
) -> StepOutcome {
    let Some(frame) = stream.latest_frame() else {
        return StepOutcome::NoFrame;
    };

    let t0 = Instant::now();
    let detections = match detector.detect(&frame) {
        Ok(detections) => detections,
        Err(e) => {
            log::warn!("Face detection failed on frame {}: {e}", frame.index());
            return StepOutcome::DetectFailed;
        }
    };
    logger.timing("detect", t0.elapsed().as_secs_f64() * 1000.0);

    let t0 = Instant::now();
    let bounds = surface.dimensions();
    let mut resized = rescale(&detections, frame.dimensions(), bounds);
    for detection in &mut resized {
        detection.bbox = detection.bbox.clamped(bounds);
    }
    surface.clear();
    surface.draw_detections(&resized);
    surface.draw_landmarks(&resized);
    surface.present(&frame);
    logger.timing("render", t0.elapsed().as_secs_f64() * 1000.0);

    logger.metric("faces", resized.len() as f64);
    logger.frame(frame.index());
    log::trace!("Frame {}: {} faces", frame.index(), resized.len());
    StepOutcome::Rendered {
        faces: resized.len(),
    }
}

fn lock(state: &Mutex<LoopState>) -> MutexGuard<'_, LoopState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::detection::domain::face_detection::{BoundingBox, FaceDetection};
    use crate::detection::domain::face_landmarks::FaceLandmarks;
    use crate::detection::infrastructure::model_resolver::ModelResolveError;
    use crate::pipeline::loop_logger::{NullLoopLogger, StatsLoopLogger};
    use crate::shared::dimensions::Dimensions;
    use crate::shared::frame::Frame;
    use crate::test_support::{wait_until, FakeCamera, FakeDetector, RecordingSurface, SurfaceCall};

    const WAIT: Duration = Duration::from_secs(2);

    fn face() -> FaceDetection {
        FaceDetection::new(BoundingBox::new(100.0, 50.0, 200.0, 100.0), 0.9)
            .with_landmarks(FaceLandmarks::new(vec![(150.0, 100.0)]))
    }

    fn missing_model() -> ModelLoadError {
        ModelLoadError::Missing {
            name: "face.onnx".into(),
            source: ModelResolveError::NoCacheDir,
        }
    }

    fn manual_loop() -> (CaptureLoop, crate::pipeline::frame_clock::ClockDriver) {
        let (clock, driver) = FrameClock::manual();
        (CaptureLoop::new(clock, Box::new(NullLoopLogger)), driver)
    }

    // --- step ---

    #[test]
    fn test_step_without_frame_does_nothing() {
        let stream = LiveStream::new(Dimensions::new(640, 480));
        let mut detector = FakeDetector::returning(vec![face()]);
        let calls = detector.calls();
        let mut surface = RecordingSurface::new(Dimensions::new(640, 480));
        let log = surface.log();

        let outcome = step(&stream, &mut detector, &mut surface, &mut NullLoopLogger);

        assert_eq!(outcome, StepOutcome::NoFrame);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(log.lock().unwrap().calls.is_empty());
    }

    #[test]
    fn test_step_clears_then_draws_then_presents() {
        let stream = LiveStream::new(Dimensions::new(640, 480));
        stream.publish(Frame::solid(640, 480, 0, 7));
        let mut detector = FakeDetector::returning(vec![face()]);
        let mut surface = RecordingSurface::new(Dimensions::new(640, 480));
        let log = surface.log();

        let outcome = step(&stream, &mut detector, &mut surface, &mut NullLoopLogger);

        assert_eq!(outcome, StepOutcome::Rendered { faces: 1 });
        assert_eq!(
            log.lock().unwrap().calls,
            vec![
                SurfaceCall::Clear,
                SurfaceCall::DrawDetections(1),
                SurfaceCall::DrawLandmarks(1),
                SurfaceCall::Present(7),
            ]
        );
    }

    #[test]
    fn test_step_rescales_to_surface_resolution() {
        let stream = LiveStream::new(Dimensions::new(640, 480));
        stream.publish(Frame::solid(640, 480, 0, 0));
        let mut detector = FakeDetector::returning(vec![face()]);
        let mut surface = RecordingSurface::new(Dimensions::new(320, 240));
        let log = surface.log();

        step(&stream, &mut detector, &mut surface, &mut NullLoopLogger);

        let drawn = log.lock().unwrap().last_detections.clone();
        assert_eq!(drawn[0].bbox, BoundingBox::new(50.0, 25.0, 100.0, 50.0));
        assert_eq!(
            drawn[0].landmarks.as_ref().unwrap().points(),
            &[(75.0, 50.0)]
        );
    }

    #[test]
    fn test_step_rescales_from_frame_resolution() {
        // Stream negotiated 1280x720 but the device delivers 640x480 frames.
        let stream = LiveStream::new(Dimensions::new(1280, 720));
        stream.publish(Frame::solid(640, 480, 0, 0));
        let mut detector = FakeDetector::returning(vec![face()]);
        let mut surface = RecordingSurface::new(Dimensions::new(320, 240));
        let log = surface.log();

        step(&stream, &mut detector, &mut surface, &mut NullLoopLogger);

        let drawn = log.lock().unwrap().last_detections.clone();
        assert_eq!(drawn[0].bbox, BoundingBox::new(50.0, 25.0, 100.0, 50.0));
    }

    #[test]
    fn test_step_clamps_boxes_to_surface() {
        let stream = LiveStream::new(Dimensions::new(640, 480));
        stream.publish(Frame::solid(640, 480, 0, 0));
        let edge = FaceDetection::new(BoundingBox::new(600.0, -20.0, 100.0, 100.0), 0.9);
        let mut detector = FakeDetector::returning(vec![edge]);
        let mut surface = RecordingSurface::new(Dimensions::new(640, 480));
        let log = surface.log();

        step(&stream, &mut detector, &mut surface, &mut NullLoopLogger);

        let drawn = log.lock().unwrap().last_detections.clone();
        assert_eq!(drawn[0].bbox, BoundingBox::new(600.0, 0.0, 40.0, 80.0));
    }

    #[test]
    fn test_step_detection_error_leaves_overlay() {
        let stream = LiveStream::new(Dimensions::new(64, 48));
        stream.publish(Frame::solid(64, 48, 0, 0));
        let mut detector = FakeDetector::failing();
        let mut surface = RecordingSurface::new(Dimensions::new(64, 48));
        let log = surface.log();

        let outcome = step(&stream, &mut detector, &mut surface, &mut NullLoopLogger);

        assert_eq!(outcome, StepOutcome::DetectFailed);
        assert!(log.lock().unwrap().calls.is_empty());
    }

    #[test]
    fn test_step_records_stage_timings() {
        let stream = LiveStream::new(Dimensions::new(64, 48));
        stream.publish(Frame::solid(64, 48, 0, 0));
        let mut detector = FakeDetector::returning(vec![face(), face()]);
        let mut surface = RecordingSurface::new(Dimensions::new(64, 48));
        let mut logger = StatsLoopLogger::new(1);

        step(&stream, &mut detector, &mut surface, &mut logger);

        assert_eq!(logger.timings_for("detect").unwrap().len(), 1);
        assert_eq!(logger.timings_for("render").unwrap().len(), 1);
        assert_eq!(logger.metrics_for("faces").unwrap(), &[2.0]);
        assert_eq!(logger.frames(), 1);
    }

    // --- mount / teardown ---

    #[test]
    fn test_mount_reaches_detecting_and_matches_dimensions() {
        let (mut capture, _driver) = manual_loop();
        let mut camera = FakeCamera::new(Dimensions::new(1280, 720));
        let surface = RecordingSurface::new(Dimensions::new(640, 480));
        let log = surface.log();

        capture
            .mount(|| Ok(FakeDetector::boxed(vec![])), &mut camera, Box::new(surface))
            .unwrap();

        assert_eq!(capture.state(), LoopState::Detecting);
        assert!(capture.stream().unwrap().is_active());
        assert_eq!(log.lock().unwrap().dimensions, Dimensions::new(1280, 720));
    }

    #[test]
    fn test_model_failure_never_starts_camera() {
        let (mut capture, _driver) = manual_loop();
        let mut camera = FakeCamera::new(Dimensions::new(640, 480));
        let opened = camera.open_count();

        let err = capture
            .mount(
                || Err(missing_model()),
                &mut camera,
                Box::new(RecordingSurface::new(Dimensions::new(640, 480))),
            )
            .unwrap_err();

        assert!(matches!(err, LoopError::ModelLoad(_)));
        assert!(matches!(capture.state(), LoopState::Failed(_)));
        assert_eq!(opened.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(capture.stream().is_none());
    }

    #[test]
    fn test_camera_failure_fails_loop() {
        let (mut capture, _driver) = manual_loop();
        let mut camera = FakeCamera::failing(CameraError::PermissionDenied("no".into()));

        let err = capture
            .mount(
                || Ok(FakeDetector::boxed(vec![])),
                &mut camera,
                Box::new(RecordingSurface::new(Dimensions::new(640, 480))),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            LoopError::Camera(CameraError::PermissionDenied(_))
        ));
        assert_eq!(
            capture.state(),
            LoopState::Failed("camera permission denied: no".into())
        );
    }

    #[test]
    fn test_mount_twice_is_rejected() {
        let (mut capture, _driver) = manual_loop();
        let mut camera = FakeCamera::new(Dimensions::new(64, 48));
        capture
            .mount(
                || Ok(FakeDetector::boxed(vec![])),
                &mut camera,
                Box::new(RecordingSurface::new(Dimensions::new(64, 48))),
            )
            .unwrap();

        let err = capture
            .mount(
                || Ok(FakeDetector::boxed(vec![])),
                &mut camera,
                Box::new(RecordingSurface::new(Dimensions::new(64, 48))),
            )
            .unwrap_err();

        assert!(matches!(err, LoopError::AlreadyMounted(LoopState::Detecting)));
    }

    #[test]
    fn test_tick_runs_one_step() {
        let (mut capture, driver) = manual_loop();
        let mut camera = FakeCamera::new(Dimensions::new(64, 48))
            .with_frame(Frame::solid(64, 48, 0, 3));
        let surface = RecordingSurface::new(Dimensions::new(64, 48));
        let log = surface.log();
        capture
            .mount(
                || Ok(FakeDetector::boxed(vec![face()])),
                &mut camera,
                Box::new(surface),
            )
            .unwrap();

        assert!(driver.tick());

        assert!(wait_until(WAIT, || log.lock().unwrap().presented == 1));
    }

    #[test]
    fn test_teardown_during_detection_stops_worker_and_tracks() {
        let (mut capture, driver) = manual_loop();
        let mut camera = FakeCamera::new(Dimensions::new(64, 48))
            .with_frame(Frame::solid(64, 48, 0, 0));
        let surface = RecordingSurface::new(Dimensions::new(64, 48));
        let log = surface.log();
        capture
            .mount(
                || Ok(FakeDetector::boxed(vec![face()])),
                &mut camera,
                Box::new(surface),
            )
            .unwrap();
        let stream = capture.stream().unwrap().clone();
        assert!(driver.tick());
        assert!(wait_until(WAIT, || log.lock().unwrap().presented == 1));

        capture.teardown();
        assert!(!driver.tick());
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(capture.state(), LoopState::Stopped);
        assert!(!stream.is_active());
        assert_eq!(log.lock().unwrap().presented, 1);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (mut capture, _driver) = manual_loop();
        capture.teardown();
        capture.teardown();
        assert_eq!(capture.state(), LoopState::Stopped);
    }

    #[test]
    fn test_teardown_after_failure_ends_stopped() {
        let (mut capture, _driver) = manual_loop();
        let mut camera = FakeCamera::new(Dimensions::new(64, 48));
        let _ = capture.mount(
            || Err(missing_model()),
            &mut camera,
            Box::new(RecordingSurface::new(Dimensions::new(64, 48))),
        );

        capture.teardown();

        assert_eq!(capture.state(), LoopState::Stopped);
    }
}
