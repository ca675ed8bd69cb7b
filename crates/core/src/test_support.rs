//! Fakes for the camera, detector, recorder and surface ports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::capture::domain::camera::{Camera, CameraError};
use crate::capture::domain::live_stream::LiveStream;
use crate::detection::domain::face_detection::FaceDetection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::overlay::domain::render_surface::RenderSurface;
use crate::recording::domain::media_recorder::{MediaRecorder, RecorderError, RecorderFactory};
use crate::recording::domain::recorder_event::{RecorderEvent, SessionId};
use crate::shared::dimensions::Dimensions;
use crate::shared::frame::Frame;

/// Polls `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

pub struct FakeCamera {
    dimensions: Dimensions,
    frame: Option<Frame>,
    error: Option<CameraError>,
    opened: Arc<AtomicUsize>,
}

impl FakeCamera {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            frame: None,
            error: None,
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(error: CameraError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(Dimensions::default())
        }
    }

    /// Frame published as soon as the stream opens.
    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn open_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opened)
    }
}

impl Camera for FakeCamera {
    fn open(&mut self) -> Result<LiveStream, CameraError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        let stream = LiveStream::new(self.dimensions);
        if let Some(frame) = &self.frame {
            stream.publish(frame.clone());
        }
        Ok(stream)
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

pub struct FakeDetector {
    result: Result<Vec<FaceDetection>, String>,
    calls: Arc<AtomicUsize>,
}

impl FakeDetector {
    pub fn returning(detections: Vec<FaceDetection>) -> Self {
        Self {
            result: Ok(detections),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err("inference failed".into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn boxed(detections: Vec<FaceDetection>) -> Box<dyn FaceDetector> {
        Box::new(Self::returning(detections))
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl FaceDetector for FakeDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(detections) => Ok(detections.clone()),
            Err(message) => Err(message.clone().into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Clear,
    DrawDetections(usize),
    DrawLandmarks(usize),
    /// Index of the presented frame.
    Present(u64),
}

#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub dimensions: Dimensions,
    pub calls: Vec<SurfaceCall>,
    pub last_detections: Vec<FaceDetection>,
    pub presented: usize,
}

/// Surface that records every call instead of drawing.
pub struct RecordingSurface {
    log: Arc<Mutex<SurfaceLog>>,
}

impl RecordingSurface {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            log: Arc::new(Mutex::new(SurfaceLog {
                dimensions,
                ..SurfaceLog::default()
            })),
        }
    }

    pub fn log(&self) -> Arc<Mutex<SurfaceLog>> {
        Arc::clone(&self.log)
    }
}

impl RenderSurface for RecordingSurface {
    fn dimensions(&self) -> Dimensions {
        self.log.lock().unwrap().dimensions
    }

    fn resize(&mut self, dimensions: Dimensions) {
        self.log.lock().unwrap().dimensions = dimensions;
    }

    fn clear(&mut self) {
        self.log.lock().unwrap().calls.push(SurfaceCall::Clear);
    }

    fn draw_detections(&mut self, detections: &[FaceDetection]) {
        let mut log = self.log.lock().unwrap();
        log.calls.push(SurfaceCall::DrawDetections(detections.len()));
        log.last_detections = detections.to_vec();
    }

    fn draw_landmarks(&mut self, detections: &[FaceDetection]) {
        self.log
            .lock()
            .unwrap()
            .calls
            .push(SurfaceCall::DrawLandmarks(detections.len()));
    }

    fn present(&mut self, frame: &Frame) {
        let mut log = self.log.lock().unwrap();
        log.calls.push(SurfaceCall::Present(frame.index()));
        log.presented += 1;
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Recorders that emit a scripted list of fragments when stopped, followed
/// by `Stopped` (or `Failed` when configured).
pub struct FakeRecorderFactory {
    script: Arc<Mutex<Vec<Vec<u8>>>>,
    unsupported: bool,
    fail_start: bool,
    fail_on_stop: Option<String>,
    created: Arc<AtomicUsize>,
}

impl FakeRecorderFactory {
    pub fn new(fragments: Vec<Vec<u8>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(fragments)),
            unsupported: false,
            fail_start: false,
            fail_on_stop: None,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::new(vec![])
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_on_stop(mut self, reason: &str) -> Self {
        self.fail_on_stop = Some(reason.to_string());
        self
    }

    /// Fragments handed to recorders created from now on.
    pub fn script(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.script)
    }

    pub fn created(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.created)
    }
}

impl RecorderFactory for FakeRecorderFactory {
    fn create(
        &self,
        _stream: &LiveStream,
        session: SessionId,
        events: Sender<RecorderEvent>,
    ) -> Result<Box<dyn MediaRecorder>, RecorderError> {
        if self.unsupported {
            return Err(RecorderError::Unsupported("fake".into()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeRecorder {
            session,
            events,
            fragments: self.script.lock().unwrap().clone(),
            fail_start: self.fail_start,
            fail_on_stop: self.fail_on_stop.clone(),
        }))
    }
}

struct FakeRecorder {
    session: SessionId,
    events: Sender<RecorderEvent>,
    fragments: Vec<Vec<u8>>,
    fail_start: bool,
    fail_on_stop: Option<String>,
}

impl MediaRecorder for FakeRecorder {
    fn start(&mut self) -> Result<(), RecorderError> {
        if self.fail_start {
            return Err(RecorderError::Start("fake".into()));
        }
        Ok(())
    }

    fn stop(&mut self) {
        for fragment in self.fragments.drain(..) {
            let _ = self.events.send(RecorderEvent::data(self.session, fragment));
        }
        let last = match self.fail_on_stop.take() {
            Some(reason) => RecorderEvent::failed(self.session, reason),
            None => RecorderEvent::stopped(self.session),
        };
        let _ = self.events.send(last);
    }

    fn mime_type(&self) -> &str {
        "video/webm"
    }
}
