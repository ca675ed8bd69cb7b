use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};

use crate::capture::domain::camera::Camera;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::detector_factory::ModelLoadError;
use crate::overlay::domain::render_surface::RenderSurface;
use crate::pipeline::capture_loop::{CaptureLoop, LoopError};
use crate::pipeline::frame_clock::FrameClock;
use crate::pipeline::loop_logger::LoopLogger;
use crate::recording::domain::media_recorder::RecorderFactory;
use crate::recording::domain::recorder_event::RecorderEvent;
use crate::recording::recording_controller::{
    PersistOutcome, RecordingController, StartOutcome, StopOutcome,
};
use crate::session::app_event::{AppEvent, Command};
use crate::session::notifications::ToastKind;
use crate::session::view_state::{LoadStatus, ViewState};
use crate::shared::constants::{FINALIZE_GRACE, MSG_NO_SAVED_VIDEO, MSG_VIDEO_SAVED};
use crate::storage::domain::key_value_store::KeyValueStore;

/// Deferred detector construction, run when the app mounts.
pub type DetectorLoader =
    Box<dyn FnOnce() -> Result<Box<dyn FaceDetector>, ModelLoadError> + Send>;

/// Longest the event loop sleeps when no toast is pending.
const IDLE_WAIT: Duration = Duration::from_millis(500);

/// Collaborators wired in by the composition root.
pub struct AppParts {
    pub camera: Box<dyn Camera>,
    pub surface: Box<dyn RenderSurface>,
    pub detector: DetectorLoader,
    pub recorders: Box<dyn RecorderFactory>,
    pub store: Box<dyn KeyValueStore>,
    pub clock: FrameClock,
    pub logger: Box<dyn LoopLogger>,
}

/// The face camera application.
///
/// Owns the capture loop, the recording controller and the transient view
/// state. Every method runs on the caller's thread; background work only
/// reaches the app as channel messages.
pub struct FaceCamApp {
    capture: CaptureLoop,
    camera: Box<dyn Camera>,
    pending_mount: Option<(DetectorLoader, Box<dyn RenderSurface>)>,
    recording: RecordingController,
    view: ViewState,
    events: Sender<AppEvent>,
    finalize_grace: Duration,
}

impl FaceCamApp {
    pub fn new(parts: AppParts, events: Sender<AppEvent>) -> Self {
        Self {
            capture: CaptureLoop::new(parts.clock, parts.logger),
            camera: parts.camera,
            pending_mount: Some((parts.detector, parts.surface)),
            recording: RecordingController::new(parts.recorders, parts.store),
            view: ViewState::default(),
            events,
            finalize_grace: FINALIZE_GRACE,
        }
    }

    /// How long `unmount` waits for in-flight clips to be saved.
    pub fn with_finalize_grace(mut self, grace: Duration) -> Self {
        self.finalize_grace = grace;
        self
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Loads models and starts the camera. Failures are reported through
    /// the view state and never abort the application.
    pub fn mount(&mut self, now: Instant) {
        let Some((loader, surface)) = self.pending_mount.take() else {
            log::warn!("FaceCam app is already mounted");
            return;
        };
        self.emit(AppEvent::LoopStateChanged(self.capture.state()));

        let result = self.capture.mount(loader, self.camera.as_mut(), surface);

        let state = self.capture.state();
        self.view.load_status = LoadStatus::from(&state);
        self.emit(AppEvent::LoopStateChanged(state));
        match result {
            Ok(()) => log::info!("FaceCam ready"),
            Err(LoopError::Camera(e)) => {
                self.show_toast(format!("Camera unavailable: {e}"), ToastKind::Error, now);
            }
            Err(e) => log::warn!("FaceCam started without detection: {e}"),
        }
    }

    /// Serves commands, recorder events and toast expiry until `Quit` or
    /// until the command channel closes.
    pub fn run(&mut self, commands: Receiver<Command>) {
        let recorder_events = self.recording.events();
        loop {
            let wait = self
                .view
                .notifications
                .time_until_expiry(Instant::now())
                .map_or(IDLE_WAIT, |remaining| remaining.min(IDLE_WAIT));

            select! {
                recv(commands) -> command => match command {
                    Ok(command) => {
                        if !self.handle_command(command, Instant::now()) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(recorder_events) -> event => {
                    if let Ok(event) = event {
                        self.handle_recorder_event(event, Instant::now());
                    }
                }
                default(wait) => {}
            }
            self.expire_toast(Instant::now());
        }
    }

    /// Returns `false` for `Quit`.
    pub fn handle_command(&mut self, command: Command, now: Instant) -> bool {
        log::debug!("Command: {command:?}");
        match command {
            Command::StartRecording => self.start_recording(now),
            Command::StopRecording => self.stop_recording(),
            Command::ViewSavedVideo => self.view_saved_video(now),
            Command::CloseViewer => self.close_viewer(),
            Command::Quit => return false,
        }
        true
    }

    pub fn start_recording(&mut self, now: Instant) {
        match self.recording.start(self.capture.stream()) {
            StartOutcome::Started(_) => self.sync_recording_flag(),
            StartOutcome::Ignored(reason) => log::debug!("Start recording ignored: {reason:?}"),
            StartOutcome::Failed(e) => {
                self.show_toast(format!("Could not start recording: {e}"), ToastKind::Error, now);
            }
        }
    }

    pub fn stop_recording(&mut self) {
        if let StopOutcome::Stopping(_) = self.recording.stop() {
            self.sync_recording_flag();
        }
    }

    pub fn handle_recorder_event(&mut self, event: RecorderEvent, now: Instant) {
        let outcome = self.recording.handle_event(event);
        self.sync_recording_flag();

        match outcome {
            Some(PersistOutcome::Saved { session, bytes }) => {
                self.emit(AppEvent::ClipPersisted { session, bytes });
                self.show_toast(MSG_VIDEO_SAVED, ToastKind::Info, now);
            }
            Some(PersistOutcome::StorageFailed { session, error }) => {
                self.emit(AppEvent::PersistFailed {
                    session,
                    reason: error.to_string(),
                });
                self.show_toast(format!("Could not save video: {error}"), ToastKind::Error, now);
            }
            Some(PersistOutcome::Abandoned { session, reason }) => {
                self.show_toast(format!("Recording failed: {reason}"), ToastKind::Error, now);
                self.emit(AppEvent::PersistFailed { session, reason });
            }
            None => {}
        }
    }

    /// Loads the saved clip into the viewer, or tells the user there is none.
    pub fn view_saved_video(&mut self, now: Instant) {
        match self.recording.view_saved() {
            Ok(Some(clip)) => {
                self.view.playback = Some(clip.clone());
                self.view.modal_open = true;
                self.emit(AppEvent::ViewerOpened(clip));
            }
            Ok(None) => self.show_toast(MSG_NO_SAVED_VIDEO, ToastKind::Info, now),
            Err(e) => {
                log::warn!("Saved video unreadable: {e}");
                self.show_toast(format!("Could not load saved video: {e}"), ToastKind::Error, now);
            }
        }
    }

    pub fn close_viewer(&mut self) {
        if self.view.modal_open {
            self.view.modal_open = false;
            self.emit(AppEvent::ViewerClosed);
        }
    }

    pub fn expire_toast(&mut self, now: Instant) {
        if self.view.notifications.expire(now) {
            self.emit(AppEvent::ToastCleared);
        }
    }

    /// Stops any recording, tears down the loop and waits up to the
    /// finalize grace period for pending clips to be saved.
    pub fn unmount(&mut self) {
        self.stop_recording();
        self.capture.teardown();
        self.emit(AppEvent::LoopStateChanged(self.capture.state()));

        let recorder_events = self.recording.events();
        let deadline = Instant::now() + self.finalize_grace;
        while self.recording.pending_sessions() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match recorder_events.recv_timeout(remaining) {
                Ok(event) => self.handle_recorder_event(event, Instant::now()),
                Err(_) => {
                    log::warn!(
                        "Gave up waiting for {} recording(s) to finish saving",
                        self.recording.pending_sessions()
                    );
                    break;
                }
            }
        }
    }

    fn sync_recording_flag(&mut self) {
        let recording = self.recording.is_recording();
        if self.view.is_recording != recording {
            self.view.is_recording = recording;
            self.emit(AppEvent::RecordingChanged(recording));
        }
    }

    fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind, now: Instant) {
        let toast = self.view.notifications.show(message, kind, now).clone();
        self.emit(AppEvent::ToastShown(toast));
    }

    fn emit(&self, event: AppEvent) {
        let _ = self.events.send(event);
    }
}
