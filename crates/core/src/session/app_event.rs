use crate::pipeline::loop_state::LoopState;
use crate::recording::domain::clip::Clip;
use crate::recording::domain::recorder_event::SessionId;
use crate::session::notifications::Toast;

/// User intents fed to [`FaceCamApp::run`](super::app::FaceCamApp::run).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    StartRecording,
    StopRecording,
    ViewSavedVideo,
    CloseViewer,
    Quit,
}

/// State changes published for presenters.
#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    LoopStateChanged(LoopState),
    RecordingChanged(bool),
    ToastShown(Toast),
    ToastCleared,
    /// The clip of `session` landed in storage.
    ClipPersisted { session: SessionId, bytes: usize },
    PersistFailed { session: SessionId, reason: String },
    ViewerOpened(Clip),
    ViewerClosed,
}
