use crate::pipeline::loop_state::LoopState;
use crate::recording::domain::clip::Clip;
use crate::session::notifications::{Notifications, Toast};

/// What the loading indicator shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Ready,
    Failed(String),
}

impl From<&LoopState> for LoadStatus {
    fn from(state: &LoopState) -> Self {
        match state {
            LoopState::Failed(reason) => LoadStatus::Failed(reason.clone()),
            LoopState::Idle => LoadStatus::Loading,
            s if s.is_loading() => LoadStatus::Loading,
            _ => LoadStatus::Ready,
        }
    }
}

/// Transient UI state. Nothing here is persisted.
#[derive(Debug)]
pub struct ViewState {
    pub load_status: LoadStatus,
    pub is_recording: bool,
    pub notifications: Notifications,
    pub modal_open: bool,
    pub playback: Option<Clip>,
}

impl ViewState {
    pub fn toast(&self) -> Option<&Toast> {
        self.notifications.current()
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            load_status: LoadStatus::Loading,
            is_recording: false,
            notifications: Notifications::default(),
            modal_open: false,
            playback: None,
        }
    }
}
