use std::fmt;

/// Lifecycle of the capture/detect/render loop.
///
/// `Idle → LoadingModels → StartingCamera → Detecting → Stopped`, with
/// `Failed` reachable from the two startup phases. `Stopped` is terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    LoadingModels,
    StartingCamera,
    Detecting,
    Stopped,
    Failed(String),
}

impl LoopState {
    /// Whether the loop may move from `self` to `next`.
    pub fn can_transition_to(&self, next: &LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Idle, LoadingModels)
                | (LoadingModels, StartingCamera)
                | (LoadingModels, Failed(_))
                | (StartingCamera, Detecting)
                | (StartingCamera, Failed(_))
                | (Idle | LoadingModels | StartingCamera | Detecting | Failed(_), Stopped)
        )
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoopState::LoadingModels | LoopState::StartingCamera)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Idle => write!(f, "idle"),
            LoopState::LoadingModels => write!(f, "loading models"),
            LoopState::StartingCamera => write!(f, "starting camera"),
            LoopState::Detecting => write!(f, "detecting"),
            LoopState::Stopped => write!(f, "stopped"),
            LoopState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}
