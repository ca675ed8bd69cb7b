use thiserror::Error;

use crate::capture::domain::live_stream::LiveStream;

/// Camera acquisition failures. Both are recoverable: the application keeps
/// running with a blank video area.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
}

impl CameraError {
    /// Classifies a backend error message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        if ["permission", "denied", "not authorized", "unauthorized"]
            .iter()
            .any(|needle| lower.contains(needle))
        {
            CameraError::PermissionDenied(message)
        } else {
            CameraError::DeviceUnavailable(message)
        }
    }
}

/// Source of live video.
///
/// `open` acquires the device and returns a stream that keeps producing
/// frames until [`LiveStream::stop`] is called.
pub trait Camera: Send {
    fn open(&mut self) -> Result<LiveStream, CameraError>;
}
