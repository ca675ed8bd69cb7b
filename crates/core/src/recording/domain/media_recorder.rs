use crossbeam_channel::Sender;
use thiserror::Error;

use crate::capture::domain::live_stream::LiveStream;

use super::recorder_event::{RecorderEvent, SessionId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    /// The platform cannot record this stream at all.
    #[error("recording is not supported: {0}")]
    Unsupported(String),
    #[error("recorder failed to start: {0}")]
    Start(String),
}

/// An encoder attached to a live stream for one session.
///
/// `stop` returns immediately; finalization continues in the background and
/// ends with a `Stopped` or `Failed` event on the channel given at creation.
pub trait MediaRecorder: Send {
    fn start(&mut self) -> Result<(), RecorderError>;

    fn stop(&mut self);

    /// MIME type of the fragments this recorder produces.
    fn mime_type(&self) -> &str;
}

/// Creates recorders bound to a stream.
pub trait RecorderFactory: Send {
    fn create(
        &self,
        stream: &LiveStream,
        session: SessionId,
        events: Sender<RecorderEvent>,
    ) -> Result<Box<dyn MediaRecorder>, RecorderError>;
}
