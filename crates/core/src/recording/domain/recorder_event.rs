use std::fmt;

/// Identifies one start/stop recording cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Message sent by a recorder back to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecorderEvent {
    pub session: SessionId,
    pub kind: RecorderEventKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecorderEventKind {
    /// One encoded fragment, in capture order.
    Data(Vec<u8>),
    /// Finalization finished; no more data follows for this session.
    Stopped,
    /// The recorder gave up; the session's data must be discarded.
    Failed(String),
}

impl RecorderEvent {
    pub fn data(session: SessionId, bytes: Vec<u8>) -> Self {
        Self {
            session,
            kind: RecorderEventKind::Data(bytes),
        }
    }

    pub fn stopped(session: SessionId) -> Self {
        Self {
            session,
            kind: RecorderEventKind::Stopped,
        }
    }

    pub fn failed(session: SessionId, reason: impl Into<String>) -> Self {
        Self {
            session,
            kind: RecorderEventKind::Failed(reason.into()),
        }
    }
}
