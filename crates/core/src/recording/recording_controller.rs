use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::capture::domain::live_stream::LiveStream;
use crate::recording::domain::clip::{Clip, ClipError};
use crate::recording::domain::media_recorder::{MediaRecorder, RecorderError, RecorderFactory};
use crate::recording::domain::recorder_event::{RecorderEvent, RecorderEventKind, SessionId};
use crate::shared::constants::RECORDED_VIDEO_KEY;
use crate::storage::domain::key_value_store::{KeyValueStore, StorageError};

#[derive(Debug)]
pub enum StartOutcome {
    Started(SessionId),
    Ignored(StartIgnored),
    /// The recorder could not be created or started; nothing changed.
    Failed(RecorderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartIgnored {
    AlreadyRecording,
    NoStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Finalization was requested; a persist outcome follows later.
    Stopping(SessionId),
    NotRecording,
}

/// End of a session's asynchronous finalize.
#[derive(Debug)]
pub enum PersistOutcome {
    Saved { session: SessionId, bytes: usize },
    /// The store rejected the clip; the previously saved clip is intact.
    StorageFailed { session: SessionId, error: StorageError },
    /// Nothing was written: the recorder failed or produced no data.
    Abandoned { session: SessionId, reason: String },
}

impl PersistOutcome {
    pub fn session(&self) -> SessionId {
        match self {
            PersistOutcome::Saved { session, .. }
            | PersistOutcome::StorageFailed { session, .. }
            | PersistOutcome::Abandoned { session, .. } => *session,
        }
    }
}

#[derive(Error, Debug)]
pub enum ViewError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Clip(#[from] ClipError),
}

struct PendingSession {
    mime_type: String,
    fragments: Vec<Vec<u8>>,
    recorder: Box<dyn MediaRecorder>,
}

/// Record → save → playback state machine.
///
/// Recorders report back through a channel; the owner feeds each received
/// event to [`handle_event`](Self::handle_event) on its own thread. Every
/// session buffers its own fragments, so a session still finalizing never
/// mixes with a newer one.
pub struct RecordingController {
    factory: Box<dyn RecorderFactory>,
    store: Box<dyn KeyValueStore>,
    events_tx: Sender<RecorderEvent>,
    events_rx: Receiver<RecorderEvent>,
    sessions: HashMap<SessionId, PendingSession>,
    active: Option<SessionId>,
    next_session: u64,
}

impl RecordingController {
    pub fn new(factory: Box<dyn RecorderFactory>, store: Box<dyn KeyValueStore>) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            factory,
            store,
            events_tx,
            events_rx,
            sessions: HashMap::new(),
            active: None,
            next_session: 1,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.active
    }

    /// Sessions started but not yet persisted or abandoned.
    pub fn pending_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Recorder events waiting to be passed to `handle_event`.
    pub fn events(&self) -> Receiver<RecorderEvent> {
        self.events_rx.clone()
    }

    pub fn start(&mut self, stream: Option<&LiveStream>) -> StartOutcome {
        if self.is_recording() {
            log::debug!("Start ignored: already recording");
            return StartOutcome::Ignored(StartIgnored::AlreadyRecording);
        }
        let Some(stream) = stream.filter(|s| s.is_active()) else {
            log::debug!("Start ignored: no live stream");
            return StartOutcome::Ignored(StartIgnored::NoStream);
        };

        let session = SessionId(self.next_session);
        let mut recorder = match self.factory.create(stream, session, self.events_tx.clone()) {
            Ok(recorder) => recorder,
            Err(e) => {
                log::warn!("Cannot record: {e}");
                return StartOutcome::Failed(e);
            }
        };
        if let Err(e) = recorder.start() {
            log::warn!("Cannot record: {e}");
            return StartOutcome::Failed(e);
        }

        self.next_session += 1;
        self.sessions.insert(
            session,
            PendingSession {
                mime_type: recorder.mime_type().to_string(),
                fragments: Vec::new(),
                recorder,
            },
        );
        self.active = Some(session);
        log::info!("Recording {session} started");
        StartOutcome::Started(session)
    }

    /// Asks the active recorder to finalize. The recording flag clears
    /// immediately; the save lands later through `handle_event`.
    pub fn stop(&mut self) -> StopOutcome {
        let Some(session) = self.active.take() else {
            return StopOutcome::NotRecording;
        };
        if let Some(pending) = self.sessions.get_mut(&session) {
            pending.recorder.stop();
        }
        log::info!("Recording {session} stopped, finalizing");
        StopOutcome::Stopping(session)
    }

    /// Applies one recorder event. Returns an outcome when a session
    /// finished finalizing.
    pub fn handle_event(&mut self, event: RecorderEvent) -> Option<PersistOutcome> {
        let session = event.session;
        let Some(pending) = self.sessions.get_mut(&session) else {
            log::debug!("Dropping event for unknown session {session}");
            return None;
        };

        match event.kind {
            RecorderEventKind::Data(bytes) => {
                if !bytes.is_empty() {
                    pending.fragments.push(bytes);
                }
                None
            }
            RecorderEventKind::Stopped => {
                let pending = self.finish(session)?;
                Some(self.persist(session, pending))
            }
            RecorderEventKind::Failed(reason) => {
                self.finish(session)?;
                log::warn!("Recording {session} abandoned: {reason}");
                Some(PersistOutcome::Abandoned { session, reason })
            }
        }
    }

    /// Handles every event already queued.
    pub fn drain_events(&mut self) -> Vec<PersistOutcome> {
        let queued: Vec<_> = self.events_rx.try_iter().collect();
        queued
            .into_iter()
            .filter_map(|event| self.handle_event(event))
            .collect()
    }

    /// Reads the saved clip. Never modifies storage or recording state.
    pub fn view_saved(&self) -> Result<Option<Clip>, ViewError> {
        match self.store.get(RECORDED_VIDEO_KEY)? {
            Some(uri) => Ok(Some(Clip::from_data_uri(&uri)?)),
            None => Ok(None),
        }
    }

    fn finish(&mut self, session: SessionId) -> Option<PendingSession> {
        if self.active == Some(session) {
            self.active = None;
        }
        self.sessions.remove(&session)
    }

    fn persist(&mut self, session: SessionId, pending: PendingSession) -> PersistOutcome {
        if pending.fragments.is_empty() {
            log::warn!("Recording {session} produced no data");
            return PersistOutcome::Abandoned {
                session,
                reason: "recording produced no data".into(),
            };
        }

        let clip = Clip::from_fragments(pending.mime_type, &pending.fragments);
        match self.store.set(RECORDED_VIDEO_KEY, &clip.to_data_uri()) {
            Ok(()) => {
                log::info!("Recording {session} saved ({} bytes)", clip.len());
                PersistOutcome::Saved {
                    session,
                    bytes: clip.len(),
                }
            }
            Err(error) => {
                log::warn!("Recording {session} could not be saved: {error}");
                PersistOutcome::StorageFailed { session, error }
            }
        }
    }
}
