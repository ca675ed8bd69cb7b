use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, Receiver, Sender};
use tempfile::NamedTempFile;

use crate::capture::domain::live_stream::LiveStream;
use crate::recording::domain::media_recorder::{MediaRecorder, RecorderError, RecorderFactory};
use crate::recording::domain::recorder_event::{RecorderEvent, SessionId};
use crate::shared::frame::Frame;

use super::mp4_encoder::Mp4Encoder;

pub const MP4_MIME_TYPE: &str = "video/mp4";

/// Size of the data fragments delivered after finalization.
pub const FRAGMENT_SIZE: usize = 256 * 1024;

/// Builds [`FfmpegRecorder`]s encoding at a fixed frame rate.
pub struct FfmpegRecorderFactory {
    fps: u32,
}

impl FfmpegRecorderFactory {
    pub fn new(fps: u32) -> Self {
        Self { fps }
    }
}

impl Default for FfmpegRecorderFactory {
    fn default() -> Self {
        Self::new(30)
    }
}

impl RecorderFactory for FfmpegRecorderFactory {
    fn create(
        &self,
        stream: &LiveStream,
        session: SessionId,
        events: Sender<RecorderEvent>,
    ) -> Result<Box<dyn MediaRecorder>, RecorderError> {
        if !stream.is_active() {
            return Err(RecorderError::Unsupported("the stream has ended".into()));
        }
        ffmpeg_next::init().map_err(|e| RecorderError::Unsupported(e.to_string()))?;
        if ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).is_none() {
            return Err(RecorderError::Unsupported(
                "MPEG4 encoder not available".into(),
            ));
        }
        Ok(Box::new(FfmpegRecorder {
            stream: stream.clone(),
            session,
            events,
            fps: self.fps,
            stop_tx: None,
            worker: None,
        }))
    }
}

/// Records a live stream to MP4 on a background thread.
///
/// Frames are encoded into a temporary file as they arrive. After `stop`
/// the file is finalized, read back and delivered as `Data` fragments
/// followed by `Stopped`.
pub struct FfmpegRecorder {
    stream: LiveStream,
    session: SessionId,
    events: Sender<RecorderEvent>,
    fps: u32,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl MediaRecorder for FfmpegRecorder {
    fn start(&mut self) -> Result<(), RecorderError> {
        if self.worker.is_some() {
            return Err(RecorderError::Start("recorder already started".into()));
        }
        let file = tempfile::Builder::new()
            .prefix("facecam-")
            .suffix(".mp4")
            .tempfile()
            .map_err(|e| RecorderError::Start(e.to_string()))?;

        let frames = self.stream.subscribe();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let job = RecordingJob {
            session: self.session,
            events: self.events.clone(),
            fps: self.fps,
            file,
        };
        let handle = thread::Builder::new()
            .name(format!("recorder-{}", self.session.0))
            .spawn(move || job.run(frames, stop_rx))
            .map_err(|e| RecorderError::Start(e.to_string()))?;

        log::info!("Recording session {} started", self.session);
        self.stop_tx = Some(stop_tx);
        self.worker = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
            log::info!("Recording session {} stopping", self.session);
        }
    }

    fn mime_type(&self) -> &str {
        MP4_MIME_TYPE
    }
}

struct RecordingJob {
    session: SessionId,
    events: Sender<RecorderEvent>,
    fps: u32,
    file: NamedTempFile,
}

impl RecordingJob {
    fn run(self, frames: Receiver<Frame>, stop: Receiver<()>) {
        let session = self.session;
        let result = self
            .encode(frames, stop)
            .and_then(|count| {
                let bytes = std::fs::read(self.file.path())?;
                Ok((count, bytes))
            });

        match result {
            Ok((count, bytes)) => {
                log::info!(
                    "Recording session {session} finalized: {count} frames, {} bytes",
                    bytes.len()
                );
                for chunk in bytes.chunks(FRAGMENT_SIZE) {
                    if self.events.send(RecorderEvent::data(session, chunk.to_vec())).is_err() {
                        return;
                    }
                }
                let _ = self.events.send(RecorderEvent::stopped(session));
            }
            Err(e) => {
                log::warn!("Recording session {session} failed: {e}");
                let _ = self.events.send(RecorderEvent::failed(session, e.to_string()));
            }
        }
    }

    /// Encodes until stopped or the stream ends. Frames already queued when
    /// the stop arrives are still written.
    fn encode(
        &self,
        frames: Receiver<Frame>,
        stop: Receiver<()>,
    ) -> Result<i64, Box<dyn std::error::Error>> {
        let mut encoder: Option<Mp4Encoder> = None;
        loop {
            select! {
                recv(stop) -> _ => {
                    for frame in frames.try_iter() {
                        self.write(&mut encoder, &frame)?;
                    }
                    break;
                }
                recv(frames) -> frame => match frame {
                    Ok(frame) => self.write(&mut encoder, &frame)?,
                    Err(_) => break,
                },
            }
        }

        let encoder = encoder.ok_or("no frames were captured")?;
        let count = encoder.frame_count();
        encoder.finish()?;
        Ok(count)
    }

    fn write(
        &self,
        encoder: &mut Option<Mp4Encoder>,
        frame: &Frame,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if encoder.is_none() {
            *encoder = Some(Mp4Encoder::open(
                self.file.path(),
                frame.dimensions(),
                self.fps,
            )?);
        }
        let Some(encoder) = encoder.as_mut() else {
            return Ok(());
        };
        if frame.dimensions() != encoder.dimensions() {
            log::debug!(
                "Skipping {} frame in a {} recording",
                frame.dimensions(),
                encoder.dimensions()
            );
            return Ok(());
        }
        encoder.write(frame)
    }
}
