mod settings;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use clap::Parser;
use crossbeam_channel::{Receiver, Sender};

use facecam_core::capture::infrastructure::nokhwa_camera::NokhwaCamera;
use facecam_core::detection::domain::face_detector::{DetectorOptions, DetectorVariant};
use facecam_core::detection::infrastructure::detector_factory::{load_detector, ModelAssets};
use facecam_core::detection::infrastructure::model_resolver::ProgressFn;
use facecam_core::overlay::infrastructure::canvas_surface::{
    CanvasSurface, OverlayHandle, OverlayStyle,
};
use facecam_core::pipeline::frame_clock::FrameClock;
use facecam_core::pipeline::loop_logger::StatsLoopLogger;
use facecam_core::recording::domain::clip::Clip;
use facecam_core::recording::infrastructure::ffmpeg_recorder::FfmpegRecorderFactory;
use facecam_core::session::app::{AppParts, FaceCamApp};
use facecam_core::session::app_event::{AppEvent, Command};
use facecam_core::session::notifications::ToastKind;
use facecam_core::shared::dimensions::Dimensions;
use facecam_core::storage::domain::key_value_store::KeyValueStore;
use facecam_core::storage::infrastructure::file_store::FileStore;
use facecam_core::storage::infrastructure::memory_store::MemoryStore;

use settings::Settings;

/// Live webcam face detection overlay with local clip recording.
#[derive(Parser)]
#[command(name = "facecam")]
struct Cli {
    /// Camera device index.
    #[arg(long)]
    camera: Option<u32>,

    /// Requested capture width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Requested capture height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Detection model: yolo or blazeface.
    #[arg(long)]
    detector: Option<DetectorVariant>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Drop faces smaller than this many pixels.
    #[arg(long)]
    min_face_size: Option<u32>,

    /// Detection loop rate in Hz.
    #[arg(long)]
    refresh_hz: Option<u32>,

    /// Directory searched first for model files.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Never download missing models.
    #[arg(long)]
    no_download: bool,

    /// Clip store file (defaults to the user data directory).
    #[arg(long)]
    storage: Option<PathBuf>,

    /// Byte quota for the clip store.
    #[arg(long)]
    quota: Option<usize>,

    /// Where the `snapshot` command writes the overlay image.
    #[arg(long, default_value = "facecam-snapshot.png")]
    snapshot: PathBuf,

    /// Write the effective settings to the config file and exit.
    #[arg(long)]
    save_settings: bool,
}

impl Cli {
    fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(camera) = self.camera {
            settings.camera_index = camera;
        }
        if let Some(width) = self.width {
            settings.width = width;
        }
        if let Some(height) = self.height {
            settings.height = height;
        }
        if let Some(detector) = self.detector {
            settings.detector = detector;
        }
        if let Some(confidence) = self.confidence {
            settings.confidence = confidence;
        }
        if let Some(min_face_size) = self.min_face_size {
            settings.min_face_size = min_face_size;
        }
        if let Some(refresh_hz) = self.refresh_hz {
            settings.refresh_hz = refresh_hz;
        }
        if let Some(models_dir) = &self.models_dir {
            settings.models_dir = models_dir.clone();
        }
        if self.no_download {
            settings.allow_download = false;
        }
        if self.quota.is_some() {
            settings.storage_quota = self.quota;
        }
        settings
    }
}

/// A line typed on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    App(Command),
    Snapshot,
    Help,
}

fn parse_input(line: &str) -> Option<Input> {
    match line.trim().to_ascii_lowercase().as_str() {
        "r" | "record" | "start" => Some(Input::App(Command::StartRecording)),
        "s" | "stop" => Some(Input::App(Command::StopRecording)),
        "v" | "view" => Some(Input::App(Command::ViewSavedVideo)),
        "c" | "close" => Some(Input::App(Command::CloseViewer)),
        "p" | "snapshot" => Some(Input::Snapshot),
        "q" | "quit" | "exit" => Some(Input::App(Command::Quit)),
        "h" | "help" | "?" => Some(Input::Help),
        _ => None,
    }
}

const HELP: &str = "Commands: [r]ecord, [s]top, [v]iew saved video, [c]lose viewer, sna[p]shot, [q]uit";

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = cli.apply(Settings::load());
    settings.validate()?;

    if cli.save_settings {
        let path = settings.save()?;
        eprintln!("Settings saved to {}", path.display());
        return Ok(());
    }

    let dimensions = Dimensions::new(settings.width, settings.height);
    let surface = CanvasSurface::new(dimensions, OverlayStyle::default());
    let overlay = surface.handle();

    let options = DetectorOptions {
        variant: settings.detector,
        confidence: settings.confidence,
        min_face_size: settings.min_face_size,
    };
    let assets = ModelAssets::new(&settings.models_dir, settings.allow_download);

    let parts = AppParts {
        camera: Box::new(NokhwaCamera::new(settings.camera_index, dimensions)),
        surface: Box::new(surface),
        detector: Box::new(move || {
            let progress = DownloadProgress::default();
            let detector = load_detector(&options, &assets, Some(progress.callback()));
            progress.finish();
            detector
        }),
        recorders: Box::new(FfmpegRecorderFactory::default()),
        store: open_store(cli.storage.clone(), settings.storage_quota),
        clock: FrameClock::display(settings.refresh_hz),
        logger: Box::new(StatsLoopLogger::default()),
    };

    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let presenter = spawn_presenter(events_rx)?;
    let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
    spawn_input(commands_tx, overlay, cli.snapshot.clone())?;

    let mut app = FaceCamApp::new(parts, events_tx);
    app.mount(Instant::now());
    eprintln!("{HELP}");
    app.run(commands_rx);
    app.unmount();
    drop(app);

    if presenter.join().is_err() {
        log::warn!("Presenter thread panicked");
    }
    Ok(())
}

fn open_store(path: Option<PathBuf>, quota: Option<usize>) -> Box<dyn KeyValueStore> {
    let store = path
        .map_or_else(FileStore::default_path, Ok)
        .and_then(|path| FileStore::open(path, quota));
    match store {
        Ok(store) => {
            log::info!("Clip store: {}", store.path().display());
            Box::new(store)
        }
        Err(e) => {
            log::warn!("Clip store unavailable, recordings will not survive a restart: {e}");
            match quota {
                Some(quota) => Box::new(MemoryStore::with_quota(quota)),
                None => Box::new(MemoryStore::new()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

fn spawn_input(
    commands: Sender<Command>,
    overlay: OverlayHandle,
    snapshot_path: PathBuf,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("input".into()).spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match parse_input(&line) {
                Some(Input::App(command)) => {
                    if commands.send(command).is_err() || command == Command::Quit {
                        break;
                    }
                }
                Some(Input::Snapshot) => save_snapshot(&overlay, &snapshot_path),
                Some(Input::Help) => eprintln!("{HELP}"),
                None => eprintln!("Unknown command '{}'. {HELP}", line.trim()),
            }
        }
    })
}

fn save_snapshot(overlay: &OverlayHandle, path: &Path) {
    match overlay.save_snapshot(path) {
        Ok(true) => eprintln!("Snapshot saved to {}", path.display()),
        Ok(false) => eprintln!("Nothing to snapshot yet"),
        Err(e) => eprintln!("Snapshot failed: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

fn spawn_presenter(events: Receiver<AppEvent>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("presenter".into()).spawn(move || {
        let mut playback: Option<tempfile::NamedTempFile> = None;
        for event in events {
            match event {
                AppEvent::LoopStateChanged(state) => eprintln!("[status] {state}"),
                AppEvent::RecordingChanged(true) => eprintln!("[rec] recording..."),
                AppEvent::RecordingChanged(false) => eprintln!("[rec] stopped"),
                AppEvent::ToastShown(toast) => match toast.kind {
                    ToastKind::Info => eprintln!("[toast] {}", toast.message),
                    ToastKind::Error => eprintln!("[toast] error: {}", toast.message),
                },
                AppEvent::ToastCleared => log::debug!("Toast cleared"),
                AppEvent::ClipPersisted { session, bytes } => {
                    log::info!("Clip {session} persisted ({bytes} bytes)");
                }
                AppEvent::PersistFailed { session, reason } => {
                    log::warn!("Clip {session} not saved: {reason}");
                }
                AppEvent::ViewerOpened(clip) => match open_playback(&clip) {
                    Ok(file) => playback = Some(file),
                    Err(e) => eprintln!("[viewer] could not play clip: {e}"),
                },
                AppEvent::ViewerClosed => eprintln!("[viewer] closed"),
            }
            let _ = std::io::stderr().flush();
        }
        drop(playback);
    })
}

/// Writes the clip to a temporary file and hands it to the system player.
/// The file lives until the next clip is opened or the program exits.
fn open_playback(clip: &Clip) -> Result<tempfile::NamedTempFile, Box<dyn std::error::Error>> {
    let mut file = tempfile::Builder::new()
        .prefix("facecam-playback-")
        .suffix(&format!(".{}", clip.extension()))
        .tempfile()?;
    file.write_all(&clip.bytes)?;
    file.flush()?;
    open::that(file.path())?;
    eprintln!("[viewer] playing {} ({} bytes)", file.path().display(), clip.len());
    Ok(file)
}

/// Single-line download progress on stderr.
#[derive(Default)]
struct DownloadProgress {
    shown: Arc<AtomicBool>,
}

impl DownloadProgress {
    fn callback(&self) -> ProgressFn {
        let shown = Arc::clone(&self.shown);
        Box::new(move |downloaded, total| {
            shown.store(true, Ordering::Relaxed);
            eprint!("\r{}", progress_line(downloaded, total));
        })
    }

    /// Terminates the progress line. Returns false when nothing was drawn.
    fn finish(&self) -> bool {
        let shown = self.shown.load(Ordering::Relaxed);
        if shown {
            eprintln!();
        }
        shown
    }
}

fn progress_line(downloaded: u64, total: u64) -> String {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        format!("Downloading face detection model... {pct}%")
    } else {
        format!("Downloading face detection model... {downloaded} bytes")
    }
}
