use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::shared::dimensions::Dimensions;
use crate::shared::frame::Frame;

/// Handle to a running camera stream.
///
/// Cloning is cheap; every clone refers to the same stream. The producer
/// publishes frames, the detection loop reads the latest one and recorders
/// subscribe to receive every frame in order. Once stopped, the stream
/// stays stopped.
#[derive(Clone)]
pub struct LiveStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    dimensions: Mutex<Dimensions>,
    latest: Mutex<Option<Frame>>,
    subscribers: Mutex<Vec<Sender<Frame>>>,
    active: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LiveStream {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                dimensions: Mutex::new(dimensions),
                latest: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
                active: AtomicBool::new(true),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Intrinsic size of the video as delivered by the device.
    pub fn dimensions(&self) -> Dimensions {
        *lock(&self.inner.dimensions)
    }

    /// Devices may settle on a different size than the one requested.
    pub fn set_dimensions(&self, dimensions: Dimensions) {
        *lock(&self.inner.dimensions) = dimensions;
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Most recent frame, if any has arrived yet.
    pub fn latest_frame(&self) -> Option<Frame> {
        lock(&self.inner.latest).clone()
    }

    /// Makes `frame` the latest and forwards it to every live subscriber.
    /// Ignored once the stream has been stopped.
    pub fn publish(&self, frame: Frame) {
        if !self.is_active() {
            return;
        }
        {
            let mut dims = lock(&self.inner.dimensions);
            if dims.is_empty() {
                *dims = frame.dimensions();
            }
        }
        lock(&self.inner.subscribers).retain(|tx| tx.send(frame.clone()).is_ok());
        *lock(&self.inner.latest) = Some(frame);
    }

    /// Receives every frame published from now on. The channel closes when
    /// the stream stops.
    pub fn subscribe(&self) -> Receiver<Frame> {
        let (tx, rx) = crossbeam_channel::unbounded();
        if self.is_active() {
            lock(&self.inner.subscribers).push(tx);
        }
        rx
    }

    /// Registers the producer thread so [`stop`](Self::stop) can join it.
    pub fn attach_worker(&self, handle: JoinHandle<()>) {
        *lock(&self.inner.worker) = Some(handle);
    }

    /// Stops every track: marks the stream inactive, closes subscriber
    /// channels and waits for the producer thread to release the device.
    /// Safe to call more than once.
    pub fn stop(&self) {
        let was_active = self.inner.active.swap(false, Ordering::SeqCst);
        lock(&self.inner.subscribers).clear();

        let worker = lock(&self.inner.worker).take();
        if let Some(handle) = worker {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::warn!("Camera worker panicked during shutdown");
            }
        }
        if was_active {
            log::debug!("Live stream stopped");
        }
    }
}

impl std::fmt::Debug for LiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStream")
            .field("dimensions", &self.dimensions())
            .field("active", &self.is_active())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
