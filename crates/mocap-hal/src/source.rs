//! The [`FrameSource`] trait and the background receiver handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use mocap_types::{Frame, RelayError};
use tracing::{debug, info};

/// Something the relay can pull frames from.
///
/// Implementations are polled from a single consumer thread and must never
/// block: an empty source returns `None` immediately.
pub trait FrameSource: Send {
    /// Take the next frame, or `None` if nothing new has arrived.
    fn poll(&mut self) -> Option<Frame>;

    /// Capture timestamp of the frame most recently returned by
    /// [`FrameSource::poll`].
    fn last_timestamp(&self) -> Option<Duration>;

    /// Take the next frame and keep only its timestamp.
    fn poll_timestamp(&mut self) -> Option<Duration> {
        self.poll().map(|frame| frame.timestamp)
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn poll(&mut self) -> Option<Frame> {
        (**self).poll()
    }

    fn last_timestamp(&self) -> Option<Duration> {
        (**self).last_timestamp()
    }
}

/// Handle to a background thread that feeds a [`FrameBuffer`][crate::FrameBuffer].
///
/// [`ReceiverThread::stop`] asks the thread to exit; [`ReceiverThread::join`]
/// waits for it.  Dropping the handle does both.
pub struct ReceiverThread {
    name: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReceiverThread {
    /// Spawn `body` on a named thread.  `body` receives the stop flag and is
    /// expected to return promptly once it reads `true`.
    pub(crate) fn spawn<F>(name: &str, body: F) -> Result<Self, RelayError>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(thread_stop))
            .map_err(|e| RelayError::Source(format!("failed to spawn {name}: {e}")))?;
        info!(thread = name, "receiver started");
        Ok(Self {
            name: name.to_string(),
            stop,
            handle: Some(handle),
        })
    }

    /// Ask the receiver to exit.  Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// `true` while the thread has not finished.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the receiver and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Source`] if the receiver thread panicked.
    pub fn join(mut self) -> Result<(), RelayError> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<(), RelayError> {
        self.stop();
        match self.handle.take() {
            Some(handle) => {
                let result = handle
                    .join()
                    .map_err(|_| RelayError::Source(format!("{} panicked", self.name)));
                debug!(thread = %self.name, "receiver joined");
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for ReceiverThread {
    fn drop(&mut self) {
        let _ = self.stop_and_join();
    }
}
