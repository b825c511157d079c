//! [`FrameBuffer`] – bounded hand-off between a receiver thread and the relay.
//!
//! The receiver pushes from its own thread while the relay polls from
//! another, so the queue sits behind a mutex.  Both sides hold clones of the
//! same buffer.  When the queue is full the oldest frame is discarded: a
//! realtime consumer wants the freshest pose, not a backlog.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use mocap_hal::{FrameBuffer, FrameSource};
//! use mocap_types::Frame;
//!
//! let mut buffer = FrameBuffer::new(2);
//! let producer = buffer.clone();
//! producer.push(Frame::new(Duration::from_millis(1), vec![]));
//!
//! assert!(buffer.poll().is_some());
//! assert!(buffer.poll().is_none());
//! assert_eq!(buffer.last_timestamp(), Some(Duration::from_millis(1)));
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mocap_types::Frame;
use tracing::warn;

use crate::source::FrameSource;

/// Default number of frames held before the oldest is dropped.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64;

struct BufferState {
    frames: VecDeque<Frame>,
    last_delivered: Option<Duration>,
}

struct Shared {
    state: Mutex<BufferState>,
    capacity: usize,
    pushed: AtomicU64,
    dropped: AtomicU64,
}

/// Thread-safe, bounded FIFO of frames.  Clone it to share.
#[derive(Clone)]
pub struct FrameBuffer {
    shared: Arc<Shared>,
}

impl FrameBuffer {
    /// Create a buffer holding at most `capacity` frames (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BufferState {
                    frames: VecDeque::with_capacity(capacity),
                    last_delivered: None,
                }),
                capacity,
                pushed: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Append a frame, evicting the oldest one when the buffer is full.
    pub fn push(&self, frame: Frame) {
        let evicted = {
            let mut state = self.lock();
            let evicted = if state.frames.len() >= self.shared.capacity {
                state.frames.pop_front().is_some()
            } else {
                false
            };
            state.frames.push_back(frame);
            evicted
        };
        self.shared.pushed.fetch_add(1, Ordering::Relaxed);
        if evicted {
            let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            // Log the first drop and then every power of two.
            if dropped.is_power_of_two() {
                warn!(dropped, capacity = self.shared.capacity, "frame buffer full, dropping oldest frames");
            }
        }
    }

    /// Remove and return the oldest frame, if any.  Never blocks on an empty
    /// buffer.
    pub fn pop(&self) -> Option<Frame> {
        let mut state = self.lock();
        let frame = state.frames.pop_front()?;
        state.last_delivered = Some(frame.timestamp);
        Some(frame)
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Total frames ever pushed.
    pub fn pushed(&self) -> u64 {
        self.shared.pushed.load(Ordering::Relaxed)
    }

    /// Frames evicted because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        // A panicking producer cannot leave the queue half-updated.
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameSource for FrameBuffer {
    fn poll(&mut self) -> Option<Frame> {
        self.pop()
    }

    fn last_timestamp(&self) -> Option<Duration> {
        self.lock().last_delivered
    }
}
