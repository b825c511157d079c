//! Frame sources that need no capture hardware, for tests and dry runs.
//!
//! - [`ScriptedSource`] – replays a fixed list of frames, then reports empty.
//! - [`SimulatedStream`] – a background thread that pushes synthetic frames
//!   into a [`FrameBuffer`] at a fixed rate, each body circling the origin
//!   while it yaws.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use mocap_hal::sim::ScriptedSource;
//! use mocap_hal::FrameSource;
//! use mocap_types::Frame;
//!
//! let mut source = ScriptedSource::new(vec![
//!     Frame::new(Duration::from_millis(1), vec![]),
//!     Frame::new(Duration::from_millis(2), vec![]),
//! ]);
//! assert!(source.poll().is_some());
//! assert!(source.poll().is_some());
//! assert!(source.poll().is_none());
//! ```

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use mocap_types::{Frame, Quaternion, RelayError, RigidBody, Vec3};
use tracing::info;

use crate::buffer::FrameBuffer;
use crate::source::{FrameSource, ReceiverThread};

// ────────────────────────────────────────────────────────────────────────────
// ScriptedSource
// ────────────────────────────────────────────────────────────────────────────

/// Replays a fixed sequence of frames.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
    last: Option<Duration>,
    delivered: usize,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            last: None,
            delivered: 0,
        }
    }

    /// Queue another frame behind the remaining script.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    /// Frames still waiting to be polled.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Frames handed out so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl FrameSource for ScriptedSource {
    fn poll(&mut self) -> Option<Frame> {
        let frame = self.frames.pop_front()?;
        self.last = Some(frame.timestamp);
        self.delivered += 1;
        Some(frame)
    }

    fn last_timestamp(&self) -> Option<Duration> {
        self.last
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimulatedStream
// ────────────────────────────────────────────────────────────────────────────

/// Synthetic capture stream.
pub struct SimulatedStream;

impl SimulatedStream {
    /// Start pushing frames with `bodies` rigid bodies into `buffer` every
    /// `period` until the returned handle is stopped.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Source`] if the thread cannot be spawned.
    pub fn spawn(
        buffer: FrameBuffer,
        bodies: usize,
        period: Duration,
    ) -> Result<ReceiverThread, RelayError> {
        info!(bodies, period_us = period.as_micros() as u64, "starting simulated capture stream");
        ReceiverThread::spawn("mocap-sim-stream", move |stop| {
            let epoch = Instant::now();
            let mut next = epoch;
            while !stop.load(Ordering::SeqCst) {
                let now = Instant::now();
                if now < next {
                    std::thread::sleep(next - now);
                    continue;
                }
                let t = epoch.elapsed();
                buffer.push(Frame::new(t, Self::sample(bodies, t.as_secs_f32())));
                next += period;
            }
        })
    }

    /// Poses of `bodies` rigid bodies at time `t` seconds.  Body `i` circles
    /// the origin at radius `i + 1` metres, 1.5 m up, facing along its path.
    pub fn sample(bodies: usize, t: f32) -> Vec<RigidBody> {
        (0..bodies)
            .map(|i| {
                let radius = i as f32 + 1.0;
                let angle = t * 0.5 + i as f32 * std::f32::consts::FRAC_PI_4;
                let half = angle * 0.5;
                RigidBody::new(
                    Vec3::new(radius * angle.cos(), radius * angle.sin(), 1.5),
                    Quaternion::new(0.0, 0.0, half.sin(), half.cos()),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ms: u64, bodies: usize) -> Frame {
        Frame::new(Duration::from_millis(ms), SimulatedStream::sample(bodies, 0.0))
    }

    #[test]
    fn scripted_source_replays_in_order() {
        let mut source = ScriptedSource::new(vec![frame(1, 2), frame(2, 1)]);
        assert_eq!(source.remaining(), 2);

        let first = source.poll().unwrap();
        assert_eq!(first.rigid_bodies.len(), 2);
        assert_eq!(source.last_timestamp(), Some(Duration::from_millis(1)));

        let second = source.poll().unwrap();
        assert_eq!(second.rigid_bodies.len(), 1);
        assert!(source.poll().is_none());
        // An empty poll does not disturb the last timestamp.
        assert_eq!(source.last_timestamp(), Some(Duration::from_millis(2)));
        assert_eq!(source.delivered(), 2);
    }

    #[test]
    fn scripted_source_accepts_late_frames() {
        let mut source = ScriptedSource::default();
        assert!(source.poll().is_none());
        source.push(frame(7, 0));
        assert_eq!(source.poll_timestamp(), Some(Duration::from_millis(7)));
    }

    #[test]
    fn sample_produces_unit_quaternions() {
        for body in SimulatedStream::sample(5, 12.3) {
            assert!((body.orientation.norm() - 1.0).abs() < 1e-5);
            assert_eq!(body.position.z, 1.5);
        }
    }

    #[test]
    fn simulated_stream_fills_buffer() {
        let buffer = FrameBuffer::new(1_000);
        let stream = SimulatedStream::spawn(buffer.clone(), 3, Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        stream.join().unwrap();

        assert!(buffer.pushed() > 0);
        let frame = buffer.pop().unwrap();
        assert_eq!(frame.rigid_bodies.len(), 3);
    }
}
