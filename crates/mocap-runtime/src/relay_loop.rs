//! [`RelayLoop`] – drains frames and fans poses out to the publisher.
//!
//! Each polling round:
//!
//! 1. **Check** – ask the [`PosePublisher`] whether its transport is still
//!    usable.  An unhealthy publisher ends the run with
//!    [`RelayError::TransportUnhealthy`]; there is no retry.
//! 2. **Drain** – poll the [`FrameSource`] back-to-back until it reports
//!    empty, so the receiver's buffer never grows while frames are waiting.
//! 3. **Relay** – for every rigid body of every drained frame, in order,
//!    build the pose record, name the channel (`MOCAP#<n>`) and publish.
//! 4. **Idle** – hand the poll interval to the [`PollSleeper`].
//!
//! The [`RunFlag`] is read at the top of each round only, so once it is
//! cleared at most the drain already in progress completes.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use mocap_hal::ScriptedSource;
//! use mocap_middleware::{BusPublisher, PoseBus};
//! use mocap_runtime::lifecycle::RunFlag;
//! use mocap_runtime::relay_loop::{RelayLoop, RelayLoopConfig};
//! use mocap_types::{Frame, Quaternion, RigidBody, Vec3};
//!
//! let body = RigidBody::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::identity());
//! let source = ScriptedSource::new(vec![Frame::new(Duration::ZERO, vec![body])]);
//! let bus = PoseBus::default();
//! let mut sub = bus.subscribe_channel("MOCAP#1");
//!
//! let run = RunFlag::new();
//! let stopper = run.clone();
//! let mut relay = RelayLoop::with_sleeper(
//!     source,
//!     BusPublisher::new(bus),
//!     move |_: Duration| { stopper.stop(); },
//!     RelayLoopConfig::default(),
//! );
//! let stats = relay.run(&run).unwrap();
//! assert_eq!(stats.published, 1);
//! assert_eq!(sub.try_recv().unwrap().record.x, 1.0);
//! ```

use std::io::{self, Write};
use std::time::Duration;

use mocap_hal::FrameSource;
use mocap_middleware::{PosePublisher, channel_name};
use mocap_perception::pose_record;
use mocap_types::{Frame, RelayError};
use tracing::{debug, error, info, trace, warn};

use crate::lifecycle::RunFlag;
use crate::sleeper::{PollSleeper, ThreadSleeper};

/// Default pause between polling rounds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Tunables for [`RelayLoop`].
#[derive(Debug, Clone)]
pub struct RelayLoopConfig {
    /// Pause after every drain.
    pub poll_interval: Duration,
    /// Print every relayed frame to stdout.
    pub echo_frames: bool,
}

impl Default for RelayLoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            echo_frames: false,
        }
    }
}

/// Counters accumulated over a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub frames: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub rounds: u64,
}

/// The relay orchestrator.  Owns the source, the publisher and the sleeper
/// for the duration of a run.
pub struct RelayLoop<S, P, Z = ThreadSleeper> {
    source: S,
    publisher: P,
    sleeper: Z,
    config: RelayLoopConfig,
    stats: RelayStats,
}

impl<S: FrameSource, P: PosePublisher> RelayLoop<S, P, ThreadSleeper> {
    /// Relay loop that sleeps the thread between rounds.
    pub fn new(source: S, publisher: P, config: RelayLoopConfig) -> Self {
        Self::with_sleeper(source, publisher, ThreadSleeper, config)
    }
}

impl<S: FrameSource, P: PosePublisher, Z: PollSleeper> RelayLoop<S, P, Z> {
    pub fn with_sleeper(source: S, publisher: P, sleeper: Z, config: RelayLoopConfig) -> Self {
        Self {
            source,
            publisher,
            sleeper,
            config,
            stats: RelayStats::default(),
        }
    }

    /// Run until `run` is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::TransportUnhealthy`] as soon as the publisher
    /// reports that its transport is no longer usable.
    pub fn run(&mut self, run: &RunFlag) -> Result<RelayStats, RelayError> {
        info!(
            poll_interval_us = self.config.poll_interval.as_micros() as u64,
            "relay loop started"
        );
        while run.is_running() {
            if !self.publisher.is_healthy() {
                error!(
                    frames = self.stats.frames,
                    published = self.stats.published,
                    "publisher unhealthy, aborting relay"
                );
                return Err(RelayError::TransportUnhealthy(
                    "publisher reported its transport unusable".to_string(),
                ));
            }
            let drained = self.drain();
            if drained > 0 {
                trace!(drained, "drained frames");
            }
            self.stats.rounds += 1;
            self.sleeper.idle(self.config.poll_interval);
        }
        info!(
            frames = self.stats.frames,
            published = self.stats.published,
            publish_failures = self.stats.publish_failures,
            "relay loop stopped"
        );
        Ok(self.stats)
    }

    /// Relay every frame currently available.  Returns the number of frames
    /// drained.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while let Some(frame) = self.source.poll() {
            self.relay_frame(&frame);
            drained += 1;
        }
        drained
    }

    /// Publish one pose per rigid body of `frame`, in body order.
    pub fn relay_frame(&mut self, frame: &Frame) {
        self.stats.frames += 1;
        if self.config.echo_frames {
            let stdout = io::stdout();
            self.echo_to(&mut stdout.lock(), frame);
        }
        for (index, body) in frame.rigid_bodies.iter().enumerate() {
            let channel = channel_name(index);
            let record = pose_record(body);
            match self.publisher.publish(&channel, &record) {
                Ok(()) => self.stats.published += 1,
                Err(e) => {
                    self.stats.publish_failures += 1;
                    warn!(%channel, error = %e, "publish failed");
                }
            }
        }
        debug!(bodies = frame.rigid_bodies.len(), "frame relayed");
    }

    /// Echo `frame` to `out`.  A failed write (e.g. a closed pipe) turns the
    /// echo off for the rest of the run.
    fn echo_to<W: Write>(&mut self, out: &mut W, frame: &Frame) {
        if let Err(e) = writeln!(out, "{frame}") {
            warn!(error = %e, "frame echo failed, disabling echo");
            self.config.echo_frames = false;
        }
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Take the source and publisher back.
    pub fn into_parts(self) -> (S, P) {
        (self.source, self.publisher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocap_hal::{FrameBuffer, ScriptedSource};
    use mocap_types::{PoseRecord, Quaternion, RigidBody, Vec3};

    /// Records every publish; optionally fails a given call and then reports
    /// itself unhealthy.
    #[derive(Default)]
    struct RecordingPublisher {
        calls: Vec<(String, PoseRecord)>,
        fail_call: Option<usize>,
        healthy: bool,
        attempts: usize,
    }

    impl RecordingPublisher {
        fn healthy() -> Self {
            Self {
                healthy: true,
                ..Self::default()
            }
        }

        fn channels(&self) -> Vec<&str> {
            self.calls.iter().map(|(c, _)| c.as_str()).collect()
        }
    }

    impl PosePublisher for RecordingPublisher {
        fn publish(&mut self, channel: &str, record: &PoseRecord) -> Result<(), RelayError> {
            let attempt = self.attempts;
            self.attempts += 1;
            if self.fail_call == Some(attempt) {
                self.healthy = false;
                return Err(RelayError::Publish {
                    channel: channel.to_string(),
                    details: "injected failure".to_string(),
                });
            }
            self.calls.push((channel.to_string(), *record));
            Ok(())
        }

        fn is_healthy(&self) -> bool {
            self.healthy
        }
    }

    fn body(x: f32) -> RigidBody {
        RigidBody::new(Vec3::new(x, 0.0, 0.0), Quaternion::identity())
    }

    fn frame(ms: u64, bodies: Vec<RigidBody>) -> Frame {
        Frame::new(Duration::from_millis(ms), bodies)
    }

    /// Sleeper that clears the run flag after `rounds` idles.
    fn stop_after(run: &RunFlag, rounds: usize) -> impl FnMut(Duration) {
        let run = run.clone();
        let mut seen = 0;
        move |_: Duration| {
            seen += 1;
            if seen >= rounds {
                run.stop();
            }
        }
    }

    #[test]
    fn single_identity_body_end_to_end() {
        let source = ScriptedSource::new(vec![frame(
            0,
            vec![RigidBody::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::identity())],
        )]);
        let run = RunFlag::new();
        let mut relay = RelayLoop::with_sleeper(
            source,
            RecordingPublisher::healthy(),
            stop_after(&run, 1),
            RelayLoopConfig::default(),
        );
        relay.run(&run).unwrap();

        let (_, publisher) = relay.into_parts();
        assert_eq!(publisher.calls.len(), 1);
        let (channel, r) = &publisher.calls[0];
        assert_eq!(channel, "MOCAP#1");
        assert_eq!((r.x, r.y, r.z), (1.0, 2.0, 3.0));
        assert_eq!(r.roll, 0.0);
        assert_eq!(r.pitch, 0.0);
        assert_eq!(r.yaw, f64::from(std::f32::consts::PI));
        assert_eq!(r.timestamp, mocap_types::POSE_TIMESTAMP_UNSET);
    }

    #[test]
    fn bodies_are_published_in_delivery_order() {
        let source = ScriptedSource::new(vec![
            frame(1, vec![body(10.0), body(20.0)]),
            frame(2, vec![body(30.0)]),
        ]);
        let mut relay = RelayLoop::new(source, RecordingPublisher::healthy(), RelayLoopConfig::default());
        assert_eq!(relay.drain(), 2);

        let publisher = relay.publisher();
        assert_eq!(publisher.channels(), vec!["MOCAP#1", "MOCAP#2", "MOCAP#1"]);
        let xs: Vec<f64> = publisher.calls.iter().map(|(_, r)| r.x).collect();
        assert_eq!(xs, vec![10.0, 20.0, 30.0]);
        assert_eq!(relay.stats().frames, 2);
        assert_eq!(relay.stats().published, 3);
    }

    #[test]
    fn stopped_flag_prevents_any_publish() {
        let source = ScriptedSource::new(vec![frame(1, vec![body(1.0)])]);
        let run = RunFlag::new();
        run.stop();
        let mut relay = RelayLoop::with_sleeper(
            source,
            RecordingPublisher::healthy(),
            stop_after(&run, 1),
            RelayLoopConfig::default(),
        );
        let stats = relay.run(&run).unwrap();
        assert_eq!(stats.rounds, 0);
        assert_eq!(stats.published, 0);
        assert_eq!(relay.source().remaining(), 1);
    }

    #[test]
    fn frames_arriving_after_stop_are_not_published() {
        let mut source = FrameBuffer::new(16);
        let producer = source.clone();
        producer.push(frame(1, vec![body(1.0)]));

        let run = RunFlag::new();
        let stopper = run.clone();
        let sleeper = move |_: Duration| {
            stopper.stop();
            producer.push(frame(2, vec![body(2.0)]));
        };
        let mut relay = RelayLoop::with_sleeper(
            source.clone(),
            RecordingPublisher::healthy(),
            sleeper,
            RelayLoopConfig::default(),
        );
        let stats = relay.run(&run).unwrap();

        assert_eq!(stats.published, 1);
        assert_eq!(stats.rounds, 1);
        assert_eq!(relay.publisher().calls[0].1.x, 1.0);
        // The late frame is still waiting in the buffer.
        assert_eq!(source.poll().map(|f| f.timestamp), Some(Duration::from_millis(2)));
    }

    #[test]
    fn unhealthy_publisher_is_fatal() {
        let source = ScriptedSource::new(vec![frame(1, vec![body(1.0)])]);
        let run = RunFlag::new();
        let mut relay = RelayLoop::with_sleeper(
            source,
            RecordingPublisher::default(),
            stop_after(&run, 100),
            RelayLoopConfig::default(),
        );
        let result = relay.run(&run);
        assert!(matches!(result, Err(RelayError::TransportUnhealthy(_))));
        assert!(relay.publisher().calls.is_empty());
        assert!(run.is_running(), "fatal exit must not depend on the run flag");
    }

    #[test]
    fn publish_failure_finishes_frame_then_aborts_next_round() {
        let source = ScriptedSource::new(vec![
            frame(1, vec![body(1.0), body(2.0), body(3.0)]),
        ]);
        let publisher = RecordingPublisher {
            fail_call: Some(1),
            ..RecordingPublisher::healthy()
        };
        let run = RunFlag::new();
        let mut relay = RelayLoop::with_sleeper(
            source,
            publisher,
            stop_after(&run, 100),
            RelayLoopConfig::default(),
        );
        let result = relay.run(&run);

        assert!(matches!(result, Err(RelayError::TransportUnhealthy(_))));
        let stats = relay.stats();
        assert_eq!(stats.publish_failures, 1);
        assert_eq!(stats.published, 2);
        assert_eq!(relay.publisher().channels(), vec!["MOCAP#1", "MOCAP#3"]);
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn echo_writes_frame_display() {
        let config = RelayLoopConfig {
            echo_frames: true,
            ..RelayLoopConfig::default()
        };
        let mut relay = RelayLoop::new(ScriptedSource::default(), RecordingPublisher::healthy(), config);
        let f = frame(5, vec![body(1.0)]);
        let mut out = Vec::new();
        relay.echo_to(&mut out, &f);

        assert_eq!(String::from_utf8(out).unwrap(), format!("{f}\n"));
        assert!(relay.config.echo_frames);
    }

    #[test]
    fn broken_echo_pipe_disables_echo_without_stopping_relay() {
        let config = RelayLoopConfig {
            echo_frames: true,
            ..RelayLoopConfig::default()
        };
        let mut relay = RelayLoop::new(ScriptedSource::default(), RecordingPublisher::healthy(), config);
        let f = frame(5, vec![body(1.0), body(2.0)]);
        relay.echo_to(&mut ClosedPipe, &f);
        assert!(!relay.config.echo_frames);

        relay.relay_frame(&f);
        assert_eq!(relay.stats().published, 2);
    }

    #[test]
    fn idles_with_configured_interval() {
        let run = RunFlag::new();
        let stopper = run.clone();
        let mut periods = Vec::new();
        {
            let sleeper = |d: Duration| {
                periods.push(d);
                if periods.len() == 3 {
                    stopper.stop();
                }
            };
            let config = RelayLoopConfig {
                poll_interval: Duration::from_micros(250),
                echo_frames: false,
            };
            let mut relay = RelayLoop::with_sleeper(
                ScriptedSource::default(),
                RecordingPublisher::healthy(),
                sleeper,
                config,
            );
            assert_eq!(relay.run(&run).unwrap().rounds, 3);
        }
        assert_eq!(periods, vec![Duration::from_micros(250); 3]);
    }

    #[test]
    fn empty_frame_publishes_nothing() {
        let source = ScriptedSource::new(vec![frame(1, vec![])]);
        let mut relay = RelayLoop::new(source, RecordingPublisher::healthy(), RelayLoopConfig::default());
        assert_eq!(relay.drain(), 1);
        assert!(relay.publisher().calls.is_empty());
        assert_eq!(relay.stats().frames, 1);
    }
}
