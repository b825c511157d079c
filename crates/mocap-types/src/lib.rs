use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value written into [`PoseRecord::timestamp`] by the relay.  The capture
/// time of the frame is not propagated into pose records.
pub const POSE_TIMESTAMP_UNSET: i64 = 0;

/// A 3-D position in the capture volume.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Orientation quaternion as reported by the capture server.
///
/// The relay never re-normalizes it: whatever the source hands over flows
/// straight into the pose transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub qx: f32,
    pub qy: f32,
    pub qz: f32,
    pub qw: f32,
}

impl Quaternion {
    pub fn new(qx: f32, qy: f32, qz: f32, qw: f32) -> Self {
        Self { qx, qy, qz, qw }
    }

    /// `(0, 0, 0, 1)`.
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Euclidean norm of the four components.
    pub fn norm(&self) -> f32 {
        (self.qx * self.qx + self.qy * self.qy + self.qz * self.qz + self.qw * self.qw).sqrt()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// One tracked object inside a [`Frame`].
///
/// A rigid body carries no identifier of its own; it is addressed by its
/// position in [`Frame::rigid_bodies`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RigidBody {
    pub position: Vec3,
    pub orientation: Quaternion,
}

impl RigidBody {
    pub fn new(position: Vec3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

/// A sampled snapshot of every tracked rigid body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonic capture (arrival) time, relative to an epoch chosen by the
    /// frame source.
    pub timestamp: Duration,
    pub rigid_bodies: Vec<RigidBody>,
}

impl Frame {
    pub fn new(timestamp: Duration, rigid_bodies: Vec<RigidBody>) -> Self {
        Self {
            timestamp,
            rigid_bodies,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame @ {:.6} s, {} rigid bodies",
            self.timestamp.as_secs_f64(),
            self.rigid_bodies.len()
        )?;
        for (i, body) in self.rigid_bodies.iter().enumerate() {
            let p = body.position;
            let q = body.orientation;
            write!(
                f,
                "\n  [{i}] loc ({:.4}, {:.4}, {:.4}) ori ({:.4}, {:.4}, {:.4}, {:.4})",
                p.x, p.y, p.z, q.qx, q.qy, q.qz, q.qw
            )?;
        }
        Ok(())
    }
}

/// Position plus roll/pitch/yaw of one rigid body, ready for publishing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    pub timestamp: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// A pose record addressed to a named channel, as carried on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseMessage {
    pub channel: String,
    pub record: PoseRecord,
}

/// Error type shared by every crate of the relay.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum RelayError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Transport Unhealthy: {0}")]
    TransportUnhealthy(String),

    #[error("Publish Error on {channel}: {details}")]
    Publish { channel: String, details: String },

    #[error("Frame Source Error: {0}")]
    Source(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("I/O Error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quaternion_identity_has_unit_norm() {
        let q = Quaternion::identity();
        assert!((q.norm() - 1.0).abs() < f32::EPSILON);
        assert_eq!(q.qw, 1.0);
    }

    #[test]
    fn pose_message_json_carries_channel() {
        let msg = PoseMessage {
            channel: "MOCAP#1".to_string(),
            record: PoseRecord {
                timestamp: POSE_TIMESTAMP_UNSET,
                x: 0.5,
                y: 0.0,
                z: -0.5,
                roll: 0.0,
                pitch: 0.0,
                yaw: 0.0,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"channel\":\"MOCAP#1\""));
        let back: PoseMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn frame_display_lists_every_body() {
        let frame = Frame::new(
            Duration::from_millis(1500),
            vec![
                RigidBody::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::identity()),
                RigidBody::default(),
            ],
        );
        let text = frame.to_string();
        assert!(text.starts_with("Frame @ 1.500000 s, 2 rigid bodies"));
        assert!(text.contains("[0] loc (1.0000, 2.0000, 3.0000)"));
        assert!(text.contains("[1]"));
    }

    #[test]
    fn relay_error_display() {
        let err = RelayError::Publish {
            channel: "MOCAP#3".to_string(),
            details: "socket closed".to_string(),
        };
        assert!(err.to_string().contains("MOCAP#3"));

        let io: RelayError = std::io::Error::other("boom").into();
        assert!(matches!(io, RelayError::Io(_)));
    }
}
