//! `mocap-perception` – turns raw rigid-body samples into pose records.
//!
//! # Modules
//!
//! - [`pose`] – [`pose_record`][pose::pose_record]: copies the position of a
//!   [`RigidBody`][mocap_types::RigidBody] through and converts its quaternion
//!   orientation into roll/pitch/yaw.

pub mod pose;

pub use pose::{EulerAngles, euler_angles, pose_record};
