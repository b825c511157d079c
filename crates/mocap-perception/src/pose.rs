//! Pose transform.
//!
//! Converts a [`RigidBody`] (position + orientation quaternion) into the
//! six-component [`PoseRecord`] published on the bus.  The Euler convention is
//! fixed and must not be swapped for a "textbook" one; downstream consumers
//! decode the angles with exactly these formulas:
//!
//! ```text
//! roll  = atan2( 2(qx·qy + qz·qw), 1 − 2(qy² + qz²) )
//! pitch = asin ( 2(qx·qz − qw·qy) )
//! yaw   = atan2( 2(qx·qw + qy·qz), 1 − 2(qz² + qw²) )
//! ```
//!
//! # Example
//!
//! ```rust
//! use mocap_perception::pose::pose_record;
//! use mocap_types::{Quaternion, RigidBody, Vec3};
//!
//! let body = RigidBody::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::identity());
//! let record = pose_record(&body);
//! assert_eq!((record.x, record.y, record.z), (1.0, 2.0, 3.0));
//! assert_eq!(record.roll, 0.0);
//! assert_eq!(record.pitch, 0.0);
//! ```

use mocap_types::{POSE_TIMESTAMP_UNSET, PoseRecord, Quaternion, RigidBody};

/// Roll/pitch/yaw in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Convert `q` to Euler angles.
///
/// Total over all finite inputs: the quaternion is not validated or
/// normalized, and the `asin` argument is clamped to `[-1, 1]` so rounding
/// near gimbal lock cannot produce NaN.
pub fn euler_angles(q: &Quaternion) -> EulerAngles {
    let qx = f64::from(q.qx);
    let qy = f64::from(q.qy);
    let qz = f64::from(q.qz);
    let qw = f64::from(q.qw);

    let roll = (2.0 * (qx * qy + qz * qw)).atan2(1.0 - 2.0 * (qy * qy + qz * qz));
    let pitch = (2.0 * (qx * qz - qw * qy)).clamp(-1.0, 1.0).asin();
    let yaw = (2.0 * (qx * qw + qy * qz)).atan2(1.0 - 2.0 * (qz * qz + qw * qw));

    EulerAngles { roll, pitch, yaw }
}

/// Build the [`PoseRecord`] for one rigid body.
///
/// The record's timestamp is always [`POSE_TIMESTAMP_UNSET`].  Angles are
/// rounded to single precision before widening, so published values match
/// poses recorded by the capture tooling bit for bit.
pub fn pose_record(body: &RigidBody) -> PoseRecord {
    let euler = euler_angles(&body.orientation);
    PoseRecord {
        timestamp: POSE_TIMESTAMP_UNSET,
        x: f64::from(body.position.x),
        y: f64::from(body.position.y),
        z: f64::from(body.position.z),
        roll: single_precision(euler.roll),
        pitch: single_precision(euler.pitch),
        yaw: single_precision(euler.yaw),
    }
}

fn single_precision(angle: f64) -> f64 {
    f64::from(angle as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocap_types::Vec3;
    use std::f32::consts::FRAC_1_SQRT_2;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn assert_finite(e: &EulerAngles) {
        assert!(e.roll.is_finite(), "roll not finite: {e:?}");
        assert!(e.pitch.is_finite(), "pitch not finite: {e:?}");
        assert!(e.yaw.is_finite(), "yaw not finite: {e:?}");
    }

    #[test]
    fn identity_body_copies_position() {
        let body = RigidBody::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::identity());
        let r = pose_record(&body);
        assert_eq!(r.x, 1.0);
        assert_eq!(r.y, 2.0);
        assert_eq!(r.z, 3.0);
        assert_eq!(r.timestamp, POSE_TIMESTAMP_UNSET);
    }

    #[test]
    fn record_angles_are_single_precision() {
        let body = RigidBody::new(Vec3::new(0.0, 0.0, 0.0), Quaternion::identity());
        assert_eq!(pose_record(&body).yaw, f64::from(std::f32::consts::PI));

        let q = Quaternion::new(0.1, 0.3, -0.2, 0.9);
        let r = pose_record(&RigidBody::new(Vec3::new(0.0, 0.0, 0.0), q));
        let e = euler_angles(&q);
        for (published, exact) in [(r.roll, e.roll), (r.pitch, e.pitch), (r.yaw, e.yaw)] {
            assert_eq!(published, f64::from(published as f32));
            assert_eq!(published, f64::from(exact as f32));
        }
    }

    #[test]
    fn identity_quaternion_angles() {
        let e = euler_angles(&Quaternion::identity());
        assert_eq!(e.roll, 0.0);
        assert_eq!(e.pitch, 0.0);
        // qw enters the yaw denominator: 1 - 2(0 + 1) = -1, so atan2(0, -1).
        assert!((e.yaw - PI).abs() < 1e-12, "yaw = {}", e.yaw);
    }

    #[test]
    fn x_and_w_pair_gives_quarter_yaw() {
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let e = euler_angles(&q);
        assert!(e.roll.abs() < 1e-6);
        assert!(e.pitch.abs() < 1e-6);
        assert!((e.yaw - FRAC_PI_2).abs() < 1e-6, "yaw = {}", e.yaw);
    }

    #[test]
    fn z_and_w_pair_gives_quarter_roll() {
        let q = Quaternion::new(0.0, 0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2);
        let e = euler_angles(&q);
        assert!((e.roll - FRAC_PI_2).abs() < 1e-6, "roll = {}", e.roll);
        assert_finite(&e);
    }

    #[test]
    fn gimbal_lock_pitch_is_clamped() {
        // qy·qw = 0.5 puts the asin argument at -1, and f32 rounding of
        // 1/sqrt(2) can push it just past.
        let q = Quaternion::new(0.0, FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2);
        let e = euler_angles(&q);
        assert_finite(&e);
        assert!((e.pitch + FRAC_PI_2).abs() < 1e-3, "pitch = {}", e.pitch);

        let q = Quaternion::new(0.0, -FRAC_1_SQRT_2, 0.0, FRAC_1_SQRT_2);
        let e = euler_angles(&q);
        assert_finite(&e);
        assert!((e.pitch - FRAC_PI_2).abs() < 1e-3, "pitch = {}", e.pitch);
    }

    #[test]
    fn unnormalized_input_is_not_rejected() {
        // asin argument is 2(1·1 − (−1)·0) = 2, clamped to 1.
        let q = Quaternion::new(1.0, 0.0, 1.0, -1.0);
        let e = euler_angles(&q);
        assert_finite(&e);
        assert!((e.pitch - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn unit_quaternion_sweep_stays_finite() {
        let steps = 24;
        for i in 0..steps {
            for j in 0..steps {
                for k in 0..steps {
                    let a = i as f32 / steps as f32 * std::f32::consts::TAU;
                    let b = j as f32 / steps as f32 * std::f32::consts::PI;
                    let c = k as f32 / steps as f32 * std::f32::consts::PI;
                    let q = Quaternion::new(
                        b.sin() * c.sin() * a.cos(),
                        b.sin() * c.sin() * a.sin(),
                        b.sin() * c.cos(),
                        b.cos(),
                    );
                    assert_finite(&euler_angles(&q));
                }
            }
        }
    }
}
