//! Full 3D rigid transform used for fixed-frame tracking.
//!
//! Matching is planar, but the tracked platform pose composes with
//! externally supplied 3D transforms (frame tree lookups, inertial
//! orientation), so z, roll and pitch ride along through composition and
//! are only collapsed where a planar projection is asked for explicitly.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::pose::Pose2D;

/// Rigid 3D transform `T_parent_child`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Pose3DRecord", into = "Pose3DRecord")]
pub struct Pose3D {
    iso: Isometry3<f64>,
}

impl Pose3D {
    /// Identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self {
            iso: Isometry3::identity(),
        }
    }

    /// Wrap a nalgebra isometry.
    #[inline]
    pub fn from_isometry(iso: Isometry3<f64>) -> Self {
        Self { iso }
    }

    /// Build from a translation and an orientation.
    pub fn from_parts(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            iso: Isometry3::from_parts(Translation3::from(translation), rotation),
        }
    }

    /// Planar transform: z, roll and pitch are zero.
    pub fn from_xy_yaw(x: f64, y: f64, yaw: f64) -> Self {
        Self::from_parts(
            Vector3::new(x, y, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
        )
    }

    /// Lift a planar pose into 3D.
    #[inline]
    pub fn from_pose2d(pose: &Pose2D) -> Self {
        Self::from_xy_yaw(pose.x, pose.y, pose.theta)
    }

    /// Pure rotation.
    pub fn from_rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self::from_parts(Vector3::zeros(), rotation)
    }

    /// `self * other`: apply `other` in the frame of `self`.
    #[inline]
    pub fn compose(&self, other: &Pose3D) -> Pose3D {
        Self {
            iso: self.iso * other.iso,
        }
    }

    /// Inverse transform.
    #[inline]
    pub fn inverse(&self) -> Pose3D {
        Self {
            iso: self.iso.inverse(),
        }
    }

    /// Copy with the rotation replaced and the translation kept.
    pub fn with_rotation(&self, rotation: UnitQuaternion<f64>) -> Pose3D {
        Self::from_parts(self.iso.translation.vector, rotation)
    }

    /// Underlying isometry.
    #[inline]
    pub fn isometry(&self) -> &Isometry3<f64> {
        &self.iso
    }

    /// Translation vector.
    #[inline]
    pub fn translation(&self) -> Vector3<f64> {
        self.iso.translation.vector
    }

    /// Orientation quaternion.
    #[inline]
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.iso.rotation
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.iso.translation.vector.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.iso.translation.vector.y
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.iso.translation.vector.z
    }

    /// Heading about z.
    #[inline]
    pub fn yaw(&self) -> f64 {
        self.iso.rotation.euler_angles().2
    }

    /// `(roll, pitch, yaw)` in radians.
    #[inline]
    pub fn roll_pitch_yaw(&self) -> (f64, f64, f64) {
        self.iso.rotation.euler_angles()
    }

    /// Planar projection `(x, y, yaw)`.
    pub fn to_pose2d(&self) -> Pose2D {
        Pose2D::new(self.x(), self.y(), self.yaw())
    }

    /// Planar squared distance from the origin of the parent frame.
    #[inline]
    pub fn planar_distance_squared(&self) -> f64 {
        self.x() * self.x() + self.y() * self.y()
    }

    /// Spherical/linear blend towards `other` at fraction `t` in [0, 1].
    pub fn interpolate(&self, other: &Pose3D, t: f64) -> Pose3D {
        let translation = self.translation().lerp(&other.translation(), t);
        let rotation = self
            .rotation()
            .try_slerp(&other.rotation(), t, 1e-9)
            .unwrap_or_else(|| other.rotation());
        Self::from_parts(translation, rotation)
    }
}

impl Default for Pose3D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Serialized form: position plus `[x, y, z, w]` quaternion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Pose3DRecord {
    position: [f64; 3],
    orientation: [f64; 4],
}

impl From<Pose3DRecord> for Pose3D {
    fn from(r: Pose3DRecord) -> Self {
        let [qx, qy, qz, qw] = r.orientation;
        Pose3D::from_parts(
            Vector3::new(r.position[0], r.position[1], r.position[2]),
            UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz)),
        )
    }
}

impl From<Pose3D> for Pose3DRecord {
    fn from(p: Pose3D) -> Self {
        let q = p.rotation();
        Self {
            position: [p.x(), p.y(), p.z()],
            orientation: [q.i, q.j, q.k, q.w],
        }
    }
}

/// Quaternion from roll, pitch and yaw.
#[inline]
pub fn quaternion_from_rpy(roll: f64, pitch: f64, yaw: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(roll, pitch, yaw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_planar_roundtrip() {
        let p = Pose3D::from_xy_yaw(1.0, -2.0, 0.7);
        let planar = p.to_pose2d();
        assert_relative_eq!(planar.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(planar.y, -2.0, epsilon = 1e-12);
        assert_relative_eq!(planar.theta, 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_matches_pose2d() {
        let a = Pose2D::new(1.0, 0.5, 0.3);
        let b = Pose2D::new(-0.2, 0.4, -1.1);
        let planar = a.compose(&b);
        let lifted = Pose3D::from_pose2d(&a)
            .compose(&Pose3D::from_pose2d(&b))
            .to_pose2d();
        assert_relative_eq!(lifted.x, planar.x, epsilon = 1e-12);
        assert_relative_eq!(lifted.y, planar.y, epsilon = 1e-12);
        assert_relative_eq!(lifted.theta, planar.theta, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_keeps_z_and_tilt() {
        let tilted = Pose3D::from_parts(
            Vector3::new(0.0, 0.0, 0.3),
            quaternion_from_rpy(0.05, -0.02, 0.0),
        );
        let moved = tilted.compose(&Pose3D::from_xy_yaw(0.0, 0.0, FRAC_PI_2));
        let (roll, pitch, yaw) = moved.roll_pitch_yaw();
        assert_relative_eq!(moved.z(), 0.3, epsilon = 1e-12);
        assert!(roll.abs() > 1e-3 || pitch.abs() > 1e-3);
        assert_relative_eq!(yaw, FRAC_PI_2, epsilon = 0.1);
    }

    #[test]
    fn test_with_rotation_keeps_translation() {
        let p = Pose3D::from_xy_yaw(2.0, 3.0, 1.0);
        let r = p.with_rotation(quaternion_from_rpy(0.0, 0.0, -0.5));
        assert_relative_eq!(r.x(), 2.0);
        assert_relative_eq!(r.y(), 3.0);
        assert_relative_eq!(r.yaw(), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = Pose3D::from_xy_yaw(0.0, 0.0, 0.0);
        let b = Pose3D::from_xy_yaw(2.0, 0.0, 0.4);
        let mid = a.interpolate(&b, 0.5);
        assert_relative_eq!(mid.x(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(mid.yaw(), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_serde_roundtrip() {
        let p = Pose3D::from_parts(Vector3::new(1.0, 2.0, 3.0), quaternion_from_rpy(0.1, 0.2, 0.3));
        let json = serde_json::to_string(&p).unwrap();
        let back: Pose3D = serde_json::from_str(&json).unwrap();
        assert_relative_eq!(back.z(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(back.yaw(), p.yaw(), epsilon = 1e-12);
    }
}
