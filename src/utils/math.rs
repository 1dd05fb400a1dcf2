//! Small quaternion helpers shared by asset preparation and the solver.

use std::f32::consts::PI;

use glam::{Quat, Vec3};

/// Axis length below which two directions are treated as parallel.
const PARALLEL_EPSILON: f32 = 1e-3;

/// Rotation taking the local +X axis onto `local_dir` (which must be expressed
/// in the current local frame). Returns identity when the two are parallel or
/// `local_dir` is degenerate, and a half turn about an axis perpendicular to
/// +X when they are anti-parallel.
///
/// Strand local frames are chained with this: the frame of vertex `i + 1` is
/// the frame of vertex `i` times the rotation onto the edge direction.
#[must_use]
pub fn rotation_from_x_axis(local_dir: Vec3) -> Quat {
    let dir = local_dir.normalize_or_zero();
    if dir == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let axis = Vec3::X.cross(dir);
    let axis_len = axis.length();
    if axis_len <= PARALLEL_EPSILON {
        return if dir.x > 0.0 {
            Quat::IDENTITY
        } else {
            Quat::from_axis_angle(Vec3::X.any_orthonormal_vector(), PI)
        };
    }
    let angle = Vec3::X.dot(dir).clamp(-1.0, 1.0).acos();
    Quat::from_axis_angle(axis / axis_len, angle)
}

/// Rotation taking the world +X axis onto the direction `from -> to`.
#[must_use]
pub fn frame_from_segment(from: Vec3, to: Vec3) -> Quat {
    let dir = (to - from).normalize_or_zero();
    if dir == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(Vec3::X, dir)
}
