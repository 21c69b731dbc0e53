//! Small geometric helpers shared by the constraints and the solver.

use std::f32::consts::PI;

use nalgebra::{Unit, UnitQuaternion, Vector3};

/// Directions shorter than this are treated as degenerate.
pub const DEGENERATE_LENGTH: f32 = 1e-6;

/// Remove the component of `v` along the unit vector `normal`.
pub fn reject(v: &Vector3<f32>, normal: &Vector3<f32>) -> Vector3<f32> {
    v - normal * v.dot(normal)
}

/// Wrap an angle in degrees into `(-180, 180]`.
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Clamp `angle` into `[min, max]` (degrees). Angles outside the interval
/// snap to whichever bound is angularly nearer.
///
/// Membership is tested modulo a full turn, so intervals may extend past
/// ±180. An angle inside the interval comes back as its representative in
/// `[min, max]`.
pub fn clamp_degrees(angle: f32, min: f32, max: f32) -> f32 {
    let offset = (angle - min).rem_euclid(360.0);
    if offset <= max - min {
        return min + offset;
    }
    let to_min = wrap_degrees(angle - min).abs();
    let to_max = wrap_degrees(angle - max).abs();
    if to_min < to_max {
        min
    } else {
        max
    }
}

/// Minimal rotation taking direction `from` onto direction `to`.
///
/// Antiparallel inputs rotate half a turn about an axis perpendicular to
/// `from`. Degenerate inputs yield the identity.
pub fn rotation_between(from: &Vector3<f32>, to: &Vector3<f32>) -> UnitQuaternion<f32> {
    if from.norm() <= DEGENERATE_LENGTH || to.norm() <= DEGENERATE_LENGTH {
        return UnitQuaternion::identity();
    }
    if let Some(rotation) = UnitQuaternion::rotation_between(from, to) {
        return rotation;
    }
    let mut perpendicular = from.cross(&Vector3::x());
    if perpendicular.norm() <= 1e-3 * from.norm() {
        perpendicular = from.cross(&Vector3::y());
    }
    UnitQuaternion::from_axis_angle(&Unit::new_normalize(perpendicular), PI)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
