use cgmath::{Matrix3, Matrix4, Quaternion, SquareMatrix, Vector3, Vector4};
use shape::Transform;

pub type PosRot = (Vector3<f32>, Quaternion<f32>);

pub fn to_vector(v: glam::Vec3) -> Vector3<f32> {
    Vector3::new(v.x, v.y, v.z)
}

pub fn to_posrot(transform: &Transform) -> PosRot {
    let q = transform.rotation.to_quat();

    (
        to_vector(transform.translation),
        Quaternion::new(q.w, q.x, q.y, q.z),
    )
}

/// Spherical interpolation along the shorter arc, done in double precision.
/// Nearly identical rotations fall back to a plain linear blend.
pub fn interpolate_rotation(q1: Quaternion<f32>, q2: Quaternion<f32>, t: f32) -> Quaternion<f32> {
    let mut cos_omega =
        (q1.v.x * q2.v.x + q1.v.y * q2.v.y + q1.v.z * q2.v.z + q1.s * q2.s) as f64;

    let sign = if cos_omega < 0. {
        cos_omega = -cos_omega;
        -1.
    } else {
        1.
    };

    let t = t as f64;

    let (scale1, scale2) = if 1. - cos_omega > 0.00001 {
        let omega = cos_omega.acos();
        let sin_omega = omega.sin();

        (
            ((1. - t) * omega).sin() / sin_omega,
            sign * (t * omega).sin() / sin_omega,
        )
    } else {
        (1. - t, sign * t)
    };

    let mix = |a: f32, b: f32| (scale1 * a as f64 + scale2 * b as f64) as f32;

    Quaternion::new(
        mix(q1.s, q2.s),
        mix(q1.v.x, q2.v.x),
        mix(q1.v.y, q2.v.y),
        mix(q1.v.z, q2.v.z),
    )
}

/// Rotation matrix of a stored shape rotation.
///
/// Shape rotations are kept inverted, so this is the transpose of the usual
/// quaternion matrix. The quaternion is not normalised first.
pub fn rotation_matrix(q: Quaternion<f32>) -> Matrix3<f32> {
    let (x, y, z, w) = (q.v.x, q.v.y, q.v.z, q.s);

    if x * x + y * y + z * z < 1e-19 {
        return Matrix3::identity();
    }

    let (xs, ys, zs) = (x * 2., y * 2., z * 2.);
    let (wx, wy, wz) = (w * xs, w * ys, w * zs);
    let (xx, xy, xz) = (x * xs, x * ys, x * zs);
    let (yy, yz, zz) = (y * ys, y * zs, z * zs);

    // column major
    Matrix3::new(
        1. - (yy + zz),
        xy - wz,
        xz + wy,
        xy + wz,
        1. - (xx + zz),
        yz - wx,
        xz - wy,
        yz + wx,
        1. - (xx + yy),
    )
}

pub fn build_transform((position, rotation): PosRot) -> Matrix4<f32> {
    let mut res = Matrix4::from(rotation_matrix(rotation));
    res.w = position.extend(1.);

    res
}

pub fn lerp_posrot((pos_a, rot_a): PosRot, (pos_b, rot_b): PosRot, t: f32) -> PosRot {
    (
        pos_a * (1. - t) + pos_b * t,
        interpolate_rotation(rot_a, rot_b, t),
    )
}

/// Child world transform from its parent's world transform and its local one.
///
/// Rotations multiply with both translations cleared. The local translation is
/// then rotated by the parent and offset by the parent's translation.
pub fn compose(parent: &Matrix4<f32>, local: &Matrix4<f32>) -> Matrix4<f32> {
    let mut parent_rotation = *parent;
    parent_rotation.w = Vector4::unit_w();

    let mut local_rotation = *local;
    local_rotation.w = Vector4::unit_w();

    let mut res = parent_rotation * local_rotation;
    res.w = parent_rotation * local.w + parent.w;
    res.w.w = 1.;

    res
}
