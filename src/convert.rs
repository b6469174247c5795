use glam::{Mat3, Mat4, Quat, Vec3};

// source frame is X-right/Y-forward/Z-up, target is X-forward/Y-right/
// Z-up; the mapping has determinant +1 so winding never flips
pub fn point_to_target(v: Vec3) -> Vec3 {
    Vec3::new(v.y, -v.x, v.z)
}

pub fn point_from_target(v: Vec3) -> Vec3 {
    Vec3::new(-v.y, v.x, v.z)
}

pub fn normal_to_target(v: Vec3) -> Vec3 {
    point_to_target(v)
}

// scales are magnitudes, no sign flip
pub fn scale_to_target(v: Vec3) -> Vec3 {
    Vec3::new(v.y, v.x, v.z)
}

pub fn quat_to_target(q: Quat) -> Quat {
    Quat::from_xyzw(q.y, -q.x, q.z, q.w)
}

pub fn quat_from_target(q: Quat) -> Quat {
    Quat::from_xyzw(-q.y, q.x, q.z, q.w)
}

pub fn extent_to_target(min: Vec3, max: Vec3) -> (Vec3, Vec3) {
    let a = point_to_target(min);
    let b = point_to_target(max);
    (a.min(b), a.max(b))
}

pub fn extent_from_target(min: Vec3, max: Vec3) -> (Vec3, Vec3) {
    let a = point_from_target(min);
    let b = point_from_target(max);
    (a.min(b), a.max(b))
}

/// Look-at rotation in the target frame, forward maps to +X, up to +Z.
pub fn rotation_from_forward_up(forward: Vec3, up: Vec3) -> Quat {
    let f = forward.normalize_or_zero();
    if f == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let mut u = up.normalize_or_zero();
    if u == Vec3::ZERO {
        u = Vec3::Z;
    }
    let r = u.cross(f).normalize_or_zero();
    if r == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let u = f.cross(r);
    Quat::from_mat3(&Mat3::from_cols(f, r, u)).normalize()
}

/// Extract target-frame (position, rotation, scale) from a source-frame
/// matrix.
pub fn decompose_to_target(m: Mat4) -> (Vec3, Quat, Vec3) {
    let x = m.x_axis.truncate();
    let y = m.y_axis.truncate();
    let z = m.z_axis.truncate();

    let position = point_to_target(m.w_axis.truncate());
    let scale = Vec3::new(y.length(), x.length(), z.length());
    let rotation = rotation_from_forward_up(point_to_target(y), point_to_target(z));

    (position, rotation, scale)
}
