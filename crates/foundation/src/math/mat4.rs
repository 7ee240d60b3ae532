//! Row-major 4x4 matrices for view/projection math.
//!
//! Convention: `m[row][col]`, column vectors, so `clip = m * p`. This is the
//! layout `Frustum::from_view_proj_row_major` expects.

use super::Vec3;

pub type Mat4 = [[f64; 4]; 4];

pub const MAT4_IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

pub fn mat4_mul(a: Mat4, b: Mat4) -> Mat4 {
    let mut c = [[0.0f64; 4]; 4];
    for (row, c_row) in c.iter_mut().enumerate() {
        for (col, value) in c_row.iter_mut().enumerate() {
            *value = a[row][0] * b[0][col]
                + a[row][1] * b[1][col]
                + a[row][2] * b[2][col]
                + a[row][3] * b[3][col];
        }
    }
    c
}

/// Right-handed look-at view matrix (camera looks down -Z in view space).
pub fn mat4_look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let f = (target - eye).normalize_or_zero();
    let s = f.cross(up).normalize_or_zero();
    let u = s.cross(f);

    [
        [s.x, s.y, s.z, -s.dot(eye)],
        [u.x, u.y, u.z, -u.dot(eye)],
        [-f.x, -f.y, -f.z, f.dot(eye)],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Right-handed perspective projection with a `[0, 1]` depth range.
pub fn mat4_perspective_rh_z0(fov_y_rad: f64, aspect: f64, near: f64, far: f64) -> Mat4 {
    let f = 1.0 / (0.5 * fov_y_rad).tan();
    let aspect = aspect.max(1e-6);

    [
        [f / aspect, 0.0, 0.0, 0.0],
        [0.0, f, 0.0, 0.0],
        [0.0, 0.0, far / (near - far), (near * far) / (near - far)],
        [0.0, 0.0, -1.0, 0.0],
    ]
}

/// Transform a point, returning homogeneous clip coordinates `[x, y, z, w]`.
pub fn mat4_transform_point(m: Mat4, p: Vec3) -> [f64; 4] {
    let mut out = [0.0; 4];
    for (row, value) in out.iter_mut().enumerate() {
        *value = m[row][0] * p.x + m[row][1] * p.y + m[row][2] * p.z + m[row][3];
    }
    out
}

/// An up vector usable with `mat4_look_at_rh` for the given view direction.
///
/// Prefers world +Y and falls back to +Z when looking along the polar axis.
pub fn stable_up(forward: Vec3) -> Vec3 {
    let f = forward.normalize_or_zero();
    if f.cross(Vec3::Y).length_squared() > 1e-8 {
        Vec3::Y
    } else {
        Vec3::Z
    }
}
