use foundation::math::{Mat4, Vec3, mat4_look_at_rh, mat4_mul, mat4_perspective_rh_z0, stable_up};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub n: [f64; 3],
    pub d: f64,
}

impl Plane {
    pub fn new(n: [f64; 3], d: f64) -> Self {
        Self { n, d }
    }

    pub fn normalize(self) -> Self {
        let l2 = self.n[0] * self.n[0] + self.n[1] * self.n[1] + self.n[2] * self.n[2];
        if l2 <= 0.0 {
            return self;
        }
        let inv = 1.0 / l2.sqrt();
        Self {
            n: [self.n[0] * inv, self.n[1] * inv, self.n[2] * inv],
            d: self.d * inv,
        }
    }

    pub fn distance(&self, p: Vec3) -> f64 {
        self.n[0] * p.x + self.n[1] * p.y + self.n[2] * p.z + self.d
    }
}

/// View frustum as 6 planes.
///
/// Convention:
/// - A point `p` is inside iff `plane.distance(p) >= 0` for all planes.
/// - Planes are expected to be in world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frustum {
    pub left: Plane,
    pub right: Plane,
    pub bottom: Plane,
    pub top: Plane,
    pub near: Plane,
    pub far: Plane,
}

impl Frustum {
    pub fn new(
        left: Plane,
        right: Plane,
        bottom: Plane,
        top: Plane,
        near: Plane,
        far: Plane,
    ) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
            near,
            far,
        }
    }

    pub fn normalize(self) -> Self {
        Self {
            left: self.left.normalize(),
            right: self.right.normalize(),
            bottom: self.bottom.normalize(),
            top: self.top.normalize(),
            near: self.near.normalize(),
            far: self.far.normalize(),
        }
    }

    /// Build a frustum from a row-major view-projection matrix.
    ///
    /// This expects the clip-space convention where visible points satisfy:
    /// - `-w <= x <= w`
    /// - `-w <= y <= w`
    /// - `0 <= z <= w` (z0)
    pub fn from_view_proj_row_major(m: Mat4) -> Self {
        let r0 = m[0];
        let r1 = m[1];
        let r2 = m[2];
        let r3 = m[3];

        // Planes: r3 +/- r{0,1}, near = r2 (z0), far = r3 - r2.
        let left = Plane::new([r3[0] + r0[0], r3[1] + r0[1], r3[2] + r0[2]], r3[3] + r0[3]);
        let right = Plane::new([r3[0] - r0[0], r3[1] - r0[1], r3[2] - r0[2]], r3[3] - r0[3]);
        let bottom = Plane::new([r3[0] + r1[0], r3[1] + r1[1], r3[2] + r1[2]], r3[3] + r1[3]);
        let top = Plane::new([r3[0] - r1[0], r3[1] - r1[1], r3[2] - r1[2]], r3[3] - r1[3]);
        let near = Plane::new([r2[0], r2[1], r2[2]], r2[3]);
        let far = Plane::new([r3[0] - r2[0], r3[1] - r2[1], r3[2] - r2[2]], r3[3] - r2[3]);

        Self::new(left, right, bottom, top, near, far).normalize()
    }

    fn planes(&self) -> [Plane; 6] {
        [
            self.left,
            self.right,
            self.bottom,
            self.top,
            self.near,
            self.far,
        ]
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes().iter().all(|plane| plane.distance(p) >= 0.0)
    }

    /// True if any part of the sphere lies inside.
    pub fn intersects_sphere(&self, center: Vec3, radius: f64) -> bool {
        self.planes()
            .iter()
            .all(|plane| plane.distance(center) >= -radius)
    }
}

/// Perspective camera looking at the globe.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraView {
    pub eye: Vec3,
    pub target: Vec3,
    pub fov_y_rad: f64,
    pub aspect: f64,
}

impl CameraView {
    pub fn new(eye: Vec3, target: Vec3, fov_y_rad: f64, aspect: f64) -> Self {
        Self {
            eye,
            target,
            fov_y_rad,
            aspect,
        }
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    /// Clip distances that keep the whole globe in range from the current eye.
    ///
    /// Near shrinks with altitude so close-up views keep depth precision.
    pub fn clip_range(&self, globe_radius: f64) -> (f64, f64) {
        let distance = self.eye.length();
        let altitude = (distance - globe_radius).max(globe_radius * 1e-3);
        let near = (altitude * 0.1).max(globe_radius * 1e-4);
        let far = (distance + globe_radius * 1.5).max(near * 2.0);
        (near, far)
    }

    pub fn view_proj(&self, globe_radius: f64) -> Mat4 {
        let (near, far) = self.clip_range(globe_radius);
        let view = mat4_look_at_rh(self.eye, self.target, stable_up(self.forward()));
        let proj = mat4_perspective_rh_z0(self.fov_y_rad, self.aspect, near, far);
        mat4_mul(proj, view)
    }
}

/// Per-frame visibility test: frustum containment plus a horizon cutoff.
///
/// The horizon test compares the entity's radial direction with the
/// camera's radial direction; `cutoff` below zero admits entities slightly
/// past the limb.
#[derive(Debug, Copy, Clone)]
pub struct ViewProbe {
    frustum: Frustum,
    eye_dir: Vec3,
    horizon_cutoff: f64,
    margin: f64,
}

impl ViewProbe {
    pub fn new(view: &CameraView, globe_radius: f64, horizon_cutoff: f64) -> Self {
        Self {
            frustum: Frustum::from_view_proj_row_major(view.view_proj(globe_radius)),
            eye_dir: view.eye.normalize_or_zero(),
            horizon_cutoff,
            margin: globe_radius * 0.01,
        }
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    pub fn facing_camera(&self, point: Vec3) -> bool {
        point.normalize_or_zero().dot(self.eye_dir) > self.horizon_cutoff
    }

    pub fn is_visible(&self, point: Vec3) -> bool {
        self.facing_camera(point) && self.frustum.intersects_sphere(point, self.margin)
    }
}
