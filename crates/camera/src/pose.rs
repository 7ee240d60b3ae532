use foundation::math::{GeoPosition, Vec3, from_surface_point, slerp_direction, unit_direction};

/// Camera position and look-at target in world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self { position, target }
    }

    /// Above `(lat, lon)` at `distance` from the globe center, looking at the center.
    pub fn above(lat: f64, lon: f64, distance: f64) -> Self {
        Self::new(unit_direction(lat, lon) * distance, Vec3::ZERO)
    }

    pub fn distance(&self) -> f64 {
        self.position.length()
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Geographic position under the camera.
    pub fn subpoint(&self, globe_radius: f64) -> GeoPosition {
        from_surface_point(self.position, globe_radius)
    }

    /// Same viewing direction, moved to `distance` from the center.
    pub fn at_distance(&self, distance: f64) -> Self {
        let dir = self.position.try_normalize().unwrap_or(Vec3::Z);
        Self::new(dir * distance, self.target)
    }

    /// Interpolate along the sphere: direction slerps, radius and target lerp.
    pub fn interpolate(&self, other: &Self, t: f64) -> Self {
        let r = self.distance() + (other.distance() - self.distance()) * t;
        let dir = slerp_direction(self.position, other.position, t);
        Self::new(dir * r, self.target.lerp(other.target, t))
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.target.is_finite()
    }
}
