//! Spherical globe projection and great-circle helpers.
//!
//! The render globe is a sphere of `base_radius` render units centered at the
//! origin (see `Vec3` for the axis convention). Altitude lifts a point off the
//! sphere by a small fixed coefficient per foot so that cruise altitudes are
//! visible without distorting surface geometry.

use super::Vec3;

/// Radius growth per foot of altitude, as a fraction of the base radius.
pub const ALTITUDE_SCALE_PER_FOOT: f64 = 1.5e-6;

/// Mean Earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// One degree of latitude (great-circle arc) in nautical miles.
pub const NM_PER_DEGREE: f64 = 60.0;

/// Geographic position in degrees and feet.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
}

impl GeoPosition {
    pub fn new(lat: f64, lon: f64, altitude_ft: f64) -> Self {
        Self {
            lat,
            lon,
            altitude_ft,
        }
    }

    /// Same position with latitude clamped and longitude wrapped.
    pub fn normalized(self) -> Self {
        Self {
            lat: clamp_lat(self.lat),
            lon: normalize_lon(self.lon),
            altitude_ft: self.altitude_ft,
        }
    }

    /// Finite, latitude within [-90, 90]. Longitude may still need wrapping.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.altitude_ft.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
    }

    pub fn to_surface_point(&self, base_radius: f64) -> Vec3 {
        to_surface_point(self.lat, self.lon, self.altitude_ft, base_radius)
    }
}

/// Wrap a longitude into `[-180, 180)`.
pub fn normalize_lon(lon: f64) -> f64 {
    if (-180.0..180.0).contains(&lon) {
        return lon;
    }
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

pub fn clamp_lat(lat: f64) -> f64 {
    lat.clamp(-90.0, 90.0)
}

/// Signed shortest longitude difference `b - a`, in `[-180, 180)`.
pub fn lon_delta(a: f64, b: f64) -> f64 {
    normalize_lon(b - a)
}

/// Radius of a point at `altitude_ft` above a globe of `base_radius`.
pub fn altitude_radius(altitude_ft: f64, base_radius: f64) -> f64 {
    base_radius * (1.0 + altitude_ft * ALTITUDE_SCALE_PER_FOOT)
}

/// Unit radial direction for a latitude/longitude.
pub fn unit_direction(lat: f64, lon: f64) -> Vec3 {
    let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon.to_radians().sin_cos();
    Vec3::new(cos_lat * sin_lon, sin_lat, cos_lat * cos_lon)
}

pub fn to_surface_point(lat: f64, lon: f64, altitude_ft: f64, base_radius: f64) -> Vec3 {
    unit_direction(lat, lon) * altitude_radius(altitude_ft, base_radius)
}

/// Allocation-free variant of [`to_surface_point`] for per-frame use.
#[inline]
pub fn to_surface_point_into(
    out: &mut Vec3,
    lat: f64,
    lon: f64,
    altitude_ft: f64,
    base_radius: f64,
) {
    *out = to_surface_point(lat, lon, altitude_ft, base_radius);
}

/// Inverse of [`to_surface_point`].
///
/// The origin maps to `(0, 0)` at the altitude of a zero radius.
pub fn from_surface_point(point: Vec3, base_radius: f64) -> GeoPosition {
    let r = point.length();
    let altitude_ft = (r / base_radius - 1.0) / ALTITUDE_SCALE_PER_FOOT;
    if r <= 1e-12 {
        return GeoPosition::new(0.0, 0.0, altitude_ft);
    }
    let lat = (point.y / r).clamp(-1.0, 1.0).asin().to_degrees();
    let lon = point.x.atan2(point.z).to_degrees();
    GeoPosition::new(lat, normalize_lon(lon), altitude_ft)
}

/// Orthonormal local frame at a surface point.
///
/// `up` is radial outward, `forward` points along the heading inside the
/// tangent plane, `right = forward × up`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceFrame {
    pub right: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
}

impl Default for SurfaceFrame {
    fn default() -> Self {
        Self {
            right: Vec3::X,
            forward: Vec3::Y,
            up: Vec3::Z,
        }
    }
}

impl SurfaceFrame {
    /// Column-major 3x3 rotation taking model space (x=right, y=up, z=forward)
    /// into world space.
    pub fn rotation_columns(&self) -> [[f32; 3]; 3] {
        [self.right.to_f32(), self.up.to_f32(), self.forward.to_f32()]
    }
}

/// Local frame at `(lat, lon)` oriented along `heading_deg` (0 = north, 90 = east).
pub fn surface_orientation(lat: f64, lon: f64, heading_deg: f64) -> SurfaceFrame {
    let mut frame = SurfaceFrame::default();
    surface_orientation_into(&mut frame, lat, lon, heading_deg);
    frame
}

/// Allocation-free variant of [`surface_orientation`].
///
/// East is the normalized longitude derivative of the surface point, which
/// stays defined at the poles where `up × Y` would vanish.
pub fn surface_orientation_into(out: &mut SurfaceFrame, lat: f64, lon: f64, heading_deg: f64) {
    let up = unit_direction(lat, lon);
    let (sin_lon, cos_lon) = lon.to_radians().sin_cos();
    let east = Vec3::new(cos_lon, 0.0, -sin_lon);
    let north = up.cross(east);

    let (sin_h, cos_h) = heading_deg.to_radians().sin_cos();
    let forward = (north * cos_h + east * sin_h).normalize_or_zero();
    let right = forward.cross(up);

    out.right = right;
    out.forward = forward;
    out.up = up;
}

/// Great-circle angle between two positions, in degrees.
pub fn angular_distance_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = lon_delta(lon1, lon2).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    (2.0 * a.clamp(0.0, 1.0).sqrt().asin()).to_degrees()
}

/// Haversine distance in nautical miles.
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    angular_distance_deg(lat1, lon1, lat2, lon2).to_radians() * EARTH_RADIUS_NM
}

/// Initial bearing from point 1 to point 2 in degrees (0-360).
pub fn initial_bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = lon_delta(lon1, lon2).to_radians();

    let x = delta_lon.sin() * lat2_rad.cos();
    let y = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();

    x.atan2(y).to_degrees().rem_euclid(360.0)
}

/// Spherical interpolation between two unit directions.
pub fn slerp_direction(a: Vec3, b: Vec3, t: f64) -> Vec3 {
    let a = a.normalize_or_zero();
    let b = b.normalize_or_zero();
    let dot = a.dot(b).clamp(-1.0, 1.0);

    if dot > 0.9995 {
        return a.lerp(b, t).normalize_or_zero();
    }
    if dot < -0.9995 {
        // Antipodal: any great circle works, route through a stable perpendicular.
        let axis = a.any_orthogonal();
        return a.rotate_around(axis, std::f64::consts::PI * t);
    }

    let theta = dot.acos();
    let sin_theta = theta.sin();
    let wa = ((1.0 - t) * theta).sin() / sin_theta;
    let wb = (t * theta).sin() / sin_theta;
    (a * wa + b * wb).normalize_or_zero()
}

/// Great-circle interpolation between two positions; altitude is linear.
pub fn interpolate_surface(a: GeoPosition, b: GeoPosition, t: f64) -> GeoPosition {
    let t = t.clamp(0.0, 1.0);
    let dir = slerp_direction(unit_direction(a.lat, a.lon), unit_direction(b.lat, b.lon), t);
    let geo = from_surface_point(dir, 1.0);
    GeoPosition::new(
        geo.lat,
        geo.lon,
        a.altitude_ft + (b.altitude_ft - a.altitude_ft) * t,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn normalize_lon_wraps_into_range() {
        assert_close(normalize_lon(190.0), -170.0, 1e-12);
        assert_close(normalize_lon(-190.0), 170.0, 1e-12);
        assert_close(normalize_lon(540.0), -180.0, 1e-12);
        assert_close(normalize_lon(45.0), 45.0, 1e-12);
        assert_close(lon_delta(170.0, -170.0), 20.0, 1e-12);
    }

    #[test]
    fn surface_point_axes() {
        let p = to_surface_point(0.0, 0.0, 0.0, 2.0);
        assert_close(p.z, 2.0, 1e-12);
        let e = to_surface_point(0.0, 90.0, 0.0, 2.0);
        assert_close(e.x, 2.0, 1e-12);
        let n = to_surface_point(90.0, 0.0, 0.0, 2.0);
        assert_close(n.y, 2.0, 1e-12);
    }

    #[test]
    fn surface_point_round_trips() {
        for lat in [-89.5, -45.0, 0.0, 12.3, 60.0, 89.9] {
            for lon in [-179.9, -120.0, -0.5, 0.0, 33.3, 179.0] {
                let p = to_surface_point(lat, lon, 35_000.0, 100.0);
                let g = from_surface_point(p, 100.0);
                assert_close(g.lat, lat, 1e-9);
                assert_close(g.lon, lon, 1e-9);
                assert_close(g.altitude_ft, 35_000.0, 1e-6);
            }
        }
    }

    #[test]
    fn altitude_lifts_radius_slightly() {
        let ground = to_surface_point(10.0, 10.0, 0.0, 100.0).length();
        let cruise = to_surface_point(10.0, 10.0, 40_000.0, 100.0).length();
        assert!(cruise > ground);
        assert!(cruise < ground * 1.1);
    }

    #[test]
    fn orientation_is_orthonormal_everywhere() {
        for lat in [-90.0, -89.999, -30.0, 0.0, 45.0, 89.999, 90.0] {
            for heading in [0.0, 45.0, 90.0, 271.0] {
                let f = surface_orientation(lat, 77.0, heading);
                assert_close(f.up.length(), 1.0, 1e-9);
                assert_close(f.forward.length(), 1.0, 1e-9);
                assert_close(f.right.length(), 1.0, 1e-9);
                assert_close(f.up.dot(f.forward), 0.0, 1e-9);
                assert_close(f.up.dot(f.right), 0.0, 1e-9);
                assert_close(f.forward.dot(f.right), 0.0, 1e-9);
            }
        }
    }

    #[test]
    fn heading_convention_north_and_east() {
        let north = surface_orientation(0.0, 0.0, 0.0);
        assert_close(north.forward.y, 1.0, 1e-12);
        let east = surface_orientation(0.0, 0.0, 90.0);
        assert_close(east.forward.x, 1.0, 1e-12);
        // right of a north-facing frame is east
        assert_close(north.right.x, 1.0, 1e-12);
    }

    #[test]
    fn angular_distance_and_haversine() {
        assert_close(angular_distance_deg(0.0, 0.0, 0.0, 90.0), 90.0, 1e-9);
        assert_close(angular_distance_deg(0.0, 179.0, 0.0, -179.0), 2.0, 1e-9);
        assert_close(haversine_nm(0.0, 0.0, 1.0, 0.0), 60.04, 0.05);
    }

    #[test]
    fn bearing_east_is_ninety() {
        assert_close(initial_bearing_deg(0.0, 0.0, 0.0, 10.0), 90.0, 1e-9);
        assert_close(initial_bearing_deg(0.0, 0.0, 10.0, 0.0), 0.0, 1e-9);
    }

    #[test]
    fn interpolate_surface_midpoint() {
        let a = GeoPosition::new(0.0, 0.0, 0.0);
        let b = GeoPosition::new(0.0, 90.0, 1000.0);
        let mid = interpolate_surface(a, b, 0.5);
        assert_close(mid.lat, 0.0, 1e-9);
        assert_close(mid.lon, 45.0, 1e-9);
        assert_close(mid.altitude_ft, 500.0, 1e-9);

        let across = interpolate_surface(
            GeoPosition::new(0.0, 170.0, 0.0),
            GeoPosition::new(0.0, -170.0, 0.0),
            0.5,
        );
        assert_close(across.lon.abs(), 180.0, 1e-9);
    }
}
