//! Geographic view bounds derived from the camera pose.
//!
//! The center is where the camera's forward ray meets the globe (or the
//! camera's own radial position when the ray misses). The angular half-extent
//! grows with altitude and is clamped to `[min_half_extent_deg, 180]`.

use foundation::bounds::GeoBounds;
use foundation::math::{Vec3, clamp_lat, from_surface_point, quantize};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_half_extent_deg: f64,
    pub max_half_extent_deg: f64,
    /// Half-extent growth per globe radius of camera altitude.
    pub degrees_per_radius: f64,
    /// Camera distances (in globe radii) mapped to zoom 1 and zoom 0.
    pub near_distance_radii: f64,
    pub far_distance_radii: f64,
    /// Rounding applied when deciding whether the bounds changed.
    pub key_step_deg: f64,
    pub key_zoom_step: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_half_extent_deg: 15.0,
            max_half_extent_deg: 180.0,
            degrees_per_radius: 60.0,
            near_distance_radii: 1.05,
            far_distance_radii: 6.0,
            key_step_deg: 1.0,
            key_zoom_step: 0.05,
        }
    }
}

/// Current view window. Longitudes may extend past ±180 (wrap-tolerant);
/// the center longitude is always normalized.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub center_lat: f64,
    pub center_lon: f64,
    /// 0 = fully zoomed out, 1 = closest.
    pub zoom_level: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BoundsKey([i64; 5]);

impl ViewportBounds {
    pub fn geo_bounds(&self) -> GeoBounds {
        GeoBounds::new(self.min_lat, self.max_lat, self.min_lon, self.max_lon)
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.geo_bounds().contains(lat, lon)
    }

    pub fn key(&self, config: &ViewportConfig) -> BoundsKey {
        let step = config.key_step_deg;
        BoundsKey([
            quantize(self.min_lat, step),
            quantize(self.max_lat, step),
            quantize(self.min_lon, step),
            quantize(self.max_lon, step),
            quantize(self.zoom_level, config.key_zoom_step),
        ])
    }
}

/// First intersection of a ray with a sphere centered at the origin.
///
/// From inside the sphere this returns the exit point.
pub fn ray_sphere_intersection(origin: Vec3, dir: Vec3, radius: f64) -> Option<Vec3> {
    let dir = dir.try_normalize()?;
    let b = origin.dot(dir);
    let c = origin.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t = if -b - sqrt_disc >= 0.0 {
        -b - sqrt_disc
    } else {
        -b + sqrt_disc
    };
    (t >= 0.0).then(|| origin + dir * t)
}

pub fn compute_viewport(
    eye: Vec3,
    forward: Vec3,
    globe_radius: f64,
    config: &ViewportConfig,
) -> ViewportBounds {
    let center = ray_sphere_intersection(eye, forward, globe_radius)
        .map(|hit| from_surface_point(hit, globe_radius))
        .unwrap_or_else(|| from_surface_point(eye, globe_radius));

    let distance_radii = eye.length() / globe_radius.max(1e-12);
    let altitude_radii = (distance_radii - 1.0).max(0.0);
    let half = (altitude_radii * config.degrees_per_radius)
        .clamp(config.min_half_extent_deg, config.max_half_extent_deg);

    let span = (config.far_distance_radii - config.near_distance_radii).max(1e-9);
    let zoom_level = (1.0 - (distance_radii - config.near_distance_radii) / span).clamp(0.0, 1.0);

    ViewportBounds {
        min_lat: clamp_lat(center.lat - half),
        max_lat: clamp_lat(center.lat + half),
        min_lon: center.lon - half,
        max_lon: center.lon + half,
        center_lat: center.lat,
        center_lon: center.lon,
        zoom_level,
    }
}

/// Holds the last published bounds and suppresses unchanged recomputes.
#[derive(Debug, Clone)]
pub struct ViewportEngine {
    config: ViewportConfig,
    globe_radius: f64,
    current: Option<ViewportBounds>,
    key: Option<BoundsKey>,
}

impl ViewportEngine {
    pub fn new(config: ViewportConfig, globe_radius: f64) -> Self {
        Self {
            config,
            globe_radius,
            current: None,
            key: None,
        }
    }

    pub fn current(&self) -> Option<&ViewportBounds> {
        self.current.as_ref()
    }

    /// Recompute from the camera; returns the bounds only if the rounded key
    /// differs from the last published one.
    pub fn update(&mut self, eye: Vec3, forward: Vec3) -> Option<ViewportBounds> {
        let bounds = compute_viewport(eye, forward, self.globe_radius, &self.config);
        let key = bounds.key(&self.config);
        if self.key == Some(key) {
            return None;
        }
        debug!(
            center_lat = bounds.center_lat,
            center_lon = bounds.center_lon,
            zoom = bounds.zoom_level,
            "viewport changed"
        );
        self.key = Some(key);
        self.current = Some(bounds);
        Some(bounds)
    }
}
