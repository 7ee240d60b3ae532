use crate::math::{clamp_lat, lon_delta, normalize_lon};

/// Geographic bounding box in degrees.
///
/// Latitude is clamped to `[-90, 90]`. Longitude is wrap-tolerant: `min_lon`
/// may be below -180 or `max_lon` above 180 when the box straddles the
/// antimeridian, and containment is evaluated on the wrapped circle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    pub fn world() -> Self {
        Self::new(-90.0, 90.0, -180.0, 180.0)
    }

    /// Box of `half_extent_deg` around a center, latitude clamped.
    pub fn around(center_lat: f64, center_lon: f64, half_extent_deg: f64) -> Self {
        let half = half_extent_deg.max(0.0);
        Self::new(
            clamp_lat(center_lat - half),
            clamp_lat(center_lat + half),
            center_lon - half,
            center_lon + half,
        )
    }

    pub fn lon_span(&self) -> f64 {
        (self.max_lon - self.min_lon).max(0.0)
    }

    pub fn covers_all_longitudes(&self) -> bool {
        self.lon_span() >= 360.0
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat < self.min_lat || lat > self.max_lat {
            return false;
        }
        if self.covers_all_longitudes() {
            return true;
        }
        let offset = lon_delta(self.min_lon, lon).rem_euclid(360.0);
        offset <= self.lon_span()
    }

    /// The same box with longitudes wrapped into `[-180, 180)`.
    ///
    /// A box crossing the antimeridian comes back as two boxes.
    pub fn split_at_antimeridian(&self) -> Vec<GeoBounds> {
        if self.covers_all_longitudes() {
            return vec![Self::new(self.min_lat, self.max_lat, -180.0, 180.0)];
        }
        let min = normalize_lon(self.min_lon);
        let max = min + self.lon_span();
        if max <= 180.0 {
            vec![Self::new(self.min_lat, self.max_lat, min, max)]
        } else {
            vec![
                Self::new(self.min_lat, self.max_lat, min, 180.0),
                Self::new(self.min_lat, self.max_lat, -180.0, max - 360.0),
            ]
        }
    }
}
