//! Dead reckoning between server updates.
//!
//! Positions are extrapolated along the heading with a flat-earth-at-latitude
//! approximation. Prediction is deliberately heuristic: it switches off for
//! parked aircraft and for stale data instead of compounding error.

use super::geo::{NM_PER_DEGREE, clamp_lat, normalize_lon};

/// Tunables for dead reckoning.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PredictionLimits {
    /// Below this ground speed the position is held.
    pub min_speed_knots: f64,
    /// Extrapolation is disabled past this many seconds since the last fix.
    pub max_horizon_s: f64,
    /// Floor for `cos(latitude)` when converting east distance to longitude.
    pub min_cos_lat: f64,
    /// Vertical rates with a smaller magnitude are treated as level flight.
    pub vertical_rate_noise_fpm: f64,
}

impl Default for PredictionLimits {
    fn default() -> Self {
        Self {
            min_speed_knots: 5.0,
            max_horizon_s: 120.0,
            min_cos_lat: 0.01,
            vertical_rate_noise_fpm: 64.0,
        }
    }
}

impl PredictionLimits {
    fn horizon_allows(&self, elapsed_s: f64) -> bool {
        elapsed_s.is_finite() && elapsed_s > 0.0 && elapsed_s <= self.max_horizon_s
    }

    /// Predicted `(lat, lon)` after `elapsed_s` seconds.
    ///
    /// Returns the input (longitude wrapped) when the speed is below the
    /// threshold, the elapsed time is not positive, or the horizon is exceeded.
    pub fn predict_position(
        &self,
        lat: f64,
        lon: f64,
        heading_deg: f64,
        speed_knots: f64,
        elapsed_s: f64,
    ) -> (f64, f64) {
        let mut out = (lat, lon);
        self.predict_position_into(&mut out, lat, lon, heading_deg, speed_knots, elapsed_s);
        out
    }

    /// Allocation-free variant of [`Self::predict_position`].
    pub fn predict_position_into(
        &self,
        out: &mut (f64, f64),
        lat: f64,
        lon: f64,
        heading_deg: f64,
        speed_knots: f64,
        elapsed_s: f64,
    ) {
        let moving = speed_knots.is_finite() && speed_knots >= self.min_speed_knots;
        if !moving || !heading_deg.is_finite() || !self.horizon_allows(elapsed_s) {
            *out = (lat, normalize_lon(lon));
            return;
        }

        let distance_nm = speed_knots * elapsed_s / 3600.0;
        let (sin_h, cos_h) = heading_deg.to_radians().sin_cos();
        let north_deg = distance_nm * cos_h / NM_PER_DEGREE;
        let east_nm = distance_nm * sin_h;

        let cos_lat = lat.to_radians().cos().max(self.min_cos_lat);
        let east_deg = east_nm / (NM_PER_DEGREE * cos_lat);

        *out = (clamp_lat(lat + north_deg), normalize_lon(lon + east_deg));
    }

    /// Predicted altitude after `elapsed_s` seconds of linear climb/descent.
    pub fn predict_altitude(&self, altitude_ft: f64, vertical_rate_fpm: f64, elapsed_s: f64) -> f64 {
        let level = !vertical_rate_fpm.is_finite()
            || vertical_rate_fpm.abs() < self.vertical_rate_noise_fpm;
        if level || !self.horizon_allows(elapsed_s) {
            return altitude_ft;
        }
        let predicted = altitude_ft + vertical_rate_fpm * elapsed_s / 60.0;
        // Descents never extrapolate through the ground.
        if altitude_ft >= 0.0 {
            predicted.max(0.0)
        } else {
            predicted
        }
    }
}

/// [`PredictionLimits::predict_position`] with default limits.
pub fn predict_position(
    lat: f64,
    lon: f64,
    heading_deg: f64,
    speed_knots: f64,
    elapsed_s: f64,
) -> (f64, f64) {
    PredictionLimits::default().predict_position(lat, lon, heading_deg, speed_knots, elapsed_s)
}

/// [`PredictionLimits::predict_altitude`] with default limits.
pub fn predict_altitude(altitude_ft: f64, vertical_rate_fpm: f64, elapsed_s: f64) -> f64 {
    PredictionLimits::default().predict_altitude(altitude_ft, vertical_rate_fpm, elapsed_s)
}
