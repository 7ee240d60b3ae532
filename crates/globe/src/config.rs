//! Session configuration.
//!
//! Every section is `#[serde(default)]`, so a JSON file only needs the keys it
//! changes. A handful of tunables can also be overridden from the environment.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use camera::CameraConfig;
use foundation::math::PredictionLimits;
use scene::instancing::ScaleConfig;
use scene::lifecycle::LifecycleConfig;
use scene::lod::LodConfig;
use scene::viewport::ViewportConfig;
use serde::Deserialize;
use streaming::PollingConfig;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ConfigError::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

/// Globe geometry, projection and timer cadence.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GlobeSettings {
    pub radius: f64,
    pub fov_y_deg: f64,
    pub aspect: f64,
    pub viewport_interval_s: f64,
    pub deload_interval_s: f64,
}

impl Default for GlobeSettings {
    fn default() -> Self {
        Self {
            radius: 1.0,
            fov_y_deg: 45.0,
            aspect: 16.0 / 9.0,
            viewport_interval_s: 0.25,
            deload_interval_s: 1.0,
        }
    }
}

/// Serializable mirror of [`PredictionLimits`].
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub min_speed_knots: f64,
    pub max_horizon_s: f64,
    pub min_cos_lat: f64,
    pub vertical_rate_noise_fpm: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        let l = PredictionLimits::default();
        Self {
            min_speed_knots: l.min_speed_knots,
            max_horizon_s: l.max_horizon_s,
            min_cos_lat: l.min_cos_lat,
            vertical_rate_noise_fpm: l.vertical_rate_noise_fpm,
        }
    }
}

impl From<PredictionConfig> for PredictionLimits {
    fn from(c: PredictionConfig) -> Self {
        PredictionLimits {
            min_speed_knots: c.min_speed_knots,
            max_horizon_s: c.max_horizon_s,
            min_cos_lat: c.min_cos_lat,
            vertical_rate_noise_fpm: c.vertical_rate_noise_fpm,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GlobeConfig {
    pub globe: GlobeSettings,
    pub prediction: PredictionConfig,
    pub viewport: ViewportConfig,
    pub lifecycle: LifecycleConfig,
    pub lod: LodConfig,
    pub camera: CameraConfig,
    pub polling: PollingConfig,
    pub scale: ScaleConfig,
}

impl GlobeConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Apply `SKYGLOBE_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.lod.threshold = var_usize(&lookup, "SKYGLOBE_LOD_THRESHOLD", self.lod.threshold);
        self.lifecycle.deload_grace_s =
            var_f64(&lookup, "SKYGLOBE_DELOAD_GRACE_S", self.lifecycle.deload_grace_s);
        self.lifecycle.horizon_cutoff =
            var_f64(&lookup, "SKYGLOBE_HORIZON_CUTOFF", self.lifecycle.horizon_cutoff);
        self.polling.interval_s =
            var_f64(&lookup, "SKYGLOBE_POLL_INTERVAL_S", self.polling.interval_s);
        self.camera.snap_radius_deg =
            var_f64(&lookup, "SKYGLOBE_SNAP_RADIUS_DEG", self.camera.snap_radius_deg);
    }
}

fn var_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn var_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    lookup(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scene::lifecycle::RevealSweep;

    #[test]
    fn empty_json_gives_defaults() {
        let config = GlobeConfig::from_json_str("{}").expect("parse");
        assert_eq!(config, GlobeConfig::default());
        assert_eq!(config.lifecycle.horizon_cutoff, -0.3);
        assert_eq!(config.camera.snap_radius_deg, 15.0);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = GlobeConfig::from_json_str(
            r#"{
                "lod": { "threshold": 500 },
                "lifecycle": { "sweep": "diagonal", "deload_grace_s": 12.5 },
                "camera": { "initial_lat": 51.5, "initial_lon": -0.12 }
            }"#,
        )
        .expect("parse");
        assert_eq!(config.lod.threshold, 500);
        assert_eq!(config.lod.hysteresis(), 50);
        assert_eq!(config.lifecycle.sweep, RevealSweep::Diagonal);
        assert_eq!(config.lifecycle.deload_grace_s, 12.5);
        assert_eq!(config.lifecycle.fade_in_s, LifecycleConfig::default().fade_in_s);
        assert_eq!(config.camera.initial_lat, 51.5);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = GlobeConfig::from_json_str("{ \"lod\": 3 }").expect_err("bad section");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = GlobeConfig::load(Path::new("/nonexistent/skyglobe.json")).expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/skyglobe.json"));
    }

    #[test]
    fn overrides_replace_only_parseable_values() {
        let mut config = GlobeConfig::default();
        config.apply_overrides(|key| match key {
            "SKYGLOBE_LOD_THRESHOLD" => Some("750".to_string()),
            "SKYGLOBE_DELOAD_GRACE_S" => Some(" 45 ".to_string()),
            "SKYGLOBE_HORIZON_CUTOFF" => Some("not-a-number".to_string()),
            "SKYGLOBE_SNAP_RADIUS_DEG" => Some("NaN".to_string()),
            _ => None,
        });
        assert_eq!(config.lod.threshold, 750);
        assert_eq!(config.lod.hysteresis(), 75);
        assert_eq!(config.lifecycle.deload_grace_s, 45.0);
        assert_eq!(config.lifecycle.horizon_cutoff, -0.3);
        assert_eq!(config.camera.snap_radius_deg, 15.0);
        assert_eq!(config.polling.interval_s, PollingConfig::default().interval_s);
    }

    #[test]
    fn prediction_section_maps_to_limits() {
        let limits: PredictionLimits = GlobeConfig::default().prediction.into();
        assert_eq!(limits, PredictionLimits::default());
    }
}
