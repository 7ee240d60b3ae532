//! Wire types exchanged with the flight-data collaborator.
//!
//! This module defines:
//! - Raw aircraft states as they arrive (every field optional)
//! - The snapshot envelope
//! - The outbound bounding-box query
//!
//! Conversion into store records happens per row, so one malformed row never
//! discards the rest of a snapshot.

use foundation::math::{GeoPosition, normalize_lon};
use scene::entity::EntityId;
use scene::records::{AircraftRecord, RecordError};
use scene::viewport::ViewportBounds;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FetchError;

/// One aircraft row as delivered by the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAircraftState {
    #[serde(alias = "icao24")]
    pub id: Option<String>,
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(alias = "longitude")]
    pub lon: Option<f64>,
    #[serde(default)]
    pub altitude_ft: Option<f64>,
    #[serde(default, alias = "track")]
    pub heading: Option<f64>,
    #[serde(default)]
    pub ground_speed_knots: Option<f64>,
    #[serde(default)]
    pub vertical_rate_fpm: Option<f64>,
    #[serde(default)]
    pub on_ground: Option<bool>,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl RawAircraftState {
    /// Convert into a validated record. `fallback_time` fills a missing
    /// per-row timestamp.
    pub fn into_record(self, fallback_time: Option<f64>) -> Result<AircraftRecord, RecordError> {
        let id = self
            .id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(RecordError::MissingField("id"))?;
        let lat = self.lat.ok_or(RecordError::MissingField("lat"))?;
        let lon = self.lon.ok_or(RecordError::MissingField("lon"))?;
        let server_timestamp_s = self
            .timestamp
            .or(fallback_time)
            .ok_or(RecordError::MissingField("timestamp"))?;
        let on_ground = self.on_ground.unwrap_or(false);

        AircraftRecord {
            callsign: self
                .callsign
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| id.clone()),
            id: EntityId::new(&id),
            position: GeoPosition::new(lat, lon, self.altitude_ft.unwrap_or(0.0)),
            heading_deg: self.heading.unwrap_or(0.0),
            ground_speed_knots: self.ground_speed_knots.unwrap_or(0.0),
            vertical_rate_fpm: self.vertical_rate_fpm.unwrap_or(0.0),
            on_ground,
            server_timestamp_s,
        }
        .validated()
    }
}

impl TryFrom<RawAircraftState> for AircraftRecord {
    type Error = RecordError;

    fn try_from(raw: RawAircraftState) -> Result<Self, Self::Error> {
        raw.into_record(None)
    }
}

/// A whole snapshot as returned by one fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    /// Feed time of the snapshot, used for rows without their own timestamp.
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub aircraft: Vec<RawAircraftState>,
}

impl SnapshotPayload {
    pub fn from_json(bytes: &[u8]) -> Result<Self, FetchError> {
        serde_json::from_slice(bytes).map_err(FetchError::Decode)
    }

    /// Convert every row, dropping (and logging) the invalid ones.
    /// Returns the records and the number of rejected rows.
    pub fn into_records(self) -> (Vec<AircraftRecord>, usize) {
        let fallback = self.time;
        let mut rejected = 0usize;
        let mut records = Vec::with_capacity(self.aircraft.len());
        for raw in self.aircraft {
            let label = raw.id.clone().unwrap_or_default();
            match raw.into_record(fallback) {
                Ok(r) => records.push(r),
                Err(err) => {
                    rejected += 1;
                    warn!("dropping aircraft row {label:?}: {err}");
                }
            }
        }
        (records, rejected)
    }
}

/// Outbound spatial filter, whole degrees.
///
/// Longitudes are wrapped into `[-180, 180]`; when the box crosses the
/// antimeridian `min_lon > max_lon`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundsQuery {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundsQuery {
    pub fn world() -> Self {
        Self {
            min_lat: -90.0,
            max_lat: 90.0,
            min_lon: -180.0,
            max_lon: 180.0,
        }
    }

    pub fn from_viewport(v: &ViewportBounds) -> Self {
        let min_lat = v.min_lat.floor().clamp(-90.0, 90.0);
        let max_lat = v.max_lat.ceil().clamp(-90.0, 90.0);
        let min_lon = v.min_lon.floor();
        let max_lon = v.max_lon.ceil();
        if !(min_lon.is_finite() && max_lon.is_finite()) || max_lon - min_lon >= 360.0 {
            return Self {
                min_lat,
                max_lat,
                ..Self::world()
            };
        }
        Self {
            min_lat,
            max_lat,
            min_lon: wrap_query_lon(min_lon, false),
            max_lon: wrap_query_lon(max_lon, true),
        }
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    pub fn query_string(&self) -> String {
        format!(
            "lamin={}&lamax={}&lomin={}&lomax={}",
            self.min_lat, self.max_lat, self.min_lon, self.max_lon
        )
    }
}

/// Wrap into `[-180, 180]`, keeping an eastern edge on 180 rather than -180.
fn wrap_query_lon(lon: f64, eastern_edge: bool) -> f64 {
    let wrapped = normalize_lon(lon);
    if eastern_edge && wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn viewport(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> ViewportBounds {
        ViewportBounds {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            center_lat: 0.5 * (min_lat + max_lat),
            center_lon: 0.5 * (min_lon + max_lon),
            zoom_level: 0.5,
        }
    }

    #[test]
    fn decodes_feed_rows_with_aliases() {
        let json = br#"{
            "time": 1700000000,
            "aircraft": [
                {"icao24": "abc123", "callsign": "DAL42 ", "latitude": 40.0, "longitude": -74.0,
                 "altitudeFt": 32000, "track": 90, "groundSpeedKnots": 480, "verticalRateFpm": 0},
                {"id": "nopos", "callsign": "X"},
                {"id": "def456", "lat": 51.5, "lon": -0.4, "onGround": true, "timestamp": 1700000005}
            ]
        }"#;
        let payload = SnapshotPayload::from_json(json).expect("decode");
        let (records, rejected) = payload.into_records();
        assert_eq!(rejected, 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].callsign, "DAL42");
        assert_eq!(records[0].server_timestamp_s, 1_700_000_000.0);
        assert_eq!(records[0].heading_deg, 90.0);
        assert!(records[1].on_ground);
        assert_eq!(records[1].callsign, "def456");
        assert_eq!(records[1].server_timestamp_s, 1_700_000_005.0);
    }

    #[test]
    fn missing_fields_are_reported() {
        let raw = RawAircraftState {
            id: Some("a".to_string()),
            lat: Some(10.0),
            ..RawAircraftState::default()
        };
        assert_eq!(
            AircraftRecord::try_from(raw),
            Err(RecordError::MissingField("lon"))
        );
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = SnapshotPayload::from_json(b"{not json").expect_err("invalid");
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn bounds_query_rounds_outward_and_clamps() {
        let q = BoundsQuery::from_viewport(&viewport(-95.3, 40.2, -74.6, -60.1));
        assert_eq!(
            q,
            BoundsQuery {
                min_lat: -90.0,
                max_lat: 41.0,
                min_lon: -75.0,
                max_lon: -60.0,
            }
        );
        assert_eq!(q.query_string(), "lamin=-90&lamax=41&lomin=-75&lomax=-60");
    }

    #[test]
    fn bounds_query_wraps_longitude() {
        let q = BoundsQuery::from_viewport(&viewport(-10.0, 10.0, 160.0, 200.0));
        assert_eq!((q.min_lon, q.max_lon), (160.0, -160.0));
        assert!(q.crosses_antimeridian());

        let q = BoundsQuery::from_viewport(&viewport(-10.0, 10.0, 150.0, 180.0));
        assert_eq!((q.min_lon, q.max_lon), (150.0, 180.0));

        let q = BoundsQuery::from_viewport(&viewport(-90.0, 90.0, -200.0, 170.0));
        assert_eq!((q.min_lon, q.max_lon), (-180.0, 180.0));
    }
}
