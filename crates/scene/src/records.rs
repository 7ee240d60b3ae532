use std::fmt;
use std::sync::Arc;

use foundation::math::{GeoPosition, normalize_lon};

use crate::entity::{EntityId, EntityKind, EntityRef};

/// Why an inbound record was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    MissingField(&'static str),
    EmptyId,
    LatitudeOutOfRange(f64),
    NonFinite(&'static str),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::MissingField(name) => write!(f, "missing field: {name}"),
            RecordError::EmptyId => write!(f, "empty identifier"),
            RecordError::LatitudeOutOfRange(lat) => write!(f, "latitude out of range: {lat}"),
            RecordError::NonFinite(name) => write!(f, "non-finite value in {name}"),
        }
    }
}

impl std::error::Error for RecordError {}

/// Latest server-reported state of one aircraft.
///
/// Records are immutable once stored; a newer snapshot replaces the whole
/// record.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftRecord {
    pub id: EntityId,
    pub callsign: String,
    pub position: GeoPosition,
    /// Degrees clockwise from north, `[0, 360)`.
    pub heading_deg: f64,
    pub ground_speed_knots: f64,
    pub vertical_rate_fpm: f64,
    pub on_ground: bool,
    /// Server time of the fix, seconds since the Unix epoch.
    pub server_timestamp_s: f64,
}

impl AircraftRecord {
    /// Check the position and normalize angles.
    ///
    /// Kinematic fields that are not finite are zeroed (the aircraft is then
    /// held in place by dead reckoning) rather than rejecting the record.
    pub fn validated(mut self) -> Result<Self, RecordError> {
        if self.id.as_str().trim().is_empty() {
            return Err(RecordError::EmptyId);
        }
        check_position(&self.position)?;
        self.position.lon = normalize_lon(self.position.lon);

        self.heading_deg = if self.heading_deg.is_finite() {
            self.heading_deg.rem_euclid(360.0)
        } else {
            0.0
        };
        if !self.ground_speed_knots.is_finite() || self.ground_speed_knots < 0.0 {
            self.ground_speed_knots = 0.0;
        }
        if !self.vertical_rate_fpm.is_finite() {
            self.vertical_rate_fpm = 0.0;
        }
        if !self.server_timestamp_s.is_finite() {
            return Err(RecordError::NonFinite("server_timestamp_s"));
        }
        Ok(self)
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::aircraft(self.id.clone())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AirportClass {
    Large,
    Medium,
    Small,
    Other,
}

impl AirportClass {
    /// Parse a dataset type code such as `large_airport`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "large_airport" | "large" => AirportClass::Large,
            "medium_airport" | "medium" => AirportClass::Medium,
            "small_airport" | "small" => AirportClass::Small,
            _ => AirportClass::Other,
        }
    }

    /// Minimum viewport zoom level (0 = far, 1 = near) at which the class shows.
    pub fn min_zoom_level(self) -> f64 {
        match self {
            AirportClass::Large => 0.0,
            AirportClass::Medium => 0.3,
            AirportClass::Small | AirportClass::Other => 0.6,
        }
    }
}

/// Static airport record, created once per dataset load.
#[derive(Debug, Clone, PartialEq)]
pub struct AirportRecord {
    pub id: EntityId,
    pub name: String,
    pub class: AirportClass,
    pub position: GeoPosition,
}

impl AirportRecord {
    pub fn validated(mut self) -> Result<Self, RecordError> {
        if self.id.as_str().trim().is_empty() {
            return Err(RecordError::EmptyId);
        }
        check_position(&self.position)?;
        self.position.lon = normalize_lon(self.position.lon);
        Ok(self)
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::airport(self.id.clone())
    }
}

fn check_position(p: &GeoPosition) -> Result<(), RecordError> {
    if !p.lat.is_finite() {
        return Err(RecordError::NonFinite("lat"));
    }
    if !p.lon.is_finite() {
        return Err(RecordError::NonFinite("lon"));
    }
    if !p.altitude_ft.is_finite() {
        return Err(RecordError::NonFinite("altitude_ft"));
    }
    if !(-90.0..=90.0).contains(&p.lat) {
        return Err(RecordError::LatitudeOutOfRange(p.lat));
    }
    Ok(())
}

/// A stored record of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRecord {
    Aircraft(Arc<AircraftRecord>),
    Airport(Arc<AirportRecord>),
}

impl EntityRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRecord::Aircraft(_) => EntityKind::Aircraft,
            EntityRecord::Airport(_) => EntityKind::Airport,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            EntityRecord::Aircraft(a) => &a.id,
            EntityRecord::Airport(a) => &a.id,
        }
    }

    pub fn position(&self) -> GeoPosition {
        match self {
            EntityRecord::Aircraft(a) => a.position,
            EntityRecord::Airport(a) => a.position,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef {
            kind: self.kind(),
            id: self.id().clone(),
        }
    }
}
