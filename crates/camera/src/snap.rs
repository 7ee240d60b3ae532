//! Picking an entity to jump to from keyboard navigation.

use foundation::math::{GeoPosition, StableF64, angular_distance_deg, initial_bearing_deg};
use scene::entity::EntityRef;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SnapDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SnapDirection {
    /// Screen direction as a clockwise angle from screen-up.
    pub fn screen_angle_deg(self) -> f64 {
        match self {
            SnapDirection::Up => 0.0,
            SnapDirection::Right => 90.0,
            SnapDirection::Down => 180.0,
            SnapDirection::Left => 270.0,
        }
    }
}

/// Nearest candidate within `radius_deg` of `look`. Ties go to the lower ref.
pub fn nearest_within<I>(look: GeoPosition, candidates: I, radius_deg: f64) -> Option<EntityRef>
where
    I: IntoIterator<Item = (EntityRef, GeoPosition)>,
{
    candidates
        .into_iter()
        .map(|(entity, p)| (StableF64(angular_distance_deg(look.lat, look.lon, p.lat, p.lon)), entity))
        .filter(|(d, _)| d.0 <= radius_deg)
        .min()
        .map(|(_, entity)| entity)
}

/// Best candidate toward `bearing_deg` (geographic) from `look`.
///
/// Scores alignment with the requested bearing times inverse distance;
/// candidates more than 60° off-axis, beyond `max_radius_deg`, or at the
/// look point itself are ignored.
pub fn best_in_direction<I>(
    look: GeoPosition,
    bearing_deg: f64,
    candidates: I,
    max_radius_deg: f64,
) -> Option<EntityRef>
where
    I: IntoIterator<Item = (EntityRef, GeoPosition)>,
{
    const MIN_ALIGNMENT: f64 = 0.5;
    const MIN_DISTANCE_DEG: f64 = 0.01;

    candidates
        .into_iter()
        .filter_map(|(entity, p)| {
            let dist = angular_distance_deg(look.lat, look.lon, p.lat, p.lon);
            if !(MIN_DISTANCE_DEG..=max_radius_deg).contains(&dist) {
                return None;
            }
            let bearing = initial_bearing_deg(look.lat, look.lon, p.lat, p.lon);
            let alignment = (bearing - bearing_deg).to_radians().cos();
            if alignment < MIN_ALIGNMENT {
                return None;
            }
            let score = alignment / (1.0 + dist);
            // Negated so `min` picks the highest score.
            Some((StableF64(-score), entity))
        })
        .min()
        .map(|(_, entity)| entity)
}
