//! Deterministic stand-in traffic.
//!
//! Used when the very first fetch fails with nothing loaded, and by the
//! headless host when no replay files are given.

use foundation::math::{PredictionLimits, normalize_lon};

use crate::protocol::{RawAircraftState, SnapshotPayload};

/// SplitMix64 step; enough for reproducible placement.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn unit(state: &mut u64) -> f64 {
    (splitmix64(state) >> 11) as f64 / (1u64 << 53) as f64
}

#[derive(Debug, Clone, PartialEq)]
struct SyntheticAircraft {
    id: String,
    callsign: String,
    lat: f64,
    lon: f64,
    altitude_ft: f64,
    heading_deg: f64,
    speed_knots: f64,
    vertical_rate_fpm: f64,
}

/// A fixed fleet that flies straight lines from its starting positions.
#[derive(Debug, Clone)]
pub struct SyntheticFleet {
    aircraft: Vec<SyntheticAircraft>,
    motion: PredictionLimits,
}

impl SyntheticFleet {
    pub fn new(count: usize, seed: u64) -> Self {
        let mut state = seed;
        let aircraft = (0..count)
            .map(|i| {
                // Uniform on the sphere, kept away from the poles.
                let lat = (2.0 * unit(&mut state) - 1.0).asin().to_degrees().clamp(-75.0, 75.0);
                let lon = unit(&mut state) * 360.0 - 180.0;
                let cruise = unit(&mut state) > 0.15;
                SyntheticAircraft {
                    id: format!("syn{i:05x}"),
                    callsign: format!("SYN{i:04}"),
                    lat,
                    lon,
                    altitude_ft: if cruise {
                        24_000.0 + unit(&mut state) * 16_000.0
                    } else {
                        2_000.0 + unit(&mut state) * 8_000.0
                    },
                    heading_deg: unit(&mut state) * 360.0,
                    speed_knots: if cruise {
                        380.0 + unit(&mut state) * 140.0
                    } else {
                        160.0 + unit(&mut state) * 120.0
                    },
                    vertical_rate_fpm: 0.0,
                }
            })
            .collect();
        Self {
            aircraft,
            motion: PredictionLimits {
                max_horizon_s: f64::INFINITY,
                ..PredictionLimits::default()
            },
        }
    }

    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    /// The fleet `elapsed_s` after its start, stamped with `time_s`.
    pub fn snapshot(&self, elapsed_s: f64, time_s: f64) -> SnapshotPayload {
        let aircraft = self
            .aircraft
            .iter()
            .map(|a| {
                let (lat, lon) = self.motion.predict_position(
                    a.lat,
                    a.lon,
                    a.heading_deg,
                    a.speed_knots,
                    elapsed_s,
                );
                RawAircraftState {
                    id: Some(a.id.clone()),
                    callsign: Some(a.callsign.clone()),
                    lat: Some(lat),
                    lon: Some(normalize_lon(lon)),
                    altitude_ft: Some(a.altitude_ft),
                    heading: Some(a.heading_deg),
                    ground_speed_knots: Some(a.speed_knots),
                    vertical_rate_fpm: Some(a.vertical_rate_fpm),
                    on_ground: Some(false),
                    timestamp: Some(time_s),
                }
            })
            .collect();
        SnapshotPayload {
            time: Some(time_s),
            aircraft,
        }
    }
}
