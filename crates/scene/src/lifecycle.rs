//! Per-entity presentation state: reveal fade, smoothed visibility, dead
//! reckoning between snapshots, and out-of-view deload timing.
//!
//! Entries are keyed by [`EntityRef`] in a `BTreeMap`, so every per-entity
//! pass runs in the same order on every replay.
//!
//! Phases: `unseen -> fading-in -> steady <-> out-of-view -> deloaded`.
//! "Unseen" has no entry; "deloaded" removes the entry and the store record.

use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::math::{
    GeoPosition, PredictionLimits, Vec3, lon_delta, normalize_lon, to_surface_point_into,
};
use foundation::time::Time;
use serde::Deserialize;
use tracing::debug;

use crate::entity::EntityRef;
use crate::records::{AircraftRecord, EntityRecord};
use crate::selection::Focus;
use crate::store::EntityStore;
use crate::visibility::ViewProbe;

/// Stagger pattern for the initial reveal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealSweep {
    /// West to east.
    Longitude,
    /// From the north-west corner of the map outward.
    Diagonal,
}

impl RevealSweep {
    /// Start delay as a fraction of the sweep duration, in `[0, 1]`.
    /// Monotonic in position so replays stagger identically.
    pub fn delay_fraction(self, lat: f64, lon: f64) -> f64 {
        let x = (normalize_lon(lon) + 180.0) / 360.0;
        let f = match self {
            RevealSweep::Longitude => x,
            RevealSweep::Diagonal => {
                let y = (90.0 - lat.clamp(-90.0, 90.0)) / 180.0;
                0.5 * (x + y)
            }
        };
        f.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub fade_in_s: f64,
    /// How long after `begin_reveal` new entities get a staggered start.
    pub reveal_window_s: f64,
    /// Largest stagger delay.
    pub reveal_sweep_s: f64,
    pub sweep: RevealSweep,
    pub visibility_rate: f64,
    pub opacity_rate: f64,
    /// Upper bound on the per-frame smoothing factor.
    pub smoothing_cap: f64,
    pub deload_grace_s: f64,
    /// Window over which a position correction is blended out.
    pub correction_s: f64,
    /// Minimum `dot(entity_dir, camera_dir)` for an entity to count as facing.
    pub horizon_cutoff: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            fade_in_s: 0.6,
            reveal_window_s: 2.5,
            reveal_sweep_s: 1.5,
            sweep: RevealSweep::Longitude,
            visibility_rate: 8.0,
            opacity_rate: 5.0,
            smoothing_cap: 1.0,
            deload_grace_s: 30.0,
            correction_s: 1.0,
            horizon_cutoff: -0.3,
        }
    }
}

/// Move `value` toward `target` by `min(dt * rate, cap)` of the gap.
///
/// The factor is clamped to `[0, 1]`, so the result never passes the target.
pub fn smooth_toward(value: f64, target: f64, dt_s: f64, rate: f64, cap: f64) -> f64 {
    let k = (dt_s * rate).min(cap);
    let k = if k.is_finite() { k.clamp(0.0, 1.0) } else { 0.0 };
    value + (target - value) * k
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LifecyclePhase {
    FadingIn,
    Steady,
    OutOfView,
}

/// Held server state for one aircraft plus the blend-out correction.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionState {
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
    pub heading_deg: f64,
    pub speed_knots: f64,
    pub vertical_rate_fpm: f64,
    pub server_timestamp_s: f64,
    /// Local time the held values were applied.
    pub anchor: Time,
    /// `(lat, lon, altitude)` offset at `anchor`, decaying to zero.
    correction: (f64, f64, f64),
}

impl PredictionState {
    pub fn from_record(record: &AircraftRecord, now: Time) -> Self {
        Self {
            lat: record.position.lat,
            lon: record.position.lon,
            altitude_ft: record.position.altitude_ft,
            heading_deg: record.heading_deg,
            speed_knots: record.ground_speed_knots,
            vertical_rate_fpm: record.vertical_rate_fpm,
            server_timestamp_s: record.server_timestamp_s,
            anchor: now,
            correction: (0.0, 0.0, 0.0),
        }
    }

    pub fn holds_position_of(&self, record: &AircraftRecord) -> bool {
        self.lat == record.position.lat
            && self.lon == record.position.lon
            && self.altitude_ft == record.position.altitude_ft
    }

    pub fn predict(&self, now: Time, limits: &PredictionLimits, correction_s: f64) -> GeoPosition {
        let elapsed = now.seconds_since(self.anchor);
        let mut p = (self.lat, self.lon);
        limits.predict_position_into(
            &mut p,
            self.lat,
            self.lon,
            self.heading_deg,
            self.speed_knots,
            elapsed,
        );
        let mut alt = limits.predict_altitude(self.altitude_ft, self.vertical_rate_fpm, elapsed);

        let w = if correction_s > 0.0 {
            (1.0 - elapsed.max(0.0) / correction_s).clamp(0.0, 1.0)
        } else {
            0.0
        };
        if w > 0.0 {
            let (dlat, dlon, dalt) = self.correction;
            p.0 = (p.0 + dlat * w).clamp(-90.0, 90.0);
            p.1 = normalize_lon(p.1 + dlon * w);
            alt += dalt * w;
        }
        GeoPosition::new(p.0, p.1, alt)
    }

    /// Replace the held values with `record`, keeping the displayed position
    /// continuous by carrying the previous prediction as a decaying offset.
    pub fn rebase(&mut self, record: &AircraftRecord, now: Time, limits: &PredictionLimits, correction_s: f64) {
        let shown = self.predict(now, limits, correction_s);
        *self = Self::from_record(record, now);
        self.correction = (
            shown.lat - record.position.lat,
            lon_delta(record.position.lon, shown.lon),
            shown.altitude_ft - record.position.altitude_ft,
        );
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleEntry {
    pub entity: EntityRef,
    pub record: EntityRecord,
    pub phase: LifecyclePhase,
    pub fade_start: Time,
    pub fade_progress: f64,
    pub visibility: f64,
    pub opacity: f64,
    pub out_of_view_since: Option<Time>,
    pub prediction: Option<PredictionState>,
    /// Position shown this frame (predicted for aircraft).
    pub position: GeoPosition,
    /// World-space point for `position`.
    pub point: Vec3,
    pub in_view: bool,
}

impl LifecycleEntry {
    pub fn heading_deg(&self) -> f64 {
        match (&self.record, &self.prediction) {
            (_, Some(p)) => p.heading_deg,
            (EntityRecord::Aircraft(a), None) => a.heading_deg,
            (EntityRecord::Airport(_), None) => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleManager {
    config: LifecycleConfig,
    limits: PredictionLimits,
    globe_radius: f64,
    entries: BTreeMap<EntityRef, LifecycleEntry>,
    synced_generation: Option<u64>,
    reveal_started: Option<Time>,
}

impl LifecycleManager {
    pub fn new(config: LifecycleConfig, limits: PredictionLimits, globe_radius: f64) -> Self {
        Self {
            config,
            limits,
            globe_radius,
            entries: BTreeMap::new(),
            synced_generation: None,
            reveal_started: None,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Start the staggered reveal used for the first data load.
    pub fn begin_reveal(&mut self, now: Time) {
        self.reveal_started = Some(now);
    }

    pub fn is_revealing(&self, now: Time) -> bool {
        self.reveal_started
            .is_some_and(|start| now.seconds_since(start) <= self.config.reveal_window_s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, entity: &EntityRef) -> Option<&LifecycleEntry> {
        self.entries.get(entity)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LifecycleEntry> {
        self.entries.values()
    }

    pub fn tracked_aircraft(&self) -> usize {
        self.entries.keys().filter(|e| e.is_aircraft()).count()
    }

    /// Aircraft that passed the last visibility pass; drives the detail level.
    pub fn visible_aircraft(&self) -> usize {
        self.entries
            .iter()
            .filter(|(entity, entry)| entity.is_aircraft() && entry.in_view)
            .count()
    }

    pub fn predicted_position(&self, entity: &EntityRef) -> Option<GeoPosition> {
        self.entries.get(entity).map(|e| e.position)
    }

    /// Mirror the store: create entries for new records, rebase prediction for
    /// moved aircraft, drop entries whose record left the store.
    ///
    /// Does nothing if the store generation is unchanged since the last sync.
    pub fn sync(&mut self, store: &EntityStore, now: Time) {
        if self.synced_generation == Some(store.generation()) {
            return;
        }
        self.synced_generation = Some(store.generation());

        self.entries.retain(|entity, _| store.contains(entity));

        let revealing = self.is_revealing(now);
        for record in store.iter() {
            let entity = record.entity_ref();
            match self.entries.get(&entity) {
                Some(entry) => {
                    if !entry_record_is(entry, &record) {
                        self.refresh(&entity, record, now);
                    }
                }
                None => {
                    let entry = self.new_entry(entity.clone(), record, now, revealing);
                    self.entries.insert(entity, entry);
                }
            }
        }
    }

    fn refresh(&mut self, entity: &EntityRef, record: EntityRecord, now: Time) {
        let limits = self.limits;
        let correction_s = self.config.correction_s;
        let Some(entry) = self.entries.get_mut(entity) else {
            return;
        };
        if let EntityRecord::Aircraft(a) = &record {
            match entry.prediction.as_mut() {
                Some(state) if state.holds_position_of(a) => {}
                Some(state) => state.rebase(a, now, &limits, correction_s),
                None => entry.prediction = Some(PredictionState::from_record(a, now)),
            }
        }
        entry.record = record;
    }

    fn new_entry(
        &self,
        entity: EntityRef,
        record: EntityRecord,
        now: Time,
        revealing: bool,
    ) -> LifecycleEntry {
        let position = record.position();
        let delay = if revealing {
            self.config
                .sweep
                .delay_fraction(position.lat, position.lon)
                * self.config.reveal_sweep_s
        } else {
            0.0
        };
        let prediction = match &record {
            EntityRecord::Aircraft(a) => Some(PredictionState::from_record(a, now)),
            EntityRecord::Airport(_) => None,
        };
        let mut point = Vec3::ZERO;
        to_surface_point_into(
            &mut point,
            position.lat,
            position.lon,
            position.altitude_ft,
            self.globe_radius,
        );
        LifecycleEntry {
            entity,
            record,
            phase: LifecyclePhase::FadingIn,
            fade_start: now.plus(delay),
            fade_progress: 0.0,
            visibility: 0.0,
            opacity: 0.0,
            out_of_view_since: None,
            prediction,
            position,
            point,
            in_view: false,
        }
    }

    /// Per-frame pass: prediction, visibility target, smoothing, fade and
    /// out-of-view bookkeeping.
    ///
    /// `zoom_level` gates airport classes; focused entities are always shown
    /// and never accrue out-of-view time.
    pub fn update(&mut self, now: Time, dt_s: f64, probe: &ViewProbe, focus: &Focus, zoom_level: f64) {
        let c = self.config;
        for (entity, entry) in self.entries.iter_mut() {
            if let Some(state) = &entry.prediction {
                entry.position = state.predict(now, &self.limits, c.correction_s);
            }
            to_surface_point_into(
                &mut entry.point,
                entry.position.lat,
                entry.position.lon,
                entry.position.altitude_ft,
                self.globe_radius,
            );

            let focused = focus.is_focused(entity);
            let zoom_ok = match &entry.record {
                EntityRecord::Airport(a) => zoom_level >= a.class.min_zoom_level(),
                EntityRecord::Aircraft(_) => true,
            };
            entry.in_view = focused || (zoom_ok && probe.is_visible(entry.point));

            entry.fade_progress = if c.fade_in_s > 0.0 {
                (now.seconds_since(entry.fade_start) / c.fade_in_s).clamp(0.0, 1.0)
            } else if now >= entry.fade_start {
                1.0
            } else {
                0.0
            };

            let vis_target = if entry.in_view { 1.0 } else { 0.0 };
            let opacity_target = vis_target * entry.fade_progress;
            entry.visibility =
                smooth_toward(entry.visibility, vis_target, dt_s, c.visibility_rate, c.smoothing_cap);
            entry.opacity =
                smooth_toward(entry.opacity, opacity_target, dt_s, c.opacity_rate, c.smoothing_cap);

            if entry.in_view || focused {
                entry.out_of_view_since = None;
            } else if entry.out_of_view_since.is_none() {
                entry.out_of_view_since = Some(now);
            }

            entry.phase = if entry.out_of_view_since.is_some() {
                LifecyclePhase::OutOfView
            } else if entry.fade_progress < 1.0 {
                LifecyclePhase::FadingIn
            } else {
                LifecyclePhase::Steady
            };
        }
    }

    /// Deload aircraft out of view for longer than the grace period.
    ///
    /// `focus` is read at call time; focused entities are skipped. Each
    /// deloaded entity is passed to `on_deload` once and its entry dropped.
    pub fn run_deload_check(
        &mut self,
        now: Time,
        focus: &Focus,
        mut on_deload: impl FnMut(&EntityRef),
    ) -> usize {
        let grace = self.config.deload_grace_s;
        let expired: Vec<EntityRef> = self
            .entries
            .iter()
            .filter(|(entity, entry)| {
                entity.is_aircraft()
                    && !focus.is_focused(entity)
                    && entry
                        .out_of_view_since
                        .is_some_and(|since| now.seconds_since(since) > grace)
            })
            .map(|(entity, _)| entity.clone())
            .collect();

        for entity in &expired {
            self.entries.remove(entity);
            debug!(%entity, "deloading after {grace}s out of view");
            on_deload(entity);
        }
        expired.len()
    }
}

fn entry_record_is(entry: &LifecycleEntry, record: &EntityRecord) -> bool {
    match (&entry.record, record) {
        (EntityRecord::Aircraft(a), EntityRecord::Aircraft(b)) => Arc::ptr_eq(a, b),
        (EntityRecord::Airport(a), EntityRecord::Airport(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::tests::aircraft;
    use crate::visibility::CameraView;
    use foundation::math::to_surface_point;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn probe_over(lat: f64, lon: f64) -> ViewProbe {
        let view = CameraView::new(
            to_surface_point(lat, lon, 0.0, 3.0),
            Vec3::ZERO,
            45f64.to_radians(),
            1.5,
        );
        ViewProbe::new(&view, 1.0, -0.3)
    }

    fn manager() -> LifecycleManager {
        LifecycleManager::new(LifecycleConfig::default(), PredictionLimits::default(), 1.0)
    }

    fn store_with(records: Vec<AircraftRecord>) -> EntityStore {
        let mut store = EntityStore::new();
        store.merge_snapshot(records, &Focus::default(), 0.0);
        store
    }

    #[test]
    fn smoothing_is_monotonic_and_bounded() {
        let mut v = 0.0;
        let mut last = v;
        for _ in 0..200 {
            v = smooth_toward(v, 1.0, 0.05, 8.0, 1.0);
            assert!(v >= last && v <= 1.0);
            last = v;
        }
        assert_close(v, 1.0, 1e-6);
        // A huge dt cannot overshoot.
        assert_eq!(smooth_toward(0.2, 1.0, 10.0, 8.0, 5.0), 1.0);
        assert_eq!(smooth_toward(0.8, 0.0, 10.0, 8.0, 5.0), 0.0);
    }

    #[test]
    fn sweep_delays_are_monotonic() {
        let s = RevealSweep::Longitude;
        assert!(s.delay_fraction(0.0, -170.0) < s.delay_fraction(0.0, 10.0));
        let d = RevealSweep::Diagonal;
        assert!(d.delay_fraction(80.0, -170.0) < d.delay_fraction(-80.0, 170.0));
        assert_eq!(s.delay_fraction(0.0, -180.0), 0.0);
    }

    #[test]
    fn reveal_staggers_by_longitude() {
        let mut store = store_with(vec![aircraft("west", 0.0, -120.0), aircraft("east", 0.0, 120.0)]);
        let mut lm = manager();
        lm.begin_reveal(Time(0.0));
        lm.sync(&store, Time(0.0));
        let west = lm.entry(&EntityRef::aircraft("west")).expect("west");
        let east = lm.entry(&EntityRef::aircraft("east")).expect("east");
        assert!(west.fade_start < east.fade_start);

        // Outside the reveal window new entities start immediately.
        store.merge_snapshot(vec![aircraft("late", 0.0, 120.0)], &Focus::default(), 0.0);
        lm.sync(&store, Time(10.0));
        let late = lm.entry(&EntityRef::aircraft("late")).expect("late");
        assert_eq!(late.fade_start, Time(10.0));
    }

    #[test]
    fn identical_resend_does_not_rebase_prediction() {
        let mut store = store_with(vec![aircraft("a", 40.0, -74.0)]);
        let mut lm = manager();
        lm.sync(&store, Time(0.0));

        // Same position, newer timestamp: record is replaced but held values stay.
        let mut resend = aircraft("a", 40.0, -74.0);
        resend.server_timestamp_s += 5.0;
        store.merge_snapshot(vec![resend], &Focus::default(), 0.0);
        lm.sync(&store, Time(5.0));
        let state = lm
            .entry(&EntityRef::aircraft("a"))
            .and_then(|e| e.prediction.clone())
            .expect("prediction");
        assert_eq!(state.anchor, Time(0.0));

        let mut moved = aircraft("a", 40.0, -73.5);
        moved.server_timestamp_s += 10.0;
        store.merge_snapshot(vec![moved], &Focus::default(), 0.0);
        lm.sync(&store, Time(10.0));
        let state = lm
            .entry(&EntityRef::aircraft("a"))
            .and_then(|e| e.prediction.clone())
            .expect("prediction");
        assert_eq!(state.anchor, Time(10.0));
        assert_eq!(state.lon, -73.5);
    }

    #[test]
    fn rebase_blends_out_the_correction() {
        let limits = PredictionLimits::default();
        let mut state = PredictionState::from_record(&aircraft("a", 0.0, 0.0), Time(0.0));
        let before = state.predict(Time(10.0), &limits, 1.0);

        let mut update = aircraft("a", 0.0, 0.1);
        update.server_timestamp_s += 10.0;
        state.rebase(&update, Time(10.0), &limits, 1.0);

        let at_switch = state.predict(Time(10.0), &limits, 1.0);
        assert_close(at_switch.lon, before.lon, 1e-9);
        let settled = state.predict(Time(12.0), &limits, 1.0);
        let pure = limits.predict_position(0.0, 0.1, 90.0, 450.0, 2.0);
        assert_close(settled.lon, pure.1, 1e-9);
    }

    #[test]
    fn aircraft_moves_between_snapshots() {
        let store = store_with(vec![aircraft("a", 40.0, -74.0)]);
        let mut lm = manager();
        lm.sync(&store, Time(0.0));
        lm.update(Time(60.0), 0.016, &probe_over(40.0, -74.0), &Focus::default(), 0.5);
        let p = lm.predicted_position(&EntityRef::aircraft("a")).expect("tracked");
        assert!(p.lon > -74.0);
        assert_close(p.lat, 40.0, 1e-9);
    }

    #[test]
    fn far_side_entity_deloads_exactly_once() {
        let mut store = store_with(vec![aircraft("far", 0.0, 180.0), aircraft("near", 0.0, 0.0)]);
        let mut lm = manager();
        let probe = probe_over(0.0, 0.0);
        let focus = Focus::default();
        let mut t = 0.0;
        lm.sync(&store, Time(t));

        let mut deloaded = Vec::new();
        while t < 40.0 {
            t += 0.5;
            lm.update(Time(t), 0.5, &probe, &focus, 0.5);
            lm.run_deload_check(Time(t), &focus, |e| {
                store.remove(e);
                deloaded.push(e.clone());
            });
            lm.sync(&store, Time(t));
        }

        assert_eq!(deloaded, vec![EntityRef::aircraft("far")]);
        assert!(!store.contains(&EntityRef::aircraft("far")));
        assert!(store.contains(&EntityRef::aircraft("near")));
    }

    #[test]
    fn selected_entity_is_never_deloaded() {
        let store = store_with(vec![aircraft("far", 0.0, 180.0)]);
        let mut lm = manager();
        let probe = probe_over(0.0, 0.0);
        let focus = Focus {
            selected: Some(EntityRef::aircraft("far")),
            hovered: None,
        };
        lm.sync(&store, Time(0.0));
        for step in 1..=200 {
            let t = Time(step as f64);
            lm.update(t, 1.0, &probe, &focus, 0.5);
            assert_eq!(lm.run_deload_check(t, &focus, |_| {}), 0);
        }
        let entry = lm.entry(&EntityRef::aircraft("far")).expect("kept");
        assert!(entry.in_view);
        assert_eq!(entry.out_of_view_since, None);
    }

    #[test]
    fn airport_classes_gate_on_zoom() {
        use crate::records::{AirportClass, AirportRecord};
        let mut store = EntityStore::new();
        store.load_airports(vec![AirportRecord {
            id: "small".into(),
            name: "Strip".to_string(),
            class: AirportClass::Small,
            position: GeoPosition::new(0.0, 0.0, 0.0),
        }]);
        let mut lm = manager();
        lm.sync(&store, Time(0.0));
        let probe = probe_over(0.0, 0.0);
        let entity = EntityRef::airport("small");

        lm.update(Time(1.0), 0.016, &probe, &Focus::default(), 0.2);
        assert!(!lm.entry(&entity).expect("airport").in_view);
        lm.update(Time(1.1), 0.016, &probe, &Focus::default(), 0.8);
        assert!(lm.entry(&entity).expect("airport").in_view);

        // Airports never deload.
        lm.update(Time(2.0), 0.016, &probe, &Focus::default(), 0.0);
        assert_eq!(lm.run_deload_check(Time(500.0), &Focus::default(), |_| {}), 0);
    }

    #[test]
    fn visible_count_skips_the_far_side() {
        let store = store_with(vec![
            aircraft("near", 0.0, 0.0),
            aircraft("beside", 5.0, 5.0),
            aircraft("far", 0.0, 180.0),
        ]);
        let mut lm = manager();
        lm.sync(&store, Time(0.0));
        assert_eq!(lm.visible_aircraft(), 0);

        lm.update(Time(1.0), 0.016, &probe_over(0.0, 0.0), &Focus::default(), 0.5);
        assert_eq!(lm.tracked_aircraft(), 3);
        assert_eq!(lm.visible_aircraft(), 2);
    }
}
