use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::bounds::GeoBounds;
use tracing::{debug, warn};

use crate::entity::{EntityId, EntityKind, EntityRef};
use crate::records::{AircraftRecord, AirportRecord, EntityRecord};
use crate::selection::Focus;
use crate::spatial::SpatialGrid;

/// Grid cell size used by the store's spatial index.
const GRID_CELL_DEG: f64 = 10.0;

/// Outcome of merging one snapshot into the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub pruned: usize,
}

/// Authoritative collection of aircraft and airport records.
///
/// Records are held behind `Arc` and replaced wholesale, so consumers can
/// detect changes by pointer identity. Snapshots merge (upsert) instead of
/// replacing the whole collection: an entity missing from a bounds-filtered
/// snapshot stays until the lifecycle manager deloads it or it goes stale.
#[derive(Debug)]
pub struct EntityStore {
    aircraft: BTreeMap<EntityId, Arc<AircraftRecord>>,
    airports: BTreeMap<EntityId, Arc<AirportRecord>>,
    grid: SpatialGrid,
    generation: u64,
    latest_server_time_s: f64,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            aircraft: BTreeMap::new(),
            airports: BTreeMap::new(),
            grid: SpatialGrid::new(GRID_CELL_DEG),
            generation: 0,
            latest_server_time_s: f64::NEG_INFINITY,
        }
    }

    /// Bumped on every mutation; lets per-frame consumers skip resyncs.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn aircraft_count(&self) -> usize {
        self.aircraft.len()
    }

    pub fn airport_count(&self) -> usize {
        self.airports.len()
    }

    pub fn len(&self) -> usize {
        self.aircraft.len() + self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn aircraft(&self, id: &EntityId) -> Option<&Arc<AircraftRecord>> {
        self.aircraft.get(id)
    }

    pub fn airport(&self, id: &EntityId) -> Option<&Arc<AirportRecord>> {
        self.airports.get(id)
    }

    pub fn get(&self, entity: &EntityRef) -> Option<EntityRecord> {
        match entity.kind {
            EntityKind::Aircraft => self
                .aircraft
                .get(&entity.id)
                .map(|a| EntityRecord::Aircraft(Arc::clone(a))),
            EntityKind::Airport => self
                .airports
                .get(&entity.id)
                .map(|a| EntityRecord::Airport(Arc::clone(a))),
        }
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        match entity.kind {
            EntityKind::Aircraft => self.aircraft.contains_key(&entity.id),
            EntityKind::Airport => self.airports.contains_key(&entity.id),
        }
    }

    pub fn iter_aircraft(&self) -> impl Iterator<Item = &Arc<AircraftRecord>> {
        self.aircraft.values()
    }

    pub fn iter_airports(&self) -> impl Iterator<Item = &Arc<AirportRecord>> {
        self.airports.values()
    }

    /// All records, aircraft first, each kind in id order.
    pub fn iter(&self) -> impl Iterator<Item = EntityRecord> + '_ {
        self.iter_aircraft()
            .map(|a| EntityRecord::Aircraft(Arc::clone(a)))
            .chain(self.iter_airports().map(|a| EntityRecord::Airport(Arc::clone(a))))
    }

    /// Replace the airport dataset. Invalid rows are skipped.
    pub fn load_airports(&mut self, airports: Vec<AirportRecord>) -> usize {
        for (id, old) in std::mem::take(&mut self.airports) {
            self.grid
                .remove(&EntityRef::airport(id), old.position.lat, old.position.lon);
        }

        let mut skipped = 0usize;
        for airport in airports {
            match airport.validated() {
                Ok(airport) => {
                    self.grid.insert(
                        airport.entity_ref(),
                        airport.position.lat,
                        airport.position.lon,
                    );
                    self.airports.insert(airport.id.clone(), Arc::new(airport));
                }
                Err(err) => {
                    skipped += 1;
                    debug!("skipping airport row: {err}");
                }
            }
        }
        self.generation += 1;
        skipped
    }

    /// Merge a snapshot of aircraft records.
    ///
    /// - Invalid records are dropped individually.
    /// - A record equal to the stored one keeps the stored `Arc`.
    /// - Entities absent from the snapshot are retained, except aircraft whose
    ///   last fix is older than `stale_after_s` relative to the newest fix seen;
    ///   `focus` (read by the caller at merge time) is never pruned.
    pub fn merge_snapshot(
        &mut self,
        records: Vec<AircraftRecord>,
        focus: &Focus,
        stale_after_s: f64,
    ) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for record in records {
            let record = match record.validated() {
                Ok(r) => r,
                Err(err) => {
                    summary.rejected += 1;
                    warn!("dropping snapshot record: {err}");
                    continue;
                }
            };

            if record.server_timestamp_s > self.latest_server_time_s {
                self.latest_server_time_s = record.server_timestamp_s;
            }

            let entity = record.entity_ref();
            let new_pos = (record.position.lat, record.position.lon);
            match self.aircraft.get(&record.id) {
                Some(existing) if **existing == record => {
                    summary.unchanged += 1;
                }
                Some(existing) => {
                    let old_pos = (existing.position.lat, existing.position.lon);
                    self.grid.relocate(&entity, old_pos, new_pos);
                    self.aircraft.insert(record.id.clone(), Arc::new(record));
                    summary.updated += 1;
                }
                None => {
                    self.grid.insert(entity, new_pos.0, new_pos.1);
                    self.aircraft.insert(record.id.clone(), Arc::new(record));
                    summary.inserted += 1;
                }
            }
        }

        if stale_after_s.is_finite() && stale_after_s > 0.0 {
            let cutoff = self.latest_server_time_s - stale_after_s;
            let stale: Vec<EntityId> = self
                .aircraft
                .values()
                .filter(|a| a.server_timestamp_s < cutoff && !focus.is_focused(&a.entity_ref()))
                .map(|a| a.id.clone())
                .collect();
            for id in stale {
                if self.remove(&EntityRef::aircraft(id)) {
                    summary.pruned += 1;
                }
            }
        }

        if summary.inserted + summary.updated + summary.pruned > 0 {
            self.generation += 1;
        }
        summary
    }

    /// Remove an entity. Returns `true` if it was present.
    pub fn remove(&mut self, entity: &EntityRef) -> bool {
        let removed = match entity.kind {
            EntityKind::Aircraft => self
                .aircraft
                .remove(&entity.id)
                .map(|a| (a.position.lat, a.position.lon)),
            EntityKind::Airport => self
                .airports
                .remove(&entity.id)
                .map(|a| (a.position.lat, a.position.lon)),
        };
        match removed {
            Some((lat, lon)) => {
                self.grid.remove(entity, lat, lon);
                self.generation += 1;
                true
            }
            None => false,
        }
    }

    /// Entities whose stored position lies inside `bounds`, in ref order.
    pub fn query_bounds(&self, bounds: &GeoBounds) -> Vec<EntityRecord> {
        self.grid
            .query(bounds)
            .into_iter()
            .filter_map(|r| self.get(&r))
            .filter(|rec| {
                let p = rec.position();
                bounds.contains(p.lat, p.lon)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityStore, MergeSummary};
    use crate::entity::{EntityId, EntityRef};
    use crate::records::tests::aircraft;
    use crate::records::{AirportClass, AirportRecord};
    use crate::selection::Focus;
    use foundation::bounds::GeoBounds;
    use foundation::math::GeoPosition;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn merge_inserts_updates_and_keeps_identity_for_resends() {
        let mut store = EntityStore::new();
        let s = store.merge_snapshot(
            vec![aircraft("a", 10.0, 10.0), aircraft("b", 20.0, 20.0)],
            &Focus::default(),
            0.0,
        );
        assert_eq!(s.inserted, 2);

        let before = Arc::clone(store.aircraft(&EntityId::new("a")).expect("a"));
        let generation = store.generation();

        let mut moved = aircraft("b", 21.0, 20.0);
        moved.server_timestamp_s += 10.0;
        let s = store.merge_snapshot(vec![aircraft("a", 10.0, 10.0), moved], &Focus::default(), 0.0);
        assert_eq!(
            s,
            MergeSummary {
                updated: 1,
                unchanged: 1,
                ..MergeSummary::default()
            }
        );
        let after = store.aircraft(&EntityId::new("a")).expect("a");
        assert!(Arc::ptr_eq(&before, after));
        assert!(store.generation() > generation);
    }

    #[test]
    fn empty_snapshot_retains_existing_entities() {
        let mut store = EntityStore::new();
        store.merge_snapshot(vec![aircraft("a", 10.0, 10.0)], &Focus::default(), 300.0);
        let generation = store.generation();

        let s = store.merge_snapshot(Vec::new(), &Focus::default(), 300.0);
        assert_eq!(s, MergeSummary::default());
        assert_eq!(store.aircraft_count(), 1);
        assert_eq!(store.generation(), generation);
    }

    #[test]
    fn invalid_records_are_dropped_individually() {
        let mut store = EntityStore::new();
        let mut bad = aircraft("bad", 0.0, 0.0);
        bad.position.lon = f64::INFINITY;
        let s = store.merge_snapshot(
            vec![bad, aircraft("good", 1.0, 1.0)],
            &Focus::default(),
            0.0,
        );
        assert_eq!(s.rejected, 1);
        assert_eq!(s.inserted, 1);
        assert!(store.contains(&EntityRef::aircraft("good")));
    }

    #[test]
    fn stale_aircraft_are_pruned_unless_focused() {
        let mut store = EntityStore::new();
        store.merge_snapshot(
            vec![aircraft("old", 0.0, 0.0), aircraft("kept", 1.0, 1.0)],
            &Focus::default(),
            300.0,
        );

        let mut fresh = aircraft("fresh", 2.0, 2.0);
        fresh.server_timestamp_s += 600.0;
        let focus = Focus {
            selected: Some(EntityRef::aircraft("kept")),
            hovered: None,
        };
        let s = store.merge_snapshot(vec![fresh], &focus, 300.0);
        assert_eq!(s.pruned, 1);
        assert!(!store.contains(&EntityRef::aircraft("old")));
        assert!(store.contains(&EntityRef::aircraft("kept")));
    }

    #[test]
    fn query_bounds_filters_exact_positions() {
        let mut store = EntityStore::new();
        store.merge_snapshot(
            vec![aircraft("in", 40.0, -74.0), aircraft("edge", 40.0, -69.5)],
            &Focus::default(),
            0.0,
        );
        store.load_airports(vec![AirportRecord {
            id: EntityId::new("KJFK"),
            name: "John F Kennedy Intl".to_string(),
            class: AirportClass::Large,
            position: GeoPosition::new(40.64, -73.78, 13.0),
        }]);

        let hits = store.query_bounds(&GeoBounds::new(35.0, 45.0, -80.0, -70.0));
        let refs: Vec<EntityRef> = hits.iter().map(|r| r.entity_ref()).collect();
        assert_eq!(
            refs,
            vec![EntityRef::aircraft("in"), EntityRef::airport("KJFK")]
        );
    }

    #[test]
    fn remove_reports_presence() {
        let mut store = EntityStore::new();
        store.merge_snapshot(vec![aircraft("a", 0.0, 0.0)], &Focus::default(), 0.0);
        assert!(store.remove(&EntityRef::aircraft("a")));
        assert!(!store.remove(&EntityRef::aircraft("a")));
        assert!(store.is_empty());
    }
}
