use std::collections::{BTreeSet, HashMap};

use foundation::bounds::GeoBounds;

use crate::entity::EntityRef;

/// Fixed-degree lat/lon bucket index.
///
/// Lets viewport-bounded queries touch only the cells overlapping the bounds
/// instead of every entity in the store.
///
/// Ordering contract:
/// - `query` returns entities in ascending `EntityRef` order.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_deg: f64,
    lat_cells: i32,
    lon_cells: i32,
    cells: HashMap<(i32, i32), BTreeSet<EntityRef>>,
}

impl SpatialGrid {
    pub fn new(cell_deg: f64) -> Self {
        let cell_deg = cell_deg.clamp(0.5, 90.0);
        Self {
            cell_deg,
            lat_cells: (180.0 / cell_deg).ceil() as i32,
            lon_cells: (360.0 / cell_deg).ceil() as i32,
            cells: HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    fn cell_of(&self, lat: f64, lon: f64) -> (i32, i32) {
        let lat_idx = (((lat + 90.0) / self.cell_deg).floor() as i32).clamp(0, self.lat_cells - 1);
        let lon_idx = (((lon + 180.0) / self.cell_deg).floor() as i32).rem_euclid(self.lon_cells);
        (lat_idx, lon_idx)
    }

    pub fn insert(&mut self, entity: EntityRef, lat: f64, lon: f64) {
        let cell = self.cell_of(lat, lon);
        self.cells.entry(cell).or_default().insert(entity);
    }

    pub fn remove(&mut self, entity: &EntityRef, lat: f64, lon: f64) {
        let cell = self.cell_of(lat, lon);
        if let Some(set) = self.cells.get_mut(&cell) {
            set.remove(entity);
            if set.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Move an entity between cells when its position changed.
    pub fn relocate(&mut self, entity: &EntityRef, from: (f64, f64), to: (f64, f64)) {
        let old = self.cell_of(from.0, from.1);
        let new = self.cell_of(to.0, to.1);
        if old == new {
            return;
        }
        self.remove(entity, from.0, from.1);
        self.insert(entity.clone(), to.0, to.1);
    }

    /// Entities in cells overlapping `bounds`.
    ///
    /// This is a cell-level superset; callers filter exact positions.
    pub fn query(&self, bounds: &GeoBounds) -> BTreeSet<EntityRef> {
        let mut out = BTreeSet::new();
        for piece in bounds.split_at_antimeridian() {
            let (lat0, lon0) = self.cell_of(piece.min_lat, piece.min_lon);
            let (lat1, _) = self.cell_of(piece.max_lat, piece.min_lon);
            let lon_steps = ((piece.max_lon - piece.min_lon) / self.cell_deg).ceil() as i32 + 1;
            let lon_steps = lon_steps.min(self.lon_cells);

            for lat_idx in lat0..=lat1 {
                for step in 0..lon_steps {
                    let lon_idx = (lon0 + step).rem_euclid(self.lon_cells);
                    if let Some(set) = self.cells.get(&(lat_idx, lon_idx)) {
                        out.extend(set.iter().cloned());
                    }
                }
            }
        }
        out
    }
}
