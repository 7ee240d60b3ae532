//! One globe view: store, lifecycle, camera and polling driven tick by tick.
//!
//! Every tick runs in a fixed order:
//! 1. merge snapshots that arrived since the last tick,
//! 2. lifecycle sync and per-entity update, then the deload timer,
//! 3. held input and the camera, then the viewport timer,
//! 4. detail level and instance emission.
//!
//! Snapshots only ever touch the store; camera animation and lifecycle
//! entries change during the tick. Focus is read from the session at each
//! use, so a selection made while a fetch is pending is honored at merge time.

use camera::{
    CameraController, CameraMode, ChaseSample, InputAction, InputEvent, InputState,
    best_in_direction, nearest_within,
};
use foundation::bounds::GeoBounds;
use foundation::math::{GeoPosition, PredictionLimits, normalize_lon};
use foundation::time::Clock;
use runtime::{Event, EventBus, Frame, IntervalTimer};
use scene::entity::{EntityKind, EntityRef};
use scene::instancing::{FrameWorkspace, InstanceTransform, emit_instances};
use scene::lifecycle::LifecycleManager;
use scene::lod::{DetailLevel, LodSelector};
use scene::records::{AircraftRecord, AirportRecord, EntityRecord};
use scene::selection::Focus;
use scene::store::{EntityStore, MergeSummary};
use scene::viewport::{ViewportBounds, ViewportEngine, compute_viewport};
use scene::visibility::{CameraView, ViewProbe};
use streaming::{
    BoundsQuery, FetchError, FetchRequest, PollOutcome, RequestId, SnapshotPayload,
    SnapshotPoller,
};
use tracing::{debug, info};

use crate::config::GlobeConfig;

/// Discrete requests from the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Select(Option<EntityRef>),
    Hover(Option<EntityRef>),
    FocusLocation {
        lat: f64,
        lon: f64,
        altitude_ft: Option<f64>,
    },
    RestoreCamera,
    Input(InputEvent),
}

/// What happened during a tick, for the host to log or surface.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobeEvent {
    SnapshotApplied(MergeSummary),
    Deloaded(EntityRef),
    DetailLevelChanged(DetailLevel),
    CameraModeChanged(CameraMode),
    ViewportChanged(ViewportBounds),
    Selected(Option<EntityRef>),
}

/// What became of a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FetchDisposition {
    /// Records queued for the next tick.
    Queued { records: usize, rejected: usize },
    /// Stand-in traffic queued after a failed first load.
    Placeholder { records: usize },
    Failed { retry_in_s: f64 },
    Ignored,
}

pub struct GlobeSession<C: Clock + Clone> {
    clock: C,
    config: GlobeConfig,
    store: EntityStore,
    focus: Focus,
    lifecycle: LifecycleManager,
    lod: LodSelector,
    viewport: ViewportEngine,
    camera: CameraController,
    input: InputState,
    workspace: FrameWorkspace,
    poller: SnapshotPoller<C>,
    queued_fetch: Option<FetchRequest>,
    pending: Vec<Vec<AircraftRecord>>,
    frame: Frame,
    started: bool,
    viewport_timer: IntervalTimer,
    deload_timer: IntervalTimer,
    events: EventBus<GlobeEvent>,
    revealed: bool,
    shut_down: bool,
}

impl<C: Clock + Clone> GlobeSession<C> {
    pub fn new(clock: C, config: GlobeConfig) -> Self {
        let now = clock.now();
        let radius = config.globe.radius;
        let limits: PredictionLimits = config.prediction.into();

        let mut session = Self {
            poller: SnapshotPoller::new(clock.clone(), config.polling),
            clock,
            store: EntityStore::new(),
            focus: Focus::new(),
            lifecycle: LifecycleManager::new(config.lifecycle, limits, radius),
            lod: LodSelector::new(config.lod),
            viewport: ViewportEngine::new(config.viewport, radius),
            camera: CameraController::new(config.camera, radius),
            input: InputState::new(),
            workspace: FrameWorkspace::new(),
            queued_fetch: None,
            pending: Vec::new(),
            frame: Frame::first(now),
            started: false,
            viewport_timer: IntervalTimer::new(config.globe.viewport_interval_s, now),
            deload_timer: IntervalTimer::new(config.globe.deload_interval_s, now),
            events: EventBus::new(),
            revealed: false,
            shut_down: false,
            config,
        };

        // Seed the bounds so the first fetch is already narrowed to the view.
        let pose = session.camera.pose();
        if let Some(bounds) = session.viewport.update(pose.position, pose.forward()) {
            session.queued_fetch = session.poller.update_bounds(BoundsQuery::from_viewport(&bounds));
        }
        session
    }

    pub fn config(&self) -> &GlobeConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn focus(&self) -> &Focus {
        &self.focus
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn viewport(&self) -> Option<&ViewportBounds> {
        self.viewport.current()
    }

    pub fn detail_level(&self) -> DetailLevel {
        self.lod.level()
    }

    pub fn instances(&self) -> &[InstanceTransform] {
        self.workspace.instances()
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn drain_events(&mut self) -> Vec<Event<GlobeEvent>> {
        self.events.drain()
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        if aspect.is_finite() && aspect > 0.0 {
            self.config.globe.aspect = aspect;
        }
    }

    pub fn load_airports(&mut self, airports: Vec<AirportRecord>) -> usize {
        let skipped = self.store.load_airports(airports);
        info!(
            airports = self.store.airport_count(),
            skipped, "airport dataset loaded"
        );
        skipped
    }

    /// Next fetch the host should run, if any.
    pub fn next_fetch(&mut self) -> Option<FetchRequest> {
        if self.shut_down {
            return None;
        }
        if let Some(req) = self.queued_fetch.take() {
            // Only hand out the request that is still current.
            if self.poller.in_flight() == Some(req.id) {
                return Some(req);
            }
        }
        self.poller.poll()
    }

    /// Report a fetch result. Accepted records are merged on the next tick.
    pub fn complete_fetch(
        &mut self,
        id: RequestId,
        result: Result<SnapshotPayload, FetchError>,
    ) -> FetchDisposition {
        let store_is_empty = self.store.aircraft_count() == 0 && self.pending.is_empty();
        match self.poller.complete(id, result, store_is_empty) {
            PollOutcome::Apply { records, rejected } => {
                let n = records.len();
                self.pending.push(records);
                FetchDisposition::Queued {
                    records: n,
                    rejected,
                }
            }
            PollOutcome::Placeholder(records) => {
                let n = records.len();
                self.pending.push(records);
                FetchDisposition::Placeholder { records: n }
            }
            PollOutcome::Failed { retry_in_s } => FetchDisposition::Failed { retry_in_s },
            PollOutcome::Ignored => FetchDisposition::Ignored,
        }
    }

    /// Queue a snapshot pushed by the host outside the polling schedule.
    pub fn submit_snapshot(&mut self, payload: SnapshotPayload) -> usize {
        let (records, rejected) = payload.into_records();
        self.pending.push(records);
        rejected
    }

    pub fn submit_records(&mut self, records: Vec<AircraftRecord>) {
        self.pending.push(records);
    }

    /// Run one frame and return the instances to draw.
    pub fn tick(&mut self) -> &[InstanceTransform] {
        let now = self.clock.now();
        self.frame = if self.started {
            self.frame.next(now)
        } else {
            self.started = true;
            Frame::first(now)
        };
        let frame = self.frame;
        let dt = frame.dt_s;

        self.apply_pending(&frame);

        self.lifecycle.sync(&self.store, now);
        let probe = ViewProbe::new(
            &self.camera_view(),
            self.config.globe.radius,
            self.config.lifecycle.horizon_cutoff,
        );
        let zoom = self.zoom_level();
        self.lifecycle.update(now, dt, &probe, &self.focus, zoom);
        if self.deload_timer.poll(now) {
            self.run_deload_check(&frame);
        }

        self.input.apply_held(&mut self.camera, dt);
        let chase = self.chase_sample();
        if let Some(mode) = self.camera.update(dt, chase) {
            self.events.emit(&frame, GlobeEvent::CameraModeChanged(mode));
        }
        if self.viewport_timer.poll(now) {
            self.refresh_viewport(&frame);
        }

        if let Some(level) = self.lod.update(self.lifecycle.visible_aircraft()) {
            self.events.emit(&frame, GlobeEvent::DetailLevelChanged(level));
        }
        let zoom = self.zoom_level();
        emit_instances(
            &mut self.workspace,
            &self.lifecycle,
            &self.focus,
            self.lod.level(),
            zoom,
            now,
            &self.config.scale,
        )
    }

    fn apply_pending(&mut self, frame: &Frame) {
        for records in std::mem::take(&mut self.pending) {
            let summary =
                self.store
                    .merge_snapshot(records, &self.focus, self.config.polling.stale_after_s);
            debug!(
                inserted = summary.inserted,
                updated = summary.updated,
                unchanged = summary.unchanged,
                pruned = summary.pruned,
                rejected = summary.rejected,
                "snapshot merged"
            );
            if !self.revealed && summary.inserted > 0 {
                self.revealed = true;
                self.lifecycle.begin_reveal(frame.time);
            }
            self.events.emit(frame, GlobeEvent::SnapshotApplied(summary));
        }
    }

    fn run_deload_check(&mut self, frame: &Frame) {
        let store = &mut self.store;
        let events = &mut self.events;
        let removed = self
            .lifecycle
            .run_deload_check(frame.time, &self.focus, |entity| {
                if store.remove(entity) {
                    events.emit(frame, GlobeEvent::Deloaded(entity.clone()));
                }
            });
        if removed > 0 {
            debug!(removed, remaining = self.store.aircraft_count(), "deload pass");
        }
    }

    fn refresh_viewport(&mut self, frame: &Frame) {
        let pose = self.camera.pose();
        let Some(bounds) = self.viewport.update(pose.position, pose.forward()) else {
            return;
        };
        self.events.emit(frame, GlobeEvent::ViewportChanged(bounds));
        if !self.shut_down
            && let Some(req) = self.poller.update_bounds(BoundsQuery::from_viewport(&bounds))
        {
            self.queued_fetch = Some(req);
        }
    }

    fn camera_view(&self) -> CameraView {
        let pose = self.camera.pose();
        CameraView::new(
            pose.position,
            pose.target,
            self.config.globe.fov_y_deg.to_radians(),
            self.config.globe.aspect,
        )
    }

    fn zoom_level(&self) -> f64 {
        match self.viewport.current() {
            Some(b) => b.zoom_level,
            None => {
                let pose = self.camera.pose();
                compute_viewport(
                    pose.position,
                    pose.forward(),
                    self.config.globe.radius,
                    &self.config.viewport,
                )
                .zoom_level
            }
        }
    }

    fn chase_sample(&self) -> Option<ChaseSample> {
        let target = self.camera.chase_target()?;
        self.sample_for(target)
    }

    /// Current (predicted where available) position and heading of an entity.
    fn sample_for(&self, entity: &EntityRef) -> Option<ChaseSample> {
        if let Some(entry) = self.lifecycle.entry(entity) {
            return Some(ChaseSample {
                position: entry.position,
                heading_deg: entry.heading_deg(),
            });
        }
        match self.store.get(entity)? {
            EntityRecord::Aircraft(a) => Some(ChaseSample {
                position: a.position,
                heading_deg: a.heading_deg,
            }),
            EntityRecord::Airport(a) => Some(ChaseSample {
                position: a.position,
                heading_deg: 0.0,
            }),
        }
    }

    pub fn handle(&mut self, event: UiEvent) {
        match event {
            UiEvent::Select(Some(entity)) => self.select(entity),
            UiEvent::Select(None) => self.deselect(),
            UiEvent::RestoreCamera => self.restore_camera(),
            UiEvent::Hover(entity) => self.focus.hovered = entity,
            UiEvent::FocusLocation {
                lat,
                lon,
                altitude_ft,
            } => {
                if !lat.is_finite() || !lon.is_finite() {
                    debug!("ignoring focus request with non-finite coordinates");
                    return;
                }
                let lat = lat.clamp(-90.0, 90.0);
                let lon = normalize_lon(lon);
                if self.camera.focus_location(lat, lon, altitude_ft) {
                    self.set_selected(None);
                    self.emit_mode();
                }
            }
            UiEvent::Input(input) => {
                let dt = if self.frame.dt_s > 0.0 {
                    self.frame.dt_s
                } else {
                    1.0 / 60.0
                };
                let before = self.camera.mode();
                let action = self.input.handle(input, &mut self.camera, dt);
                if self.camera.mode() != before {
                    self.emit_mode();
                }
                if let Some(action) = action {
                    self.snap(action);
                }
            }
        }
    }

    fn set_selected(&mut self, entity: Option<EntityRef>) {
        if self.focus.selected != entity {
            self.focus.selected = entity.clone();
            let frame = self.frame;
            self.events.emit(&frame, GlobeEvent::Selected(entity));
        }
    }

    fn emit_mode(&mut self) {
        let frame = self.frame;
        self.events
            .emit(&frame, GlobeEvent::CameraModeChanged(self.camera.mode()));
    }

    fn select(&mut self, entity: EntityRef) {
        let Some(sample) = self.sample_for(&entity) else {
            debug!(%entity, "ignoring selection of unknown entity");
            return;
        };
        let before = self.camera.mode();
        match entity.kind {
            EntityKind::Aircraft => self.camera.select_aircraft(entity.clone(), sample),
            EntityKind::Airport => self.camera.select_airport(sample.position),
        }
        self.set_selected(Some(entity));
        if self.camera.mode() != before {
            self.emit_mode();
        }
    }

    /// Clearing the selection only moves the camera when it is away from
    /// free orbit or holds a pose to return to.
    fn deselect(&mut self) {
        let had_selection = self.focus.selected.is_some();
        self.set_selected(None);
        let engaged = self.camera.mode() != CameraMode::Free
            || self.camera.saved_pose().is_some()
            || self.camera.chase_target().is_some();
        if had_selection || engaged {
            self.camera.restore();
            self.emit_mode();
        }
    }

    fn restore_camera(&mut self) {
        self.set_selected(None);
        self.camera.restore();
        self.emit_mode();
    }

    fn snap(&mut self, action: InputAction) {
        let look = self.camera.look_point();
        let radius = self.config.camera.snap_radius_deg;
        let search = match action {
            InputAction::SnapNearest => radius,
            InputAction::SnapDirectional(_) => radius * 3.0,
        };
        let candidates = self.snap_candidates(look, search);
        let picked = match action {
            InputAction::SnapNearest => nearest_within(look, candidates, radius),
            InputAction::SnapDirectional(direction) => {
                let bearing = self.camera.screen_up_bearing_deg() + direction.screen_angle_deg();
                best_in_direction(look, bearing.rem_euclid(360.0), candidates, search)
            }
        };
        if let Some(entity) = picked {
            debug!(%entity, ?action, "snapped to entity");
            self.select(entity);
        }
    }

    /// Visible entities near `look`, found through the store's grid.
    fn snap_candidates(&self, look: GeoPosition, radius_deg: f64) -> Vec<(EntityRef, GeoPosition)> {
        // Longitude degrees shrink toward the poles; widen the box to match.
        let cos_lat = look.lat.to_radians().cos().max(0.05);
        let lon_half = (radius_deg / cos_lat).min(180.0);
        let bounds = GeoBounds::new(
            (look.lat - radius_deg).max(-90.0),
            (look.lat + radius_deg).min(90.0),
            look.lon - lon_half,
            look.lon + lon_half,
        );
        self.store
            .query_bounds(&bounds)
            .into_iter()
            .filter_map(|record| {
                let entity = record.entity_ref();
                let entry = self.lifecycle.entry(&entity)?;
                entry.in_view.then(|| (entity, entry.position))
            })
            .collect()
    }

    /// Stop timers and polling. Ticks still render, but nothing is fetched.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.viewport_timer.cancel();
        self.deload_timer.cancel();
        self.poller.cancel();
        self.queued_fetch = None;
        self.input.clear();
        info!("globe session shut down");
    }
}
