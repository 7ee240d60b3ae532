//! Camera state machine: free orbit, direct and flyover transits, chase.
//!
//! - Free: pointer orbit with inertia, smoothed wheel zoom, key pan/zoom.
//! - DirectTransit / FlyoverTransit: timed animation, then back to Free.
//! - Chase: animate behind the selected aircraft, then follow its predicted
//!   position with a preserved user offset. Inertia is off while chasing.
//!
//! A new trigger always replaces the animation in flight.

use foundation::math::{
    GeoPosition, Vec3, altitude_radius, angular_distance_deg, from_surface_point, normalize_lon,
    quantize, stable_up, surface_orientation, to_surface_point,
};
use scene::entity::EntityRef;
use scene::viewport::ray_sphere_intersection;
use serde::Deserialize;
use tracing::debug;

use crate::pose::CameraPose;
use crate::transition::Transition;

/// Camera tunables. Distances are in globe radii.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub min_distance: f64,
    pub max_distance: f64,
    pub default_distance: f64,
    /// Distance for focus requests without an explicit altitude.
    pub location_distance: f64,
    pub airport_distance: f64,
    pub transit_duration_s: f64,
    pub flyover_duration_s: f64,
    /// Travel beyond this angle uses a flyover (except for the first focus).
    pub flyover_threshold_deg: f64,
    /// Flyover midpoint radius as a multiple of the larger endpoint distance.
    pub flyover_pullback: f64,
    pub chase_distance: f64,
    pub chase_height: f64,
    /// Look-ahead along the aircraft's heading.
    pub chase_lead: f64,
    pub chase_transition_s: f64,
    /// Rounding used to detect repeated focus requests.
    pub focus_dedupe_deg: f64,
    /// Angular velocity decay per second.
    pub angular_damping: f64,
    /// Inertia stops below this angular speed (rad/s).
    pub inertia_threshold: f64,
    pub zoom_smoothing: f64,
    pub wheel_sensitivity: f64,
    /// Held-key zoom rate (fraction of altitude per second, log scale).
    pub key_zoom_rate: f64,
    /// Held-key pan rate at the farthest zoom (deg/s).
    pub pan_rate_deg: f64,
    pub rotate_deg_per_px_near: f64,
    pub rotate_deg_per_px_far: f64,
    pub snap_radius_deg: f64,
    /// Start location when no better one is known.
    pub initial_lat: f64,
    pub initial_lon: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_distance: 1.02,
            max_distance: 8.0,
            default_distance: 3.0,
            location_distance: 1.6,
            airport_distance: 1.25,
            transit_duration_s: 1.5,
            flyover_duration_s: 3.5,
            flyover_threshold_deg: 30.0,
            flyover_pullback: 1.6,
            chase_distance: 0.05,
            chase_height: 0.015,
            chase_lead: 0.02,
            chase_transition_s: 1.5,
            focus_dedupe_deg: 0.001,
            angular_damping: 4.0,
            inertia_threshold: 0.01,
            zoom_smoothing: 8.0,
            wheel_sensitivity: 0.002,
            key_zoom_rate: 1.2,
            pan_rate_deg: 45.0,
            rotate_deg_per_px_near: 0.01,
            rotate_deg_per_px_far: 0.25,
            snap_radius_deg: 15.0,
            initial_lat: 39.8,
            initial_lon: -98.6,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CameraMode {
    Free,
    DirectTransit,
    FlyoverTransit,
    Chase,
}

/// Predicted state of the chased aircraft for this frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ChaseSample {
    pub position: GeoPosition,
    pub heading_deg: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct ChaseState {
    entity: EntityRef,
    /// Camera minus aircraft point, captured when the entry animation ends.
    offset: Option<Vec3>,
}

#[derive(Debug, Clone)]
pub struct CameraController {
    config: CameraConfig,
    globe_radius: f64,
    pose: CameraPose,
    mode: CameraMode,
    transition: Option<Transition>,
    chase: Option<ChaseState>,
    saved_pose: Option<CameraPose>,
    last_focus: Option<((i64, i64), CameraPose)>,
    focus_count: u32,
    /// Axis times angular speed (rad/s).
    angular_velocity: Vec3,
    target_distance: f64,
    dragging: bool,
}

impl CameraController {
    pub fn new(config: CameraConfig, globe_radius: f64) -> Self {
        Self::at_location(config, globe_radius, config.initial_lat, config.initial_lon)
    }

    /// Start in free mode above `(lat, lon)` at the default distance.
    pub fn at_location(config: CameraConfig, globe_radius: f64, lat: f64, lon: f64) -> Self {
        let distance = config.default_distance * globe_radius;
        Self {
            config,
            globe_radius,
            pose: CameraPose::above(lat, lon, distance),
            mode: CameraMode::Free,
            transition: None,
            chase: None,
            saved_pose: None,
            last_focus: None,
            focus_count: 0,
            angular_velocity: Vec3::ZERO,
            target_distance: distance,
            dragging: false,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    pub fn saved_pose(&self) -> Option<CameraPose> {
        self.saved_pose
    }

    pub fn chase_target(&self) -> Option<&EntityRef> {
        self.chase.as_ref().map(|c| &c.entity)
    }

    pub fn chase_offset(&self) -> Option<Vec3> {
        self.chase.as_ref().and_then(|c| c.offset)
    }

    /// Rotational damping (inertia) is disabled while chasing.
    pub fn damping_enabled(&self) -> bool {
        self.mode != CameraMode::Chase
    }

    pub fn is_inertia_active(&self) -> bool {
        self.angular_velocity.length() > 0.0
    }

    fn radii(&self, r: f64) -> f64 {
        r * self.globe_radius
    }

    /// Where the camera is looking on the globe (or the point under it).
    pub fn look_point(&self) -> GeoPosition {
        let hit = ray_sphere_intersection(self.pose.position, self.pose.forward(), self.globe_radius)
            .unwrap_or(self.pose.position);
        let p = from_surface_point(hit, self.globe_radius);
        GeoPosition::new(p.lat, p.lon, 0.0)
    }

    /// Screen-up direction at the look point, as a geographic bearing.
    pub fn screen_up_bearing_deg(&self) -> f64 {
        let look = self.look_point();
        let frame = surface_orientation(look.lat, look.lon, 0.0);
        let (north, east) = (frame.forward, frame.right);
        let (_, cam_up) = self.camera_axes();
        let x = cam_up.dot(east);
        let y = cam_up.dot(north);
        if x.abs() < 1e-12 && y.abs() < 1e-12 {
            return 0.0;
        }
        x.atan2(y).to_degrees().rem_euclid(360.0)
    }

    /// Camera `(right, up)` in world space.
    fn camera_axes(&self) -> (Vec3, Vec3) {
        let f = self.pose.forward();
        let right = f.cross(stable_up(f)).normalize_or_zero();
        let up = right.cross(f).normalize_or_zero();
        (right, up)
    }

    fn set_mode(&mut self, mode: CameraMode) {
        if self.mode != mode {
            debug!("camera mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }

    fn begin(&mut self, transition: Transition, mode: CameraMode) {
        self.angular_velocity = Vec3::ZERO;
        self.dragging = false;
        self.transition = Some(transition);
        self.set_mode(mode);
    }

    fn chase_pose(&self, sample: &ChaseSample, offset: Option<Vec3>) -> CameraPose {
        let p = sample.position;
        let point = to_surface_point(p.lat, p.lon, p.altitude_ft, self.globe_radius);
        let frame = surface_orientation(p.lat, p.lon, sample.heading_deg);
        let target = point + frame.forward * self.radii(self.config.chase_lead);
        let position = match offset {
            Some(offset) => point + offset,
            None => {
                point - frame.forward * self.radii(self.config.chase_distance)
                    + frame.up * self.radii(self.config.chase_height)
            }
        };
        CameraPose::new(position, target)
    }

    fn save_pose_once(&mut self) {
        if self.saved_pose.is_none() {
            self.saved_pose = Some(self.pose);
        }
    }

    /// Start chasing `entity`. The pre-selection pose is saved on first entry.
    /// Switching to a different aircraft re-captures the offset.
    pub fn select_aircraft(&mut self, entity: EntityRef, sample: ChaseSample) {
        self.save_pose_once();
        let same = self.chase.as_ref().is_some_and(|c| c.entity == entity);
        if same && self.mode == CameraMode::Chase {
            return;
        }
        self.chase = Some(ChaseState {
            entity,
            offset: None,
        });
        let end = self.chase_pose(&sample, None);
        let t = Transition::direct(self.pose, end, self.config.chase_transition_s);
        self.begin(t, CameraMode::Chase);
    }

    /// Fly to an airport, ending up looking at the globe center.
    pub fn select_airport(&mut self, position: GeoPosition) {
        self.save_pose_once();
        self.chase = None;
        let end = CameraPose::above(
            position.lat,
            position.lon,
            self.radii(self.config.airport_distance),
        );
        let t = Transition::direct(self.pose, end, self.config.transit_duration_s);
        self.begin(t, CameraMode::DirectTransit);
    }

    /// Return to the pose saved before selection, or to the default distance
    /// along the current view direction.
    pub fn restore(&mut self) {
        self.chase = None;
        let end = match self.saved_pose.take() {
            Some(pose) => pose,
            None => {
                let look = self.look_point();
                CameraPose::above(look.lat, look.lon, self.radii(self.config.default_distance))
            }
        };
        let t = Transition::direct(self.pose, end, self.config.transit_duration_s);
        self.begin(t, CameraMode::DirectTransit);
    }

    /// Fly to a location. Returns `false` when the request repeats the
    /// current focus target.
    ///
    /// Ends any chase and forgets the saved pre-selection pose.
    pub fn focus_location(&mut self, lat: f64, lon: f64, altitude_ft: Option<f64>) -> bool {
        let step = self.config.focus_dedupe_deg;
        let key = (quantize(lat, step), quantize(normalize_lon(lon), step));
        if let Some((last_key, last_end)) = &self.last_focus
            && *last_key == key
        {
            let in_flight = self.transition.is_some() && self.mode != CameraMode::Chase;
            let settled = self.pose.position.distance(last_end.position) <= self.globe_radius * 1e-6;
            if in_flight || settled {
                debug!(lat, lon, "focus request unchanged; ignoring");
                return false;
            }
        }

        let distance = match altitude_ft {
            Some(alt) if alt.is_finite() && alt > 0.0 => altitude_radius(alt, self.globe_radius),
            _ => self.radii(self.config.location_distance),
        }
        .clamp(
            self.radii(self.config.min_distance),
            self.radii(self.config.max_distance),
        );
        let end = CameraPose::above(lat, lon, distance);

        let here = self.pose.subpoint(self.globe_radius);
        let travel_deg = angular_distance_deg(here.lat, here.lon, lat, lon);

        self.chase = None;
        self.saved_pose = None;

        if self.focus_count > 0 && travel_deg > self.config.flyover_threshold_deg {
            let radius = (self.pose.distance().max(distance) * self.config.flyover_pullback)
                .min(self.radii(self.config.max_distance));
            let t = Transition::flyover(self.pose, end, radius, self.config.flyover_duration_s);
            self.begin(t, CameraMode::FlyoverTransit);
        } else {
            let t = Transition::direct(self.pose, end, self.config.transit_duration_s);
            self.begin(t, CameraMode::DirectTransit);
        }
        self.focus_count += 1;
        self.last_focus = Some((key, end));
        true
    }

    /// Advance one frame. `chase` is the chased aircraft's predicted state,
    /// `None` when not chasing or when the aircraft is gone.
    ///
    /// Returns the new mode if it changed.
    pub fn update(&mut self, dt_s: f64, chase: Option<ChaseSample>) -> Option<CameraMode> {
        let dt = if dt_s.is_finite() { dt_s.max(0.0) } else { 0.0 };
        let before = self.mode;

        if let Some(mut t) = self.transition.take() {
            if self.mode == CameraMode::Chase
                && let Some(sample) = &chase
            {
                t.retarget(self.chase_pose(sample, None));
            }
            t.advance(dt);
            self.pose = t.sample();
            if t.is_done() {
                self.finish_transition(chase.as_ref());
            } else {
                self.transition = Some(t);
            }
        } else if self.mode == CameraMode::Chase {
            if let Some(sample) = &chase {
                let offset = self.chase_offset();
                self.pose = self.chase_pose(sample, offset);
                if offset.is_none() {
                    self.capture_chase_offset(sample);
                }
            }
        } else {
            self.step_free(dt);
        }

        (self.mode != before).then_some(self.mode)
    }

    fn finish_transition(&mut self, chase: Option<&ChaseSample>) {
        if self.mode == CameraMode::Chase {
            if let Some(sample) = chase {
                self.capture_chase_offset(sample);
            }
            return;
        }
        self.target_distance = self.pose.distance();
        self.set_mode(CameraMode::Free);
    }

    fn capture_chase_offset(&mut self, sample: &ChaseSample) {
        let p = sample.position;
        let point = to_surface_point(p.lat, p.lon, p.altitude_ft, self.globe_radius);
        let offset = self.pose.position - point;
        if let Some(state) = self.chase.as_mut()
            && state.offset.is_none()
        {
            state.offset = Some(offset);
        }
    }

    fn step_free(&mut self, dt: f64) {
        let speed = self.angular_velocity.length();
        if speed > 0.0 && !self.dragging {
            let axis = self.angular_velocity * (1.0 / speed);
            self.rotate_about_center(axis, speed * dt);
            let decay = (-self.config.angular_damping * dt).exp();
            self.angular_velocity = self.angular_velocity * decay;
            if self.angular_velocity.length() < self.config.inertia_threshold {
                self.angular_velocity = Vec3::ZERO;
            }
        }

        let d = self.pose.distance();
        let alpha = 1.0 - (-self.config.zoom_smoothing * dt).exp();
        let next = (d + (self.target_distance - d) * alpha).clamp(
            self.radii(self.config.min_distance),
            self.radii(self.config.max_distance),
        );
        if (next - d).abs() > 0.0 {
            self.pose = self.pose.at_distance(next);
        }
    }

    fn rotate_about_center(&mut self, axis: Vec3, angle_rad: f64) {
        self.pose = CameraPose::new(
            self.pose.position.rotate_around(axis, angle_rad),
            self.pose.target.rotate_around(axis, angle_rad),
        );
    }

    /// Interrupt a non-chase animation so input can take over.
    fn interrupt_transit(&mut self) {
        if self.transition.is_some() && self.mode != CameraMode::Chase {
            self.transition = None;
            self.target_distance = self.pose.distance();
            self.set_mode(CameraMode::Free);
        }
    }

    /// Degrees of rotation per pointer pixel: slow near the surface, fast far out.
    pub fn rotate_deg_per_px(&self) -> f64 {
        let min = self.radii(self.config.min_distance);
        let max = self.radii(self.config.max_distance);
        let t = ((self.pose.distance() - min) / (max - min).max(1e-12)).clamp(0.0, 1.0);
        self.config.rotate_deg_per_px_near
            + (self.config.rotate_deg_per_px_far - self.config.rotate_deg_per_px_near) * t
    }

    pub fn begin_drag(&mut self) {
        self.angular_velocity = Vec3::ZERO;
        self.dragging = true;
    }

    /// Pointer drag by `(dx, dy)` pixels over `dt_s`.
    ///
    /// Orbits the globe in free mode; rotates the preserved offset while
    /// chasing.
    pub fn drag(&mut self, dx_px: f64, dy_px: f64, dt_s: f64) {
        let deg_per_px = self.rotate_deg_per_px();
        let yaw = -(dx_px * deg_per_px).to_radians();
        let pitch = -(dy_px * deg_per_px).to_radians();

        if self.mode == CameraMode::Chase {
            self.orbit_chase(yaw, pitch);
            return;
        }
        self.interrupt_transit();
        self.dragging = true;

        let before = self.pose.position;
        let (right, _) = self.camera_axes();
        self.rotate_about_center(Vec3::Y, yaw);
        let after_yaw = self.pose;
        self.rotate_about_center(right, pitch);
        // Stay off the poles so the view basis stays defined.
        let lat = self.pose.subpoint(self.globe_radius).lat;
        if lat.abs() > 89.0 {
            self.pose = after_yaw;
        }

        if dt_s > 0.0 {
            let after = self.pose.position;
            let axis = before.cross(after);
            let cos = (before.dot(after) / (before.length() * after.length()).max(1e-12)).clamp(-1.0, 1.0);
            self.angular_velocity = match axis.try_normalize() {
                Some(axis) => axis * (cos.acos() / dt_s),
                None => Vec3::ZERO,
            };
        }
    }

    /// Release the pointer; keeps spinning if the last drag was fast enough.
    pub fn end_drag(&mut self) {
        self.dragging = false;
        if self.mode != CameraMode::Free
            || self.angular_velocity.length() < self.config.inertia_threshold
        {
            self.angular_velocity = Vec3::ZERO;
        }
    }

    fn orbit_chase(&mut self, yaw: f64, pitch: f64) {
        let Some(state) = self.chase.as_mut() else {
            return;
        };
        let Some(offset) = state.offset else {
            return;
        };
        let up = self.pose.target.normalize_or_zero();
        let mut next = offset.rotate_around(up, yaw);
        if let Some(side) = next.cross(up).try_normalize() {
            let pitched = next.rotate_around(side, pitch);
            // Keep the camera above the aircraft's horizon.
            if pitched.normalize_or_zero().dot(up) > 0.05 {
                next = pitched;
            }
        }
        state.offset = Some(next);
    }

    /// Wheel zoom: positive `delta` zooms out.
    pub fn wheel(&mut self, delta: f64) {
        let factor = (delta * self.config.wheel_sensitivity).exp();
        if self.mode == CameraMode::Chase {
            self.scale_chase_offset(factor);
            return;
        }
        self.interrupt_transit();
        self.angular_velocity = Vec3::ZERO;
        let r = self.globe_radius;
        let altitude = (self.target_distance - r).max(0.0) * factor;
        self.target_distance = (r + altitude).clamp(
            self.radii(self.config.min_distance),
            self.radii(self.config.max_distance),
        );
    }

    fn scale_chase_offset(&mut self, factor: f64) -> bool {
        let min = self.radii(self.config.chase_distance) * 0.2;
        let max = self.radii(self.config.chase_distance) * 20.0;
        let Some(state) = self.chase.as_mut() else {
            return false;
        };
        let Some(offset) = state.offset else {
            return false;
        };
        let len = offset.length();
        let next = (len * factor).clamp(min, max);
        if (next - len).abs() <= f64::EPSILON * max {
            return false;
        }
        state.offset = Some(offset * (next / len.max(1e-12)));
        true
    }

    /// Held-key zoom. `direction > 0` zooms in. Returns `false` (and changes
    /// nothing) when already at the limit in that direction.
    pub fn zoom_step(&mut self, direction: f64, dt_s: f64) -> bool {
        if direction == 0.0 || dt_s <= 0.0 {
            return false;
        }
        let factor = (-direction.signum() * self.config.key_zoom_rate * dt_s).exp();
        if self.mode == CameraMode::Chase {
            return self.scale_chase_offset(factor);
        }
        if self.transition.is_some() {
            return false;
        }

        let min = self.radii(self.config.min_distance);
        let max = self.radii(self.config.max_distance);
        let d = self.pose.distance();
        let at_limit = if direction > 0.0 { d <= min } else { d >= max };
        if at_limit {
            return false;
        }

        let r = self.globe_radius;
        let next = (r + (d - r).max(0.0) * factor).clamp(min, max);
        self.pose = self.pose.at_distance(next);
        self.target_distance = next;
        true
    }

    /// Held-arrow pan in screen space, keeping the distance to the center.
    /// `dx > 0` moves the view right, `dy > 0` moves it up.
    pub fn pan(&mut self, dx: f64, dy: f64, dt_s: f64) {
        if (dx == 0.0 && dy == 0.0) || dt_s <= 0.0 || self.mode == CameraMode::Chase {
            return;
        }
        self.interrupt_transit();
        self.angular_velocity = Vec3::ZERO;

        let r = self.globe_radius;
        let max_alt = self.radii(self.config.max_distance) - r;
        let alt_t = ((self.pose.distance() - r) / max_alt.max(1e-12)).clamp(0.05, 1.0);
        let angle = (self.config.pan_rate_deg * alt_t * dt_s).to_radians();

        let (right, up) = self.camera_axes();
        let before = self.pose;
        if dx != 0.0 {
            self.rotate_about_center(up, angle * dx.signum());
        }
        if dy != 0.0 {
            self.rotate_about_center(right, -angle * dy.signum());
        }
        if self.pose.subpoint(self.globe_radius).lat.abs() > 89.0 {
            self.pose = before;
        }
    }
}
