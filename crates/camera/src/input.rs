//! Keyboard and pointer input mapped onto camera operations.

use std::collections::BTreeSet;

use crate::controller::CameraController;
use crate::snap::SnapDirection;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    ZoomIn,
    ZoomOut,
    Left,
    Right,
    Up,
    Down,
    /// Held with an arrow to jump to the next entity in that direction.
    Modifier,
}

impl Key {
    fn arrow(self) -> Option<SnapDirection> {
        match self {
            Key::Left => Some(SnapDirection::Left),
            Key::Right => Some(SnapDirection::Right),
            Key::Up => Some(SnapDirection::Up),
            Key::Down => Some(SnapDirection::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    /// Positive zooms out.
    Wheel(f64),
}

/// Selection requests produced by keyboard navigation. The host resolves
/// them against the current entities.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InputAction {
    SnapNearest,
    SnapDirectional(SnapDirection),
}

#[derive(Debug, Default, Clone)]
pub struct InputState {
    held: BTreeSet<Key>,
    pointer: Option<(f64, f64)>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    fn arrows_held(&self) -> bool {
        self.held.iter().any(|k| k.arrow().is_some())
    }

    /// Feed one event. `dt_s` is the frame time, used to turn pointer
    /// motion into an angular velocity.
    pub fn handle(
        &mut self,
        event: InputEvent,
        camera: &mut CameraController,
        dt_s: f64,
    ) -> Option<InputAction> {
        match event {
            InputEvent::KeyDown(key) => {
                let fresh = self.held.insert(key);
                if fresh
                    && self.is_held(Key::Modifier)
                    && let Some(direction) = key.arrow()
                {
                    return Some(InputAction::SnapDirectional(direction));
                }
                None
            }
            InputEvent::KeyUp(key) => {
                let was_held = self.held.remove(&key);
                // Releasing the last pan arrow snaps to whatever is near the view center.
                if was_held
                    && key.arrow().is_some()
                    && !self.is_held(Key::Modifier)
                    && !self.arrows_held()
                {
                    return Some(InputAction::SnapNearest);
                }
                None
            }
            InputEvent::PointerDown { x, y } => {
                self.pointer = Some((x, y));
                camera.begin_drag();
                None
            }
            InputEvent::PointerMove { x, y } => {
                if let Some((px, py)) = self.pointer {
                    camera.drag(x - px, y - py, dt_s);
                    self.pointer = Some((x, y));
                }
                None
            }
            InputEvent::PointerUp => {
                if self.pointer.take().is_some() {
                    camera.end_drag();
                }
                None
            }
            InputEvent::Wheel(delta) => {
                camera.wheel(delta);
                None
            }
        }
    }

    /// Apply held keys for one frame: zoom, and pan unless the modifier is held.
    pub fn apply_held(&self, camera: &mut CameraController, dt_s: f64) {
        let zoom = axis(self.is_held(Key::ZoomIn), self.is_held(Key::ZoomOut));
        if zoom != 0.0 {
            camera.zoom_step(zoom, dt_s);
        }
        if self.is_held(Key::Modifier) {
            return;
        }
        let dx = axis(self.is_held(Key::Right), self.is_held(Key::Left));
        let dy = axis(self.is_held(Key::Up), self.is_held(Key::Down));
        camera.pan(dx, dy, dt_s);
    }

    pub fn clear(&mut self) {
        self.held.clear();
        self.pointer = None;
    }
}

fn axis(positive: bool, negative: bool) -> f64 {
    match (positive, negative) {
        (true, false) => 1.0,
        (false, true) => -1.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{CameraConfig, CameraMode};
    use pretty_assertions::assert_eq;

    fn camera() -> CameraController {
        CameraController::at_location(CameraConfig::default(), 1.0, 40.0, -74.0)
    }

    #[test]
    fn arrow_release_snaps_to_nearest() {
        let mut cam = camera();
        let mut input = InputState::new();
        assert_eq!(input.handle(InputEvent::KeyDown(Key::Left), &mut cam, 0.016), None);
        assert_eq!(input.handle(InputEvent::KeyDown(Key::Up), &mut cam, 0.016), None);
        assert_eq!(input.handle(InputEvent::KeyUp(Key::Left), &mut cam, 0.016), None);
        assert_eq!(
            input.handle(InputEvent::KeyUp(Key::Up), &mut cam, 0.016),
            Some(InputAction::SnapNearest)
        );
    }

    #[test]
    fn modifier_arrow_requests_directional_snap_without_panning() {
        let mut cam = camera();
        let mut input = InputState::new();
        input.handle(InputEvent::KeyDown(Key::Modifier), &mut cam, 0.016);
        assert_eq!(
            input.handle(InputEvent::KeyDown(Key::Right), &mut cam, 0.016),
            Some(InputAction::SnapDirectional(SnapDirection::Right))
        );
        // Key repeat does not re-trigger.
        assert_eq!(input.handle(InputEvent::KeyDown(Key::Right), &mut cam, 0.016), None);

        let before = cam.pose();
        input.apply_held(&mut cam, 0.1);
        assert_eq!(cam.pose(), before);

        assert_eq!(input.handle(InputEvent::KeyUp(Key::Right), &mut cam, 0.016), None);
    }

    #[test]
    fn held_keys_pan_and_zoom() {
        let mut cam = camera();
        let mut input = InputState::new();
        let d = cam.pose().distance();
        input.handle(InputEvent::KeyDown(Key::ZoomIn), &mut cam, 0.016);
        input.apply_held(&mut cam, 0.1);
        assert!(cam.pose().distance() < d);

        input.handle(InputEvent::KeyUp(Key::ZoomIn), &mut cam, 0.016);
        input.handle(InputEvent::KeyDown(Key::Right), &mut cam, 0.016);
        let lon = cam.look_point().lon;
        input.apply_held(&mut cam, 0.1);
        assert!(cam.look_point().lon > lon);
    }

    #[test]
    fn pointer_drag_orbits_and_releases() {
        let mut cam = camera();
        let mut input = InputState::new();
        let start = cam.pose().position;
        input.handle(InputEvent::PointerDown { x: 100.0, y: 100.0 }, &mut cam, 0.016);
        input.handle(InputEvent::PointerMove { x: 140.0, y: 100.0 }, &mut cam, 0.016);
        assert!(cam.pose().position.distance(start) > 0.0);
        input.handle(InputEvent::PointerUp, &mut cam, 0.016);
        assert_eq!(cam.mode(), CameraMode::Free);
        assert!(cam.is_inertia_active());
    }
}
