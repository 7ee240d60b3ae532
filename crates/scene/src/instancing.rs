//! Per-frame instance transforms handed to the renderer.

use foundation::math::{SurfaceFrame, surface_orientation_into};
use foundation::time::Time;
use serde::Deserialize;

use crate::entity::EntityRef;
use crate::lifecycle::LifecycleManager;
use crate::lod::DetailLevel;
use crate::records::{AirportClass, EntityRecord};
use crate::selection::Focus;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InstanceShape {
    AircraftDetailed,
    AircraftSimple,
    AirportMarker(AirportClass),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ColorState {
    Normal,
    OnGround,
    Hovered,
    Selected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceTransform {
    pub entity: EntityRef,
    pub position: [f32; 3],
    /// Columns `[right, up, forward]`.
    pub rotation: [[f32; 3]; 3],
    pub scale: f32,
    pub opacity: f32,
    pub shape: InstanceShape,
    pub color: ColorState,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    pub aircraft: f64,
    pub airport: f64,
    /// Multiplier at zoom level 0 (far).
    pub far_multiplier: f64,
    /// Multiplier at zoom level 1 (near).
    pub near_multiplier: f64,
    pub pulse_amplitude: f64,
    pub pulse_hz: f64,
    /// Instances fainter than this are not emitted.
    pub min_opacity: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            aircraft: 0.012,
            airport: 0.006,
            far_multiplier: 1.0,
            near_multiplier: 0.35,
            pulse_amplitude: 0.25,
            pulse_hz: 1.5,
            min_opacity: 1e-3,
        }
    }
}

impl ScaleConfig {
    pub fn zoom_multiplier(&self, zoom_level: f64) -> f64 {
        let t = zoom_level.clamp(0.0, 1.0);
        self.far_multiplier + (self.near_multiplier - self.far_multiplier) * t
    }

    pub fn pulse(&self, now: Time) -> f64 {
        let phase = std::f64::consts::TAU * self.pulse_hz * now.0;
        1.0 + self.pulse_amplitude * (0.5 + 0.5 * phase.sin())
    }
}

/// Scratch state reused across frames so emission does not allocate once
/// the output buffer has grown to the working-set size.
#[derive(Debug, Default)]
pub struct FrameWorkspace {
    frame: SurfaceFrame,
    instances: Vec<InstanceTransform>,
}

impl FrameWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instances(&self) -> &[InstanceTransform] {
        &self.instances
    }
}

/// Fill `ws` with this frame's instances, in entity order.
pub fn emit_instances<'a>(
    ws: &'a mut FrameWorkspace,
    lifecycle: &LifecycleManager,
    focus: &Focus,
    level: DetailLevel,
    zoom_level: f64,
    now: Time,
    scale: &ScaleConfig,
) -> &'a [InstanceTransform] {
    ws.instances.clear();
    let zoom_mult = scale.zoom_multiplier(zoom_level);
    let pulse = scale.pulse(now);

    for entry in lifecycle.entries() {
        let focused = focus.is_focused(&entry.entity);
        if entry.opacity < scale.min_opacity && !focused {
            continue;
        }

        surface_orientation_into(
            &mut ws.frame,
            entry.position.lat,
            entry.position.lon,
            entry.heading_deg(),
        );

        let (shape, base, color) = match &entry.record {
            EntityRecord::Aircraft(a) => {
                let shape = match level {
                    DetailLevel::Detailed => InstanceShape::AircraftDetailed,
                    DetailLevel::Simple => InstanceShape::AircraftSimple,
                };
                let color = if a.on_ground {
                    ColorState::OnGround
                } else {
                    ColorState::Normal
                };
                (shape, scale.aircraft, color)
            }
            EntityRecord::Airport(a) => (
                InstanceShape::AirportMarker(a.class),
                scale.airport,
                ColorState::Normal,
            ),
        };
        let color = if focus.is_selected(&entry.entity) {
            ColorState::Selected
        } else if focus.is_hovered(&entry.entity) {
            ColorState::Hovered
        } else {
            color
        };

        let mut s = base * zoom_mult;
        if focused {
            s *= pulse;
        }
        let opacity = if focused { 1.0 } else { entry.opacity };

        ws.instances.push(InstanceTransform {
            entity: entry.entity.clone(),
            position: entry.point.to_f32(),
            rotation: ws.frame.rotation_columns(),
            scale: s as f32,
            opacity: opacity.clamp(0.0, 1.0) as f32,
            shape,
            color,
        });
    }
    &ws.instances
}
