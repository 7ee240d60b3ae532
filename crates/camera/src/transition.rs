//! Timed camera animations between two poses.

use foundation::math::Vec3;

use crate::easing::{ease_in_out_cubic, ease_in_out_quad};
use crate::pose::CameraPose;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TransitionPath {
    /// Arc along the sphere with cubic easing.
    Direct,
    /// Quadratic Bézier through a pulled-back midpoint.
    Flyover { control: Vec3, midpoint: Vec3 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub start: CameraPose,
    pub end: CameraPose,
    pub path: TransitionPath,
    duration_s: f64,
    elapsed_s: f64,
}

impl Transition {
    pub fn direct(start: CameraPose, end: CameraPose, duration_s: f64) -> Self {
        Self {
            start,
            end,
            path: TransitionPath::Direct,
            duration_s,
            elapsed_s: 0.0,
        }
    }

    /// Flyover whose camera path passes through the start/end bisector at
    /// `midpoint_radius` halfway through.
    pub fn flyover(start: CameraPose, end: CameraPose, midpoint_radius: f64, duration_s: f64) -> Self {
        let a = start.position.normalize_or_zero();
        let b = end.position.normalize_or_zero();
        let bisector = (a + b)
            .try_normalize()
            .unwrap_or_else(|| a.any_orthogonal());
        let midpoint = bisector * midpoint_radius;
        // B(0.5) = 0.25 P0 + 0.5 C + 0.25 P2 = midpoint
        let control = midpoint * 2.0 - (start.position + end.position) * 0.5;
        Self {
            start,
            end,
            path: TransitionPath::Flyover { control, midpoint },
            duration_s,
            elapsed_s: 0.0,
        }
    }

    pub fn is_flyover(&self) -> bool {
        matches!(self.path, TransitionPath::Flyover { .. })
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.duration_s <= 0.0 {
            return 1.0;
        }
        (self.elapsed_s / self.duration_s).clamp(0.0, 1.0)
    }

    pub fn is_done(&self) -> bool {
        self.progress() >= 1.0
    }

    pub fn advance(&mut self, dt_s: f64) {
        if dt_s.is_finite() && dt_s > 0.0 {
            self.elapsed_s += dt_s;
        }
    }

    /// Move the destination while keeping progress (used to land on a moving
    /// target).
    pub fn retarget(&mut self, end: CameraPose) {
        self.end = end;
    }

    pub fn sample(&self) -> CameraPose {
        let t = self.progress();
        match self.path {
            TransitionPath::Direct => self.start.interpolate(&self.end, ease_in_out_cubic(t)),
            TransitionPath::Flyover { control, .. } => {
                let s = ease_in_out_quad(t);
                let u = 1.0 - s;
                let position =
                    self.start.position * (u * u) + control * (2.0 * u * s) + self.end.position * (s * s);
                let target = self.start.target.lerp(self.end.target, s);
                CameraPose::new(position, target)
            }
        }
    }
}
