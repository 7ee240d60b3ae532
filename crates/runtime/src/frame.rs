use foundation::time::Time;

/// Largest frame delta fed into smoothing and animation.
///
/// A stalled tab or a debugger pause must not teleport fades or camera
/// transitions to their end state.
pub const MAX_FRAME_DT_S: f64 = 0.1;

/// Per-tick frame metadata.
///
/// `time` is the clock reading at the start of the tick and `dt_s` the clamped
/// delta since the previous tick. All per-frame work in a tick sees the same
/// frame, which keeps snapshot merge, lifecycle, camera, and transform output
/// consistent with each other.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Delta time since the previous frame (seconds, clamped).
    pub dt_s: f64,
    /// Clock time at the start of the frame.
    pub time: Time,
}

impl Frame {
    pub fn first(time: Time) -> Self {
        Self {
            index: 0,
            dt_s: 0.0,
            time,
        }
    }

    /// The frame following `self`, observed at `now`.
    pub fn next(self, now: Time) -> Self {
        let raw = now.seconds_since(self.time);
        let dt_s = if raw.is_finite() {
            raw.clamp(0.0, MAX_FRAME_DT_S)
        } else {
            0.0
        };
        Self {
            index: self.index + 1,
            dt_s,
            time: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Frame, MAX_FRAME_DT_S};
    use foundation::time::Time;

    #[test]
    fn next_advances_index_and_time() {
        let f0 = Frame::first(Time(1.0));
        let f1 = f0.next(Time(1.016));
        assert_eq!(f1.index, 1);
        assert_eq!(f1.time, Time(1.016));
        assert!((f1.dt_s - 0.016).abs() < 1e-12);
    }

    #[test]
    fn dt_is_clamped() {
        let f0 = Frame::first(Time(0.0));
        assert_eq!(f0.next(Time(5.0)).dt_s, MAX_FRAME_DT_S);
        assert_eq!(f0.next(Time(-1.0)).dt_s, 0.0);
    }
}
