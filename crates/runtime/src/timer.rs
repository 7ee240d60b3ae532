use foundation::time::Time;

/// Fixed-interval timer polled from the frame loop.
///
/// Fires at most once per poll no matter how many intervals elapsed, and
/// schedules the next deadline from the fire time, so a slow frame never
/// produces a burst of catch-up work.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalTimer {
    interval_s: f64,
    next_due: Time,
    cancelled: bool,
}

impl IntervalTimer {
    /// A timer whose first deadline is one interval after `start`.
    pub fn new(interval_s: f64, start: Time) -> Self {
        let interval_s = interval_s.max(1e-3);
        Self {
            interval_s,
            next_due: start.plus(interval_s),
            cancelled: false,
        }
    }

    /// A timer that fires on the first poll at or after `start`.
    pub fn immediate(interval_s: f64, start: Time) -> Self {
        let mut t = Self::new(interval_s, start);
        t.next_due = start;
        t
    }

    pub fn interval_s(&self) -> f64 {
        self.interval_s
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Returns `true` when the deadline has passed.
    pub fn poll(&mut self, now: Time) -> bool {
        if self.cancelled || now < self.next_due {
            return false;
        }
        self.next_due = now.plus(self.interval_s);
        true
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}
