use std::cell::Cell;
use std::rc::Rc;

/// Time primitives
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64); // seconds

impl Time {
    pub fn seconds_since(self, earlier: Time) -> f64 {
        self.0 - earlier.0
    }

    pub fn plus(self, seconds: f64) -> Time {
        Time(self.0 + seconds)
    }
}

/// Source of the current time.
///
/// Services that schedule work (pollers, timers) take a clock instead of
/// reading wall-clock time directly, so tests can drive them deterministically.
pub trait Clock {
    fn now(&self) -> Time;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Time {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> Time {
        (**self).now()
    }
}

/// Monotonic wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: std::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Time {
        Time(self.origin.elapsed().as_secs_f64())
    }
}

/// Manually advanced clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_s: Cell<f64>,
}

impl ManualClock {
    pub fn new(start: Time) -> Self {
        Self {
            now_s: Cell::new(start.0),
        }
    }

    pub fn advance(&self, seconds: f64) {
        self.now_s.set(self.now_s.get() + seconds);
    }

    pub fn set(&self, t: Time) {
        self.now_s.set(t.0);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        Time(self.now_s.get())
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, Time};
    use std::rc::Rc;

    #[test]
    fn manual_clock_advances() {
        let clock = Rc::new(ManualClock::new(Time(10.0)));
        let shared = Rc::clone(&clock);
        clock.advance(2.5);
        assert_eq!(shared.now(), Time(12.5));
        assert_eq!(shared.now().seconds_since(Time(10.0)), 2.5);
    }
}
