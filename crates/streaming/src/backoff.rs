/// Exponential retry delay after consecutive failures.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_s: f64,
    factor: f64,
    max_s: f64,
    failures: u32,
}

impl Backoff {
    pub fn new(base_s: f64, factor: f64, max_s: f64) -> Self {
        Self {
            base_s: base_s.max(0.0),
            factor: factor.max(1.0),
            max_s: max_s.max(0.0),
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay before the next attempt given the failures so far
    /// (zero when the last attempt succeeded).
    pub fn delay_s(&self) -> f64 {
        if self.failures == 0 {
            return 0.0;
        }
        let exp = (self.failures - 1).min(63) as i32;
        (self.base_s * self.factor.powi(exp)).min(self.max_s)
    }

    /// Count a failure and return the delay to wait before retrying.
    pub fn record_failure(&mut self) -> f64 {
        self.failures = self.failures.saturating_add(1);
        self.delay_s()
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }
}
