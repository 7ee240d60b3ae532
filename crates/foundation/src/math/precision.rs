//! Deterministic float handling for ordering and change detection.

use core::cmp::Ordering;

/// Canonicalize a float so `-0.0 == 0.0` and all NaNs compare equal.
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for floats.
///
/// Prefer this any time scores or distances are sorted, so ties resolve the
/// same way on every replay.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// A float wrapper with a deterministic total ordering.
#[derive(Debug, Copy, Clone, Default)]
pub struct StableF64(pub f64);

impl PartialEq for StableF64 {
    fn eq(&self, other: &Self) -> bool {
        stable_total_cmp_f64(self.0, other.0) == Ordering::Equal
    }
}

impl Eq for StableF64 {}

impl PartialOrd for StableF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StableF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        stable_total_cmp_f64(self.0, other.0)
    }
}

/// Round `v` to a multiple of `step` and return the multiple as an integer key.
///
/// Used for "did this meaningfully change" checks (bounds keys, focus
/// deduplication). Non-finite input maps to `i64::MIN`.
pub fn quantize(v: f64, step: f64) -> i64 {
    if !v.is_finite() || step <= 0.0 {
        return i64::MIN;
    }
    (v / step).round() as i64
}
