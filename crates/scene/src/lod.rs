use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DetailLevel {
    Detailed,
    Simple,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Aircraft count above which every aircraft draws the simple shape.
    pub threshold: usize,
    /// Half-width of the band around `threshold` in which the level holds,
    /// as a fraction of `threshold`. Zero gives a plain threshold switch.
    pub hysteresis_ratio: f64,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            threshold: 2000,
            hysteresis_ratio: 0.1,
        }
    }
}

impl LodConfig {
    /// Band half-width in aircraft. Always below `threshold`, so a shrinking
    /// count can return to the detailed level before it reaches zero.
    pub fn hysteresis(&self) -> usize {
        let ratio = if self.hysteresis_ratio.is_finite() {
            self.hysteresis_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let band = (self.threshold as f64 * ratio).round() as usize;
        band.min(self.threshold.saturating_sub(1))
    }
}

/// Level for `count` with no history.
pub fn level_for(count: usize, threshold: usize) -> DetailLevel {
    if count > threshold {
        DetailLevel::Simple
    } else {
        DetailLevel::Detailed
    }
}

/// Tracks the current detail level across frames.
#[derive(Debug, Clone)]
pub struct LodSelector {
    config: LodConfig,
    level: DetailLevel,
}

impl LodSelector {
    pub fn new(config: LodConfig) -> Self {
        Self {
            config,
            level: DetailLevel::Detailed,
        }
    }

    pub fn level(&self) -> DetailLevel {
        self.level
    }

    /// Re-evaluate for `count`; returns the new level when it changed.
    pub fn update(&mut self, count: usize) -> Option<DetailLevel> {
        let threshold = self.config.threshold;
        let hysteresis = self.config.hysteresis();

        let next = match self.level {
            DetailLevel::Detailed if count > threshold.saturating_add(hysteresis) => {
                DetailLevel::Simple
            }
            DetailLevel::Simple if count <= threshold.saturating_sub(hysteresis) => {
                DetailLevel::Detailed
            }
            level => level,
        };

        if next == self.level {
            return None;
        }
        debug!(count, threshold, "detail level {:?} -> {:?}", self.level, next);
        self.level = next;
        Some(next)
    }
}
