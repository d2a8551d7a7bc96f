use serde::{Deserialize, Serialize};

/// Default bounds in meters per second: 5 mph to 80 mph.
pub const DEFAULT_MIN_SPEED: f64 = 2.235;
pub const DEFAULT_MAX_SPEED: f64 = 35.763;

/// Accepts speeds inside a closed interval. Holds no per-call state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityFilter {
    min: f64,
    max: f64,
}

impl VelocityFilter {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// True when `min <= speed <= max`. NaN is never accepted.
    pub fn check(&self, speed: f64) -> bool {
        speed >= self.min && speed <= self.max
    }

    pub fn suppress(&self, speed: f64) -> bool {
        !self.check(speed)
    }
}

impl Default for VelocityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SPEED, DEFAULT_MAX_SPEED)
    }
}
