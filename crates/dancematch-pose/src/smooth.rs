//! Score smoothing - raw score stream to displayed score
//!
//! Asymmetric rate limiting: the displayed score climbs by at most
//! `up_rate` and falls by at most `down_rate` per frame. The smoother holds
//! no state; the previous displayed score lives with the session.

use dancematch_core::{DanceError, DanceResult};
use serde::{Deserialize, Serialize};

use crate::MAX_SCORE;

/// Rate-limited tracking filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSmoother {
    /// Maximum rise per call
    pub up_rate: f32,
    /// Maximum fall per call
    pub down_rate: f32,
}

impl ScoreSmoother {
    pub fn new(up_rate: f32, down_rate: f32) -> DanceResult<Self> {
        let smoother = Self { up_rate, down_rate };
        smoother.validate()?;
        Ok(smoother)
    }

    /// Slow climb, slower fall (2, 1)
    pub fn gentle() -> Self {
        Self {
            up_rate: 2.0,
            down_rate: 1.0,
        }
    }

    /// (4, 2)
    pub fn balanced() -> Self {
        Self {
            up_rate: 4.0,
            down_rate: 2.0,
        }
    }

    /// (5, 3)
    pub fn responsive() -> Self {
        Self {
            up_rate: 5.0,
            down_rate: 3.0,
        }
    }

    /// Rates must be finite and non-negative
    pub fn validate(&self) -> DanceResult<()> {
        for (name, rate) in [("up_rate", self.up_rate), ("down_rate", self.down_rate)] {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(DanceError::InvalidConfig(format!(
                    "smoothing {name} must be a non-negative number, got {rate}"
                )));
            }
        }
        Ok(())
    }

    /// Next displayed score, clamped to [0, 100]
    pub fn smooth(&self, raw: f32, previous: f32) -> f32 {
        let next = if raw > previous {
            raw.min(previous + self.up_rate)
        } else {
            raw.max(previous - self.down_rate)
        };
        next.clamp(0.0, MAX_SCORE)
    }
}

impl Default for ScoreSmoother {
    fn default() -> Self {
        Self::responsive()
    }
}
