//! Session phases - Idle → Countdown → Dancing
//!
//! Once a countdown starts, transitions are driven only by elapsed time.
//! Nothing ends Dancing except an external stop.

use std::time::Duration;

use dancematch_core::{format_elapsed, SessionTime};
use serde::Serialize;

/// Label shown next to the countdown number
pub const READY_LABEL: &str = "READY";

/// Lifecycle phase of one dance session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Countdown {
        started_at: SessionTime,
        duration: Duration,
    },
    Dancing {
        started_at: SessionTime,
        /// Frames processed while dancing; telemetry only
        frame_index: u64,
    },
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Countdown { .. } => "countdown",
            SessionPhase::Dancing { .. } => "dancing",
        }
    }

    pub fn is_dancing(&self) -> bool {
        matches!(self, SessionPhase::Dancing { .. })
    }
}

/// Rendering hint for the current phase; never a scoring input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseHint {
    Idle,
    Countdown {
        remaining_secs: u64,
        label: &'static str,
    },
    Dancing {
        elapsed: String,
    },
}

/// Phase state machine
#[derive(Debug, Clone, Default)]
pub struct SessionMachine {
    phase: SessionPhase,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Begin a session; a zero countdown goes straight to Dancing
    ///
    /// Returns false, changing nothing, if a session is already running.
    pub fn start(&mut self, now: SessionTime, countdown: Duration) -> bool {
        if self.phase != SessionPhase::Idle {
            return false;
        }
        self.phase = if countdown.is_zero() {
            SessionPhase::Dancing {
                started_at: now,
                frame_index: 0,
            }
        } else {
            SessionPhase::Countdown {
                started_at: now,
                duration: countdown,
            }
        };
        true
    }

    /// Countdown time left, None outside Countdown
    pub fn remaining(&self, now: SessionTime) -> Option<Duration> {
        match self.phase {
            SessionPhase::Countdown {
                started_at,
                duration,
            } => Some(duration.saturating_sub(now.since(started_at))),
            _ => None,
        }
    }

    /// Apply time-driven transitions
    /// Returns the new phase if one happened
    pub fn advance(&mut self, now: SessionTime) -> Option<SessionPhase> {
        match self.remaining(now) {
            Some(remaining) if remaining.is_zero() => {
                self.phase = SessionPhase::Dancing {
                    started_at: now,
                    frame_index: 0,
                };
                Some(self.phase)
            }
            _ => None,
        }
    }

    /// Count a processed frame while dancing
    pub fn record_frame(&mut self) {
        if let SessionPhase::Dancing { frame_index, .. } = &mut self.phase {
            *frame_index += 1;
        }
    }

    /// Time spent dancing so far
    pub fn dancing_for(&self, now: SessionTime) -> Duration {
        match self.phase {
            SessionPhase::Dancing { started_at, .. } => now.since(started_at),
            _ => Duration::ZERO,
        }
    }

    /// Back to Idle, returning the phase that was left
    pub fn stop(&mut self) -> SessionPhase {
        std::mem::take(&mut self.phase)
    }

    pub fn hint(&self, now: SessionTime) -> PhaseHint {
        match self.phase {
            SessionPhase::Idle => PhaseHint::Idle,
            SessionPhase::Countdown { .. } => {
                let remaining = self.remaining(now).unwrap_or_default();
                PhaseHint::Countdown {
                    remaining_secs: ceil_secs(remaining),
                    label: READY_LABEL,
                }
            }
            SessionPhase::Dancing { started_at, .. } => PhaseHint::Dancing {
                elapsed: format_elapsed(now.since(started_at)),
            },
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
