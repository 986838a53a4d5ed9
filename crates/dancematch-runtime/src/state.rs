//! Shared session state - one writer (the frame pipeline), many readers
//!
//! Every mutation happens under one write lock, so readers never see a
//! phase from one session paired with a score from another.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dancematch_core::{Clock, SessionTime};
use dancematch_pose::ScoreSmoother;
use parking_lot::RwLock;
use serde::Serialize;

use crate::session::{PhaseHint, SessionMachine, SessionPhase};

/// One published score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSample {
    pub timestamp: DateTime<Utc>,
    pub score: f32,
}

/// What a stopped session achieved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub frames_scored: u64,
    pub average_score: f32,
    pub peak_score: f32,
    pub danced_for_secs: f64,
}

/// Point-in-time view for status queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub active: bool,
    pub phase: &'static str,
    pub score: f32,
    pub raw_score: f32,
    pub frame_index: u64,
    pub hint: PhaseHint,
}

/// Outcome of scoring one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreUpdate {
    /// Smooth this raw score into the displayed score
    Raw(f32),
    /// Keep the displayed score
    Hold,
}

/// Issued at the start of a frame; binds the frame to one session
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTicket {
    pub generation: u64,
    pub phase: SessionPhase,
    pub hint: PhaseHint,
}

/// Process-wide session state
#[derive(Debug)]
struct ServerState {
    active: bool,
    /// Bumped on every start and stop
    generation: u64,
    machine: SessionMachine,
    raw_score: f32,
    displayed_score: f32,
    /// Smoother memory
    previous_score: f32,
    samples: VecDeque<ScoreSample>,
    sample_capacity: usize,
    frames_scored: u64,
    score_sum: f64,
    peak_score: f32,
}

impl ServerState {
    fn new(sample_capacity: usize) -> Self {
        Self {
            active: false,
            generation: 0,
            machine: SessionMachine::new(),
            raw_score: 0.0,
            displayed_score: 0.0,
            previous_score: 0.0,
            samples: VecDeque::new(),
            sample_capacity: sample_capacity.max(1),
            frames_scored: 0,
            score_sum: 0.0,
            peak_score: 0.0,
        }
    }

    /// Hard reset of every score; no smoothed decay
    fn reset_scores(&mut self) {
        self.raw_score = 0.0;
        self.displayed_score = 0.0;
        self.previous_score = 0.0;
        self.samples.clear();
        self.frames_scored = 0;
        self.score_sum = 0.0;
        self.peak_score = 0.0;
    }

    fn push_sample(&mut self, score: f32) {
        if self.samples.len() == self.sample_capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(ScoreSample {
            timestamp: Utc::now(),
            score,
        });
    }
}

/// Cloneable handle to the shared session state
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<RwLock<ServerState>>,
    clock: Arc<dyn Clock>,
}

impl SessionState {
    pub fn new(clock: Arc<dyn Clock>, sample_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ServerState::new(sample_capacity))),
            clock,
        }
    }

    pub fn now(&self) -> SessionTime {
        self.clock.now()
    }

    /// Activate a session with all scores zeroed
    ///
    /// Returns false, changing nothing, if a session is already active.
    pub fn start(&self, countdown: std::time::Duration) -> bool {
        let now = self.clock.now();
        let mut state = self.inner.write();
        if state.active {
            return false;
        }
        state.reset_scores();
        state.machine.start(now, countdown);
        state.active = true;
        state.generation += 1;
        tracing::info!(
            generation = state.generation,
            phase = state.machine.phase().name(),
            "session started"
        );
        true
    }

    /// Hard reset to Idle
    ///
    /// Returns the summary of the session that ended, None if none was active.
    pub fn stop(&self) -> Option<SessionSummary> {
        let now = self.clock.now();
        let mut state = self.inner.write();
        if !state.active {
            return None;
        }

        let summary = SessionSummary {
            frames_scored: state.frames_scored,
            average_score: if state.frames_scored > 0 {
                (state.score_sum / state.frames_scored as f64) as f32
            } else {
                0.0
            },
            peak_score: state.peak_score,
            danced_for_secs: state.machine.dancing_for(now).as_secs_f64(),
        };

        state.machine.stop();
        state.reset_scores();
        state.active = false;
        state.generation += 1;
        tracing::info!(
            frames_scored = summary.frames_scored,
            average_score = summary.average_score,
            "session stopped"
        );
        Some(summary)
    }

    /// Advance time-driven transitions and bind the frame to this session
    ///
    /// None when no session is active.
    pub fn begin_frame(&self) -> Option<FrameTicket> {
        let now = self.clock.now();
        let mut state = self.inner.write();
        if !state.active {
            return None;
        }
        if let Some(phase) = state.machine.advance(now) {
            tracing::info!(phase = phase.name(), "countdown finished");
        }
        Some(FrameTicket {
            generation: state.generation,
            phase: state.machine.phase(),
            hint: state.machine.hint(now),
        })
    }

    /// Publish the frame's score
    ///
    /// Returns false when the ticket's session has since been stopped or
    /// restarted; the result is then dropped. Scores only move while dancing.
    pub fn commit(&self, ticket: &FrameTicket, update: ScoreUpdate, smoother: &ScoreSmoother) -> bool {
        let mut state = self.inner.write();
        if !state.active || state.generation != ticket.generation {
            return false;
        }
        if !state.machine.phase().is_dancing() {
            return true;
        }

        if let ScoreUpdate::Raw(raw) = update {
            let displayed = smoother.smooth(raw, state.previous_score);
            state.raw_score = raw;
            state.previous_score = displayed;
            state.displayed_score = displayed;
            state.frames_scored += 1;
            state.score_sum += displayed as f64;
            state.peak_score = state.peak_score.max(displayed);
        }
        let shown = state.displayed_score;
        state.push_sample(shown);
        state.machine.record_frame();
        true
    }

    pub fn is_active(&self) -> bool {
        self.inner.read().active
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.read().machine.phase()
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Displayed score, 0 when no session is active
    pub fn current_score(&self) -> f32 {
        let state = self.inner.read();
        if state.active {
            state.displayed_score
        } else {
            0.0
        }
    }

    /// Latest samples, oldest first; empty unless dancing
    pub fn recent_samples(&self) -> Vec<ScoreSample> {
        let state = self.inner.read();
        if !state.active || !state.machine.phase().is_dancing() {
            return Vec::new();
        }
        state.samples.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let now = self.clock.now();
        let state = self.inner.read();
        let frame_index = match state.machine.phase() {
            SessionPhase::Dancing { frame_index, .. } => frame_index,
            _ => 0,
        };
        StatusSnapshot {
            active: state.active,
            phase: state.machine.phase().name(),
            score: if state.active { state.displayed_score } else { 0.0 },
            raw_score: state.raw_score,
            frame_index,
            hint: state.machine.hint(now),
        }
    }
}
