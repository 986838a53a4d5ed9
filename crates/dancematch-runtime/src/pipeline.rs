//! Frame pipeline - the single writer of session state
//!
//! Owns the camera and the pose provider. Each frame runs the same stages:
//! mirror, crop, detect, score, publish, annotate.

use std::time::{Duration, Instant};

use dancematch_core::SessionTime;
use dancematch_pose::{Pose, ReferencePoseSet, ScoreSmoother, SimilarityScorer};
use serde::Serialize;

use crate::config::{AspectRatio, DanceConfig, Fallback};
use crate::frame::{Camera, Frame, PoseDetector};
use crate::overlay::{annotate, AnnotatedFrame, Overlay};
use crate::session::PhaseHint;
use crate::state::{FrameTicket, ScoreUpdate, SessionState};

/// Pipeline knobs taken from the runtime config
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub crop_aspect: Option<AspectRatio>,
    pub lazy_seed: bool,
    pub no_reference: Fallback,
    pub no_detection: Fallback,
    pub idle_delay: Duration,
    pub step_back_below: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&DanceConfig::default())
    }
}

impl PipelineOptions {
    pub fn from_config(config: &DanceConfig) -> Self {
        Self {
            crop_aspect: config.crop_aspect,
            lazy_seed: config.lazy_seed,
            no_reference: config.scoring.no_reference,
            no_detection: config.no_detection,
            idle_delay: config.idle_delay,
            step_back_below: config.step_back_below,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub detections: u64,
    pub detector_failures: u64,
    /// Results dropped because the session changed mid-frame
    pub frames_discarded: u64,
    pub seeds_taken: u64,
}

pub struct FramePipeline {
    camera: Camera,
    detector: Box<dyn PoseDetector>,
    scorer: SimilarityScorer,
    smoother: ScoreSmoother,
    reference: ReferencePoseSet,
    state: SessionState,
    options: PipelineOptions,
    stats: PipelineStats,
    /// Session generation the reference set was last prepared for
    seen_generation: u64,
}

impl FramePipeline {
    pub fn new(
        camera: Camera,
        detector: Box<dyn PoseDetector>,
        scorer: SimilarityScorer,
        smoother: ScoreSmoother,
        reference: ReferencePoseSet,
        state: SessionState,
    ) -> Self {
        Self {
            camera,
            detector,
            scorer,
            smoother,
            reference,
            state,
            options: PipelineOptions::default(),
            stats: PipelineStats::default(),
            seen_generation: 0,
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn reference(&self) -> &ReferencePoseSet {
        &self.reference
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn camera_open(&self) -> bool {
        self.camera.is_open()
    }

    pub fn open_camera(&mut self) -> dancematch_core::DanceResult<()> {
        self.camera.acquire()
    }

    pub fn release_camera(&mut self) {
        self.camera.release();
    }

    /// Run one frame through every stage
    ///
    /// None in, None out. Scores are published only for the session the
    /// frame started in.
    pub fn process(&mut self, frame: Option<Frame>) -> Option<AnnotatedFrame> {
        let frame = frame?;
        self.stats.frames_processed += 1;

        // Stage 1: Mirror and frame
        let mut frame = frame.mirrored();
        if let Some(aspect) = self.options.crop_aspect {
            frame = frame.cropped_to_aspect(aspect.width, aspect.height);
        }

        // Stage 2: Bind to the current session, advancing the countdown
        let ticket = self.state.begin_frame();
        if let Some(ticket) = &ticket {
            self.prepare_reference(ticket.generation);
        }

        // Stage 3: Detect
        let pose = match self.detector.detect(&frame) {
            Ok(pose) => pose,
            Err(e) => {
                self.stats.detector_failures += 1;
                tracing::warn!(error = %e, "pose detection failed, treating frame as empty");
                None
            }
        };
        if pose.is_some() {
            self.stats.detections += 1;
        }

        // Stage 4: Score and publish
        if let Some(ticket) = &ticket {
            let update = self.score_update(ticket, pose.as_ref());
            if !self.state.commit(ticket, update, &self.smoother) {
                self.stats.frames_discarded += 1;
                tracing::debug!(generation = ticket.generation, "session changed mid-frame, result discarded");
            }
        }

        // Stage 5: Annotate
        let overlay = Overlay {
            person_detected: pose.is_some(),
            step_back: pose
                .as_ref()
                .is_some_and(|p| self.scorer.framing(p) < self.options.step_back_below),
            score: self.state.current_score(),
            hint: ticket.map_or(PhaseHint::Idle, |t| t.hint),
        };
        Some(annotate(frame, pose.as_ref(), overlay))
    }

    /// Pull the next frame from the camera and process it
    ///
    /// Sleeps `idle_delay` between empty reads. Returns None once
    /// `max_wait` passes without a frame. The camera is released while no
    /// session is active.
    pub fn next_frame(&mut self, max_wait: Duration) -> Option<AnnotatedFrame> {
        let deadline = Instant::now() + max_wait;
        loop {
            if !self.state.is_active() {
                self.camera.release();
            } else if let Some(frame) = self.camera.read() {
                return self.process(Some(frame));
            }

            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(self.options.idle_delay);
        }
    }

    /// A new session seeds its own reference
    fn prepare_reference(&mut self, generation: u64) {
        if generation != self.seen_generation {
            self.seen_generation = generation;
            self.reference.clear_seed();
        }
    }

    fn score_update(&mut self, ticket: &FrameTicket, pose: Option<&Pose>) -> ScoreUpdate {
        let Some(pose) = pose else {
            return fallback_update(self.options.no_detection);
        };

        if self.options.lazy_seed && self.reference.seed(pose) {
            self.stats.seeds_taken += 1;
            tracing::info!(joints = pose.len(), phase = ticket.phase.name(), "reference seeded from first detected pose");
            return ScoreUpdate::Hold;
        }
        if !ticket.phase.is_dancing() {
            return ScoreUpdate::Hold;
        }

        match self.scorer.score(pose, &self.reference) {
            Some(raw) => ScoreUpdate::Raw(raw),
            None => fallback_update(self.options.no_reference),
        }
    }

    /// Time as seen by the session clock
    pub fn now(&self) -> SessionTime {
        self.state.now()
    }
}

fn fallback_update(fallback: Fallback) -> ScoreUpdate {
    match fallback {
        Fallback::Zero => ScoreUpdate::Raw(0.0),
        Fallback::HoldPrevious => ScoreUpdate::Hold,
    }
}
