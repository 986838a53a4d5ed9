//! Control surface over the pipeline and the shared session state
//!
//! Score and status queries read `SessionState` only. They never wait on a
//! frame being processed.

use std::sync::Arc;
use std::time::Duration;

use dancematch_core::{Clock, DanceResult, MonotonicClock};
use dancematch_pose::ReferencePoseSet;
use parking_lot::Mutex;

use crate::config::DanceConfig;
use crate::frame::{Camera, Frame, FrameSource, PoseDetector};
use crate::overlay::AnnotatedFrame;
use crate::pipeline::{FramePipeline, PipelineOptions, PipelineStats};
use crate::state::{ScoreSample, SessionState, SessionSummary, StatusSnapshot};

/// Cloneable handle to one dance session service
#[derive(Clone)]
pub struct DanceSession {
    pipeline: Arc<Mutex<FramePipeline>>,
    state: SessionState,
    countdown: Duration,
    frame_wait: Duration,
}

impl DanceSession {
    pub fn new(pipeline: FramePipeline, countdown: Duration) -> Self {
        let state = pipeline.state().clone();
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            state,
            countdown,
            frame_wait: Duration::from_millis(500),
        }
    }

    /// Assemble from config, loading reference poses if a path is set
    pub fn from_config(
        config: &DanceConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn PoseDetector>,
    ) -> Self {
        Self::with_clock(config, source, detector, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        config: &DanceConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn PoseDetector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let reference = match &config.reference_path {
            Some(path) => ReferencePoseSet::load_or_empty(path),
            None => {
                tracing::info!("no reference path configured");
                ReferencePoseSet::empty()
            }
        };
        let state = SessionState::new(clock, config.sample_capacity);
        let pipeline = FramePipeline::new(
            Camera::new(source),
            detector,
            config.scoring.build_scorer(),
            config.smoothing,
            reference,
            state,
        )
        .with_options(PipelineOptions::from_config(config));

        let mut session = Self::new(pipeline, config.countdown);
        session.frame_wait = config.frame_wait;
        session
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn frame_wait(&self) -> Duration {
        self.frame_wait
    }

    /// Acquire the camera and enter Countdown, or Dancing when the
    /// countdown is zero
    ///
    /// A no-op when a session is already running. Fails, leaving the
    /// session Idle, when the camera cannot be acquired.
    pub fn start_session(&self) -> DanceResult<()> {
        if self.state.is_active() {
            return Ok(());
        }
        let mut pipeline = self.pipeline.lock();
        if let Err(e) = pipeline.open_camera() {
            tracing::error!(error = %e, "session not started");
            return Err(e);
        }
        self.state.start(self.countdown);
        Ok(())
    }

    /// Back to Idle with scores zeroed
    ///
    /// Takes effect before the next frame even if one is in flight. The
    /// camera is released now if the pipeline is free, otherwise by the
    /// pipeline once it notices the session ended.
    pub fn stop_session(&self) -> Option<SessionSummary> {
        let summary = self.state.stop();
        if let Some(mut pipeline) = self.pipeline.try_lock() {
            pipeline.release_camera();
        }
        summary
    }

    /// Run an externally supplied frame through the pipeline
    pub fn process_frame(&self, frame: Option<Frame>) -> Option<AnnotatedFrame> {
        self.pipeline.lock().process(frame)
    }

    /// Pull and process the next camera frame, waiting at most `frame_wait`
    pub fn next_frame(&self) -> Option<AnnotatedFrame> {
        self.pipeline.lock().next_frame(self.frame_wait)
    }

    pub fn current_score(&self) -> f32 {
        self.state.current_score()
    }

    pub fn recent_score_samples(&self) -> Vec<ScoreSample> {
        self.state.recent_samples()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.state.snapshot()
    }

    pub fn pipeline_stats(&self) -> PipelineStats {
        self.pipeline.lock().stats().clone()
    }

    pub fn camera_open(&self) -> bool {
        self.pipeline.lock().camera_open()
    }
}
