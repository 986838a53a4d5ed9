//! Stand-in collaborators for running without a camera or pose model
//!
//! `TestPatternSource` plays the camera, `SyntheticDancer` plays the
//! pose-estimation provider, `ScriptedDetector` replays fixed results.

use std::collections::VecDeque;

use dancematch_core::{DanceError, DanceResult};
use dancematch_pose::{Joint, Landmark, Pose};

use crate::frame::{Frame, FrameSource, PoseDetector, Rgb};

/// Camera stand-in producing solid frames
#[derive(Debug, Clone)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    open: bool,
    available: bool,
    /// Frames left before the source runs dry; None for endless
    remaining: Option<u64>,
    produced: u64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            open: false,
            available: true,
            remaining: None,
            produced: 0,
        }
    }

    /// Source whose `open` always fails
    pub fn unavailable(width: u32, height: u32) -> Self {
        Self {
            available: false,
            ..Self::new(width, height)
        }
    }

    /// Stop producing after `frames` reads
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.remaining = Some(frames);
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl FrameSource for TestPatternSource {
    fn open(&mut self) -> DanceResult<()> {
        if !self.available {
            return Err(DanceError::CameraUnavailable(
                "test pattern source disabled".to_string(),
            ));
        }
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Option<Frame> {
        if !self.open {
            return None;
        }
        if let Some(remaining) = &mut self.remaining {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }
        self.produced += 1;
        let shade = (self.produced % 64) as u8;
        Some(Frame::filled(self.width, self.height, Rgb(shade, shade, shade)))
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// Neutral standing pose, arms at the sides
pub fn standing_pose() -> Pose {
    let coords = [
        (Joint::Nose, 0.50, 0.10),
        (Joint::LeftShoulder, 0.40, 0.25),
        (Joint::RightShoulder, 0.60, 0.25),
        (Joint::LeftElbow, 0.36, 0.40),
        (Joint::RightElbow, 0.64, 0.40),
        (Joint::LeftWrist, 0.34, 0.55),
        (Joint::RightWrist, 0.66, 0.55),
        (Joint::LeftHip, 0.45, 0.55),
        (Joint::RightHip, 0.55, 0.55),
        (Joint::LeftKnee, 0.45, 0.75),
        (Joint::RightKnee, 0.55, 0.75),
        (Joint::LeftAnkle, 0.45, 0.95),
        (Joint::RightAnkle, 0.55, 0.95),
    ];
    coords
        .iter()
        .fold(Pose::new(), |pose, (joint, x, y)| {
            pose.with(*joint, Landmark::visible(*x, *y))
        })
}

/// Provider stand-in: a dancer raising and lowering both arms
#[derive(Debug, Clone)]
pub struct SyntheticDancer {
    /// Frames per full arm cycle
    period: u32,
    frame: u64,
}

impl SyntheticDancer {
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1),
            frame: 0,
        }
    }
}

impl Default for SyntheticDancer {
    fn default() -> Self {
        Self::new(60)
    }
}

impl PoseDetector for SyntheticDancer {
    fn detect(&mut self, _frame: &Frame) -> DanceResult<Option<Pose>> {
        let phase = (self.frame % self.period as u64) as f32 / self.period as f32;
        self.frame += 1;

        // 0 = arms down, 1 = arms overhead
        let lift = 0.5 - 0.5 * (phase * std::f32::consts::TAU).cos();
        let mut pose = standing_pose();
        for (elbow, wrist, side) in [
            (Joint::LeftElbow, Joint::LeftWrist, -1.0),
            (Joint::RightElbow, Joint::RightWrist, 1.0),
        ] {
            pose.set(elbow, Landmark::visible(0.5 + side * 0.16, 0.40 - 0.25 * lift));
            pose.set(wrist, Landmark::visible(0.5 + side * 0.16, 0.55 - 0.50 * lift));
        }
        Ok(Some(pose))
    }
}

/// One scripted provider result
#[derive(Debug, Clone)]
pub enum DetectorStep {
    Pose(Pose),
    NoBody,
    Fail(String),
}

/// Provider stand-in replaying a fixed script, then reporting no body
#[derive(Debug, Clone, Default)]
pub struct ScriptedDetector {
    script: VecDeque<DetectorStep>,
    calls: u64,
}

impl ScriptedDetector {
    pub fn new<I: IntoIterator<Item = DetectorStep>>(steps: I) -> Self {
        Self {
            script: steps.into_iter().collect(),
            calls: 0,
        }
    }

    /// Same pose on every call
    pub fn repeating(pose: Pose, times: usize) -> Self {
        Self::new(std::iter::repeat(DetectorStep::Pose(pose)).take(times))
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl PoseDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame) -> DanceResult<Option<Pose>> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(DetectorStep::Pose(pose)) => Ok(Some(pose)),
            Some(DetectorStep::NoBody) | None => Ok(None),
            Some(DetectorStep::Fail(reason)) => Err(DanceError::DetectorFailed(reason)),
        }
    }
}
