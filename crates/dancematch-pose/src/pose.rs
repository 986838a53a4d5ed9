//! Pose State - Detected or reference body configuration at one instant
//!
//! Landmarks live in normalized image space: x and y roughly in [0, 1]
//! relative to the frame, z relative depth, plus a visibility confidence.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use dancematch_core::DanceError;
use serde::{Deserialize, Serialize};

/// Body landmark used for dance comparison
///
/// A subset of the 33-landmark layout emitted by the pose-estimation
/// provider; `provider_index` maps back into that layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Joint {
    // Head
    Nose,

    // Arms
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,

    // Legs
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    /// Number of joints
    pub const COUNT: usize = 13;

    /// All joints in order
    pub fn all() -> &'static [Joint] {
        &[
            Joint::Nose,
            Joint::LeftShoulder,
            Joint::RightShoulder,
            Joint::LeftElbow,
            Joint::RightElbow,
            Joint::LeftWrist,
            Joint::RightWrist,
            Joint::LeftHip,
            Joint::RightHip,
            Joint::LeftKnee,
            Joint::RightKnee,
            Joint::LeftAnkle,
            Joint::RightAnkle,
        ]
    }

    /// Index of this joint in the provider's 33-landmark layout
    pub fn provider_index(self) -> usize {
        match self {
            Joint::Nose => 0,
            Joint::LeftShoulder => 11,
            Joint::RightShoulder => 12,
            Joint::LeftElbow => 13,
            Joint::RightElbow => 14,
            Joint::LeftWrist => 15,
            Joint::RightWrist => 16,
            Joint::LeftHip => 23,
            Joint::RightHip => 24,
            Joint::LeftKnee => 25,
            Joint::RightKnee => 26,
            Joint::LeftAnkle => 27,
            Joint::RightAnkle => 28,
        }
    }

    /// Joint for a provider landmark index, if it is one we compare
    pub fn from_provider_index(index: usize) -> Option<Joint> {
        Joint::all()
            .iter()
            .copied()
            .find(|joint| joint.provider_index() == index)
    }

    /// Canonical upper-case name (e.g. `LEFT_WRIST`)
    pub fn name(self) -> &'static str {
        match self {
            Joint::Nose => "NOSE",
            Joint::LeftShoulder => "LEFT_SHOULDER",
            Joint::RightShoulder => "RIGHT_SHOULDER",
            Joint::LeftElbow => "LEFT_ELBOW",
            Joint::RightElbow => "RIGHT_ELBOW",
            Joint::LeftWrist => "LEFT_WRIST",
            Joint::RightWrist => "RIGHT_WRIST",
            Joint::LeftHip => "LEFT_HIP",
            Joint::RightHip => "RIGHT_HIP",
            Joint::LeftKnee => "LEFT_KNEE",
            Joint::RightKnee => "RIGHT_KNEE",
            Joint::LeftAnkle => "LEFT_ANKLE",
            Joint::RightAnkle => "RIGHT_ANKLE",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Joint {
    type Err = DanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Joint::all()
            .iter()
            .copied()
            .find(|joint| joint.name() == wanted)
            .ok_or_else(|| DanceError::UnknownJoint(s.to_string()))
    }
}

fn default_visibility() -> f32 {
    1.0
}

/// One landmark sample: position plus visibility confidence
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default = "default_visibility")]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility: visibility.clamp(0.0, 1.0),
        }
    }

    /// Fully visible landmark on the image plane
    pub fn visible(x: f32, y: f32) -> Self {
        Self::new(x, y, 0.0, 1.0)
    }

    /// Planar (x, y) distance; depth is ignored, it is too noisy to compare
    pub fn planar_distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Strictly above the visibility threshold
    #[inline]
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility > threshold
    }
}

/// Body configuration at one instant
///
/// Joints may be missing; a missing joint never counts as visible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Joint, Landmark>", into = "BTreeMap<Joint, Landmark>")]
pub struct Pose {
    /// Landmarks indexed by Joint enum
    landmarks: [Option<Landmark>; Joint::COUNT],
}

impl Pose {
    /// Pose with no landmarks
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style landmark insertion
    pub fn with(mut self, joint: Joint, landmark: Landmark) -> Self {
        self.set(joint, landmark);
        self
    }

    /// Get landmark by joint
    pub fn get(&self, joint: Joint) -> Option<&Landmark> {
        self.landmarks[joint as usize].as_ref()
    }

    /// Set landmark
    pub fn set(&mut self, joint: Joint, landmark: Landmark) {
        self.landmarks[joint as usize] = Some(landmark);
    }

    /// Remove a landmark, returning it
    pub fn remove(&mut self, joint: Joint) -> Option<Landmark> {
        self.landmarks[joint as usize].take()
    }

    /// Number of joints present
    pub fn len(&self) -> usize {
        self.landmarks.iter().filter(|lm| lm.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.iter().all(Option::is_none)
    }

    /// Present landmarks in joint order
    pub fn iter(&self) -> impl Iterator<Item = (Joint, &Landmark)> + '_ {
        Joint::all()
            .iter()
            .zip(self.landmarks.iter())
            .filter_map(|(joint, lm)| lm.as_ref().map(|lm| (*joint, lm)))
    }

    /// Build from rows in the provider's landmark order
    ///
    /// Rows are `[x, y, z]` or `[x, y, z, visibility]`; rows for landmarks we
    /// do not compare are skipped.
    pub fn from_provider_rows(rows: &[Vec<f32>]) -> Result<Self, DanceError> {
        let mut pose = Pose::new();
        for (index, row) in rows.iter().enumerate() {
            let Some(joint) = Joint::from_provider_index(index) else {
                continue;
            };
            let landmark = match row.as_slice() {
                [x, y] => Landmark::new(*x, *y, 0.0, 1.0),
                [x, y, z] => Landmark::new(*x, *y, *z, 1.0),
                [x, y, z, v] => Landmark::new(*x, *y, *z, *v),
                other => {
                    return Err(DanceError::InvalidSnapshot(format!(
                        "landmark {} has {} values, expected 2 to 4",
                        index,
                        other.len()
                    )))
                }
            };
            pose.set(joint, landmark);
        }
        Ok(pose)
    }
}

impl From<BTreeMap<Joint, Landmark>> for Pose {
    fn from(map: BTreeMap<Joint, Landmark>) -> Self {
        let mut pose = Pose::new();
        for (joint, landmark) in map {
            pose.set(joint, landmark);
        }
        pose
    }
}

impl From<Pose> for BTreeMap<Joint, Landmark> {
    fn from(pose: Pose) -> Self {
        pose.iter().map(|(joint, lm)| (joint, *lm)).collect()
    }
}
