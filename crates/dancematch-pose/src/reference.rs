//! Reference poses - what the dancer is compared against
//!
//! Reference data is loaded once at startup. The only mutation after that is
//! the optional lazy seed: the first detected pose becomes the reference,
//! at most once per session.

use std::collections::BTreeMap;
use std::path::Path;

use dancematch_core::{DanceError, DanceResult};
use serde::Deserialize;

use crate::Pose;

/// How a reference set was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Frame-indexed choreography
    Sequence,
    /// Small named set of alternative key poses
    KeyPoses,
    /// First detected pose of the session
    Seeded,
}

/// One reference pose with an optional name
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePose {
    pub name: Option<String>,
    pub pose: Pose,
}

/// Collection of reference poses
#[derive(Debug, Clone)]
pub struct ReferencePoseSet {
    kind: ReferenceKind,
    poses: Vec<ReferencePose>,
}

/// On-disk snapshot: provider-ordered rows or joint-keyed object
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotRepr {
    Rows(Vec<Vec<f32>>),
    Keyed(Pose),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeyPosesRepr {
    Named(BTreeMap<String, SnapshotRepr>),
    Listed(Vec<SnapshotRepr>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReferenceFile {
    Sequence(Vec<SnapshotRepr>),
    KeyPoses { poses: KeyPosesRepr },
}

impl SnapshotRepr {
    fn into_pose(self) -> DanceResult<Pose> {
        match self {
            SnapshotRepr::Rows(rows) => Pose::from_provider_rows(&rows),
            SnapshotRepr::Keyed(pose) => Ok(pose),
        }
    }
}

impl ReferencePoseSet {
    /// Empty set; scoring falls back to "no reference" behavior
    pub fn empty() -> Self {
        Self {
            kind: ReferenceKind::KeyPoses,
            poses: Vec::new(),
        }
    }

    /// Single canonical target pose
    pub fn single(pose: Pose) -> Self {
        Self::key_poses(vec![ReferencePose { name: None, pose }])
    }

    /// Named alternatives; scored best-match
    pub fn key_poses(poses: Vec<ReferencePose>) -> Self {
        Self {
            kind: ReferenceKind::KeyPoses,
            poses,
        }
    }

    /// Frame-indexed choreography
    pub fn sequence(poses: Vec<Pose>) -> Self {
        Self {
            kind: ReferenceKind::Sequence,
            poses: poses
                .into_iter()
                .map(|pose| ReferencePose { name: None, pose })
                .collect(),
        }
    }

    /// Parse reference data from JSON text
    pub fn from_json(json: &str) -> DanceResult<Self> {
        let file: ReferenceFile = serde_json::from_str(json)?;
        let set = match file {
            ReferenceFile::Sequence(frames) => Self::sequence(
                frames
                    .into_iter()
                    .map(SnapshotRepr::into_pose)
                    .collect::<DanceResult<Vec<_>>>()?,
            ),
            ReferenceFile::KeyPoses {
                poses: KeyPosesRepr::Named(named),
            } => Self::key_poses(
                named
                    .into_iter()
                    .map(|(name, snapshot)| {
                        Ok(ReferencePose {
                            name: Some(name),
                            pose: snapshot.into_pose()?,
                        })
                    })
                    .collect::<DanceResult<Vec<_>>>()?,
            ),
            ReferenceFile::KeyPoses {
                poses: KeyPosesRepr::Listed(listed),
            } => Self::key_poses(
                listed
                    .into_iter()
                    .map(|snapshot| {
                        Ok(ReferencePose {
                            name: None,
                            pose: snapshot.into_pose()?,
                        })
                    })
                    .collect::<DanceResult<Vec<_>>>()?,
            ),
        };

        if set.is_empty() {
            return Err(DanceError::EmptyReference);
        }
        Ok(set)
    }

    /// Load reference data from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> DanceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load reference data, degrading to an empty set on any failure
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(set) => {
                tracing::info!(
                    path = %path.display(),
                    poses = set.len(),
                    kind = ?set.kind(),
                    "loaded reference poses"
                );
                set
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "reference data unavailable, using empty set");
                Self::empty()
            }
        }
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn poses(&self) -> impl Iterator<Item = &Pose> + '_ {
        self.poses.iter().map(|r| &r.pose)
    }

    pub fn entries(&self) -> &[ReferencePose] {
        &self.poses
    }

    /// Store `pose` as the only reference if the set is still empty
    ///
    /// Returns true when the seed was taken. A set that already holds poses,
    /// loaded or seeded, is never modified.
    pub fn seed(&mut self, pose: &Pose) -> bool {
        if !self.is_empty() || pose.is_empty() {
            return false;
        }
        self.kind = ReferenceKind::Seeded;
        self.poses.push(ReferencePose {
            name: None,
            pose: pose.clone(),
        });
        true
    }

    /// Drop a seeded reference so the next session seeds afresh
    ///
    /// Loaded references are kept.
    pub fn clear_seed(&mut self) {
        if self.kind == ReferenceKind::Seeded {
            *self = Self::empty();
        }
    }
}

impl Default for ReferencePoseSet {
    fn default() -> Self {
        Self::empty()
    }
}
