//! Similarity scoring - detected pose vs. reference data
//!
//! Scores are percentages in [0, 100]. Each `ScoringPolicy` is a complete
//! strategy; the frame pipeline picks one and never duplicates plumbing.

use std::collections::BTreeMap;

use dancematch_core::{DanceError, DanceResult};
use serde::{Deserialize, Serialize};

use crate::{Joint, Pose, ReferencePoseSet};

/// Distance (normalized units) at which a joint stops contributing
pub const TOLERANCE: f32 = 0.5;

/// Final multiplier on the weighted mean, before the 100 clamp
pub const BOOST: f32 = 1.2;

/// Visibility both landmarks need to be compared
pub const MATCH_VISIBILITY: f32 = 0.5;

/// Visibility a joint needs to count as framed
pub const FRAMING_VISIBILITY: f32 = 0.7;

/// Framing percentage below which the score is halved
pub const FRAMING_PASS: f32 = 80.0;

/// Highest possible score
pub const MAX_SCORE: f32 = 100.0;

/// Per-joint weights reflecting how diagnostic a joint is for dance
///
/// INVARIANT: every weight is finite and > 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Joint, f32>", into = "BTreeMap<Joint, f32>")]
pub struct JointWeights {
    weights: [f32; Joint::COUNT],
}

impl JointWeights {
    /// Every joint weighs 1.0
    pub fn uniform() -> Self {
        Self {
            weights: [1.0; Joint::COUNT],
        }
    }

    /// Build a table; joints not listed weigh 1.0
    pub fn new<I>(entries: I) -> DanceResult<Self>
    where
        I: IntoIterator<Item = (Joint, f32)>,
    {
        let mut table = Self::uniform();
        for (joint, weight) in entries {
            if !(weight.is_finite() && weight > 0.0) {
                return Err(DanceError::InvalidWeight {
                    joint: joint.name().to_string(),
                    weight,
                });
            }
            table.weights[joint as usize] = weight;
        }
        Ok(table)
    }

    pub fn weight(&self, joint: Joint) -> f32 {
        self.weights[joint as usize]
    }
}

impl Default for JointWeights {
    /// Hands carry the dance, feet the least
    fn default() -> Self {
        Self {
            weights: [
                0.5, // Nose
                1.5, 1.5, // Shoulders
                2.0, 2.0, // Elbows
                2.5, 2.5, // Wrists
                1.5, 1.5, // Hips
                1.0, 1.0, // Knees
                0.5, 0.5, // Ankles
            ],
        }
    }
}

impl TryFrom<BTreeMap<Joint, f32>> for JointWeights {
    type Error = DanceError;

    fn try_from(map: BTreeMap<Joint, f32>) -> Result<Self, Self::Error> {
        Self::new(map)
    }
}

impl From<JointWeights> for BTreeMap<Joint, f32> {
    fn from(table: JointWeights) -> Self {
        Joint::all()
            .iter()
            .map(|joint| (*joint, table.weight(*joint)))
            .collect()
    }
}

/// Scoring strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Weighted planar joint distance against the reference, best match
    #[default]
    WeightedDistance,
    /// How much of the body is framed; ignores the reference
    VisibilityCompleteness,
    /// Raised-wrist heuristic; ignores the reference
    WristHeight,
}

impl ScoringPolicy {
    /// Whether this policy compares against reference poses
    pub fn needs_reference(self) -> bool {
        matches!(self, ScoringPolicy::WeightedDistance)
    }
}

/// Similarity between one landmark pair, 100 at distance 0, 0 at TOLERANCE
#[inline]
pub fn point_similarity(distance: f32) -> f32 {
    (MAX_SCORE * (1.0 - distance / TOLERANCE)).max(0.0)
}

/// Weighted joint-distance score of `detected` against a single pose
///
/// Joints not visible in both poses are skipped entirely.
pub fn weighted_distance_score(
    detected: &Pose,
    reference: &Pose,
    weights: &JointWeights,
    joints: &[Joint],
) -> f32 {
    let mut total = 0.0;
    let mut weight_sum = 0.0;

    for &joint in joints {
        let (Some(current), Some(target)) = (detected.get(joint), reference.get(joint)) else {
            continue;
        };
        if !(current.is_visible(MATCH_VISIBILITY) && target.is_visible(MATCH_VISIBILITY)) {
            continue;
        }

        let weight = weights.weight(joint);
        total += point_similarity(current.planar_distance(target)) * weight;
        weight_sum += weight;
    }

    if weight_sum > 0.0 {
        (total / weight_sum * BOOST).min(MAX_SCORE)
    } else {
        0.0
    }
}

/// Best weighted-distance score over every pose in the set
///
/// None when the set is empty.
pub fn best_match_score(
    detected: &Pose,
    reference: &ReferencePoseSet,
    weights: &JointWeights,
    joints: &[Joint],
) -> Option<f32> {
    reference
        .poses()
        .map(|pose| weighted_distance_score(detected, pose, weights, joints))
        .reduce(f32::max)
}

/// Framing score: share of `required` joints visible above 0.7, halved below 80
pub fn visibility_completeness_score(detected: &Pose, required: &[Joint]) -> f32 {
    if required.is_empty() {
        return 0.0;
    }

    let visible = required
        .iter()
        .filter(|joint| {
            detected
                .get(**joint)
                .is_some_and(|lm| lm.is_visible(FRAMING_VISIBILITY))
        })
        .count();

    let percentage = visible as f32 / required.len() as f32 * MAX_SCORE;
    if percentage < FRAMING_PASS {
        (percentage / 2.0).round()
    } else {
        percentage.round()
    }
}

/// Raised-wrist heuristic: 30 per visible raised wrist, +10 for both raised
pub fn wrist_height_score(detected: &Pose) -> f32 {
    let left = detected.get(Joint::LeftWrist);
    let right = detected.get(Joint::RightWrist);
    let raised = |lm: &crate::Landmark| lm.y < 0.5;

    let mut score = 0.0;
    for wrist in [left, right].into_iter().flatten() {
        if wrist.is_visible(MATCH_VISIBILITY) && raised(wrist) {
            score += 30.0;
        }
    }
    if let (Some(l), Some(r)) = (left, right) {
        if raised(l) && raised(r) {
            score += 10.0;
        }
    }
    score
}

/// Raw score producer for one configured policy
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    policy: ScoringPolicy,
    weights: JointWeights,
    joints: Vec<Joint>,
}

impl SimilarityScorer {
    /// Scorer over all joints with the default weight table
    pub fn new(policy: ScoringPolicy) -> Self {
        Self {
            policy,
            weights: JointWeights::default(),
            joints: Joint::all().to_vec(),
        }
    }

    pub fn with_weights(mut self, weights: JointWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Restrict the joints that are compared (or required, when framing)
    pub fn with_joints(mut self, joints: Vec<Joint>) -> Self {
        self.joints = joints;
        self
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Raw score in [0, 100]
    ///
    /// None when the policy needs a reference and the set is empty; the
    /// caller decides the fallback. An empty detected pose scores 0.
    pub fn score(&self, detected: &Pose, reference: &ReferencePoseSet) -> Option<f32> {
        if self.policy.needs_reference() && reference.is_empty() {
            return None;
        }
        if detected.is_empty() {
            return Some(0.0);
        }

        let raw = match self.policy {
            ScoringPolicy::WeightedDistance => {
                best_match_score(detected, reference, &self.weights, &self.joints)?
            }
            ScoringPolicy::VisibilityCompleteness => {
                visibility_completeness_score(detected, &self.joints)
            }
            ScoringPolicy::WristHeight => wrist_height_score(detected),
        };
        Some(raw.clamp(0.0, MAX_SCORE))
    }

    /// Framing percentage regardless of policy, for the "step back" hint
    pub fn framing(&self, detected: &Pose) -> f32 {
        visibility_completeness_score(detected, &self.joints)
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(ScoringPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Landmark, ReferencePose};
    use proptest::prelude::*;

    fn standing() -> Pose {
        let coords = [
            (0.50, 0.10), // Nose
            (0.40, 0.25),
            (0.60, 0.25), // Shoulders
            (0.35, 0.40),
            (0.65, 0.40), // Elbows
            (0.33, 0.55),
            (0.67, 0.55), // Wrists
            (0.45, 0.55),
            (0.55, 0.55), // Hips
            (0.45, 0.75),
            (0.55, 0.75), // Knees
            (0.45, 0.95),
            (0.55, 0.95), // Ankles
        ];
        let mut pose = Pose::new();
        for (joint, (x, y)) in Joint::all().iter().zip(coords) {
            pose.set(*joint, Landmark::visible(x, y));
        }
        pose
    }

    fn shifted(pose: &Pose, dx: f32) -> Pose {
        let mut out = Pose::new();
        for (joint, lm) in pose.iter() {
            out.set(joint, Landmark::new(lm.x + dx, lm.y, lm.z, lm.visibility));
        }
        out
    }

    fn weighted(detected: &Pose, reference: &Pose) -> f32 {
        weighted_distance_score(detected, reference, &JointWeights::default(), Joint::all())
    }

    #[test]
    fn test_identical_pose_scores_100() {
        let pose = standing();
        assert_eq!(weighted(&pose, &pose), 100.0);
    }

    #[test]
    fn test_far_pose_scores_0() {
        let pose = standing();
        assert_eq!(weighted(&shifted(&pose, 0.6), &pose), 0.0);
        assert_eq!(weighted(&shifted(&pose, 0.9), &pose), 0.0);
    }

    #[test]
    fn test_point_similarity_edges() {
        assert_eq!(point_similarity(0.0), 100.0);
        assert_eq!(point_similarity(TOLERANCE), 0.0);
        assert_eq!(point_similarity(2.0), 0.0);
        assert!((point_similarity(0.1) - 80.0).abs() < 1e-3);
    }

    #[test]
    fn test_partial_distance_is_linear_then_boosted() {
        let pose = standing();
        // distance 0.25 => 50 per joint => 50 * 1.2
        let score = weighted(&shifted(&pose, 0.25), &pose);
        assert!((score - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_invisible_joints_are_skipped() {
        let reference = standing();
        let mut detected = standing();
        // Far away but hidden: contributes neither numerator nor denominator
        detected.set(Joint::LeftWrist, Landmark::new(0.9, 0.9, 0.0, 0.4));
        assert_eq!(weighted(&detected, &reference), 100.0);
    }

    #[test]
    fn test_no_visible_pairs_scores_0() {
        let reference = standing();
        let mut detected = Pose::new();
        for (joint, lm) in reference.iter() {
            detected.set(joint, Landmark::new(lm.x, lm.y, 0.0, 0.5));
        }
        assert_eq!(weighted(&detected, &reference), 0.0);
    }

    #[test]
    fn test_weights_bias_the_mean() {
        let reference = standing();
        let mut detected = standing();
        let wrist = reference.get(Joint::LeftWrist).unwrap();
        detected.set(Joint::LeftWrist, Landmark::visible(wrist.x + 0.5, wrist.y));

        let only_wrists = [Joint::LeftWrist, Joint::RightWrist];
        let even = weighted_distance_score(&detected, &reference, &JointWeights::uniform(), &only_wrists);
        let heavy_left = JointWeights::new([(Joint::LeftWrist, 3.0)]).unwrap();
        let biased = weighted_distance_score(&detected, &reference, &heavy_left, &only_wrists);

        assert!((even - 60.0).abs() < 1e-3);
        assert!((biased - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_invalid_weights_are_rejected() {
        assert!(JointWeights::new([(Joint::Nose, 0.0)]).is_err());
        assert!(JointWeights::new([(Joint::Nose, -2.0)]).is_err());
        assert!(JointWeights::new([(Joint::Nose, f32::NAN)]).is_err());

        let table = JointWeights::new([(Joint::Nose, 4.0)]).unwrap();
        assert_eq!(table.weight(Joint::Nose), 4.0);
        assert_eq!(table.weight(Joint::LeftAnkle), 1.0);
    }

    #[test]
    fn test_weights_from_json() {
        let table: JointWeights = serde_json::from_str(r#"{"LEFT_WRIST": 5.0}"#).unwrap();
        assert_eq!(table.weight(Joint::LeftWrist), 5.0);
        assert!(serde_json::from_str::<JointWeights>(r#"{"LEFT_WRIST": 0}"#).is_err());
    }

    #[test]
    fn test_best_match_takes_maximum_not_average() {
        let target = standing();
        let far = shifted(&target, 0.6);
        let set = ReferencePoseSet::key_poses(vec![
            ReferencePose { name: Some("far".into()), pose: far },
            ReferencePose { name: Some("near".into()), pose: target.clone() },
        ]);

        let scorer = SimilarityScorer::new(ScoringPolicy::WeightedDistance);
        assert_eq!(scorer.score(&target, &set), Some(100.0));
    }

    #[test]
    fn test_missing_reference_yields_none() {
        let scorer = SimilarityScorer::new(ScoringPolicy::WeightedDistance);
        assert_eq!(scorer.score(&standing(), &ReferencePoseSet::empty()), None);
    }

    #[test]
    fn test_empty_detected_pose_scores_0() {
        let set = ReferencePoseSet::single(standing());
        for policy in [
            ScoringPolicy::WeightedDistance,
            ScoringPolicy::VisibilityCompleteness,
            ScoringPolicy::WristHeight,
        ] {
            let scorer = SimilarityScorer::new(policy);
            assert_eq!(scorer.score(&Pose::new(), &set), Some(0.0));
        }
    }

    #[test]
    fn test_visibility_completeness_penalty() {
        let mut pose = standing();
        for joint in [Joint::LeftAnkle, Joint::RightAnkle, Joint::RightKnee] {
            let lm = *pose.get(joint).unwrap();
            pose.set(joint, Landmark::new(lm.x, lm.y, 0.0, 0.7));
        }
        // 10 of 13 => 76.9% => halved => 38
        let scorer = SimilarityScorer::new(ScoringPolicy::VisibilityCompleteness);
        assert_eq!(scorer.score(&pose, &ReferencePoseSet::empty()), Some(38.0));
    }

    #[test]
    fn test_visibility_completeness_full_and_passing() {
        let scorer = SimilarityScorer::new(ScoringPolicy::VisibilityCompleteness);
        assert_eq!(scorer.score(&standing(), &ReferencePoseSet::empty()), Some(100.0));

        let mut pose = standing();
        pose.remove(Joint::LeftAnkle);
        pose.remove(Joint::RightAnkle);
        // 11 of 13 => 84.6% => passes => 85
        assert_eq!(scorer.score(&pose, &ReferencePoseSet::empty()), Some(85.0));
    }

    #[test]
    fn test_wrist_height() {
        let down = standing();
        assert_eq!(wrist_height_score(&down), 0.0);

        let mut one_up = standing();
        one_up.set(Joint::LeftWrist, Landmark::visible(0.3, 0.2));
        assert_eq!(wrist_height_score(&one_up), 30.0);

        let mut both_up = one_up.clone();
        both_up.set(Joint::RightWrist, Landmark::visible(0.7, 0.2));
        assert_eq!(wrist_height_score(&both_up), 70.0);

        // Bonus still counts a raised wrist the detector is unsure about
        let mut unsure = both_up.clone();
        unsure.set(Joint::RightWrist, Landmark::new(0.7, 0.2, 0.0, 0.3));
        assert_eq!(wrist_height_score(&unsure), 40.0);
    }

    fn pose_strategy() -> impl Strategy<Value = Pose> {
        prop::collection::vec((0.0f32..1.0, 0.0f32..1.0, 0.0f32..1.0), Joint::COUNT).prop_map(
            |coords| {
                let mut pose = Pose::new();
                for (joint, (x, y, v)) in Joint::all().iter().zip(coords) {
                    pose.set(*joint, Landmark::new(x, y, 0.0, v));
                }
                pose
            },
        )
    }

    proptest! {
        #[test]
        fn prop_score_is_bounded(detected in pose_strategy(), reference in pose_strategy()) {
            let score = weighted(&detected, &reference);
            prop_assert!((0.0..=100.0).contains(&score));
        }

        #[test]
        fn prop_identical_visible_pose_scores_100(
            coords in prop::collection::vec((0.0f32..1.0, 0.0f32..1.0), Joint::COUNT)
        ) {
            let mut pose = Pose::new();
            for (joint, (x, y)) in Joint::all().iter().zip(coords) {
                pose.set(*joint, Landmark::visible(x, y));
            }
            prop_assert_eq!(weighted(&pose, &pose), 100.0);
        }

        #[test]
        fn prop_closer_joint_never_lowers_score(
            reference in pose_strategy(),
            detected in pose_strategy(),
            joint_idx in 0usize..Joint::COUNT,
            t in 0.0f32..1.0,
        ) {
            let joint = Joint::all()[joint_idx];
            let target = *reference.get(joint).unwrap();
            let current = *detected.get(joint).unwrap();

            // Move the joint part of the way toward its target
            let mut closer = detected.clone();
            closer.set(joint, Landmark::new(
                current.x + (target.x - current.x) * t,
                current.y + (target.y - current.y) * t,
                current.z,
                current.visibility,
            ));

            let before = weighted(&detected, &reference);
            let after = weighted(&closer, &reference);
            prop_assert!(after + 1e-3 >= before);
        }
    }
}
