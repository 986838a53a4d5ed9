//! Runtime configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dancematch_core::{DanceError, DanceResult};
use dancematch_pose::{Joint, JointWeights, ScoreSmoother, ScoringPolicy, SimilarityScorer};
use serde::{Deserialize, Deserializer};

use crate::observability::LogFormat;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "DANCEMATCH_CONFIG";

/// Largest accepted `sample_capacity`
pub const MAX_SAMPLE_CAPACITY: usize = 4096;

/// What to publish when a score cannot be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Feed a raw score of 0 through the smoother
    Zero,
    /// Leave the displayed score untouched
    HoldPrevious,
}

/// Scorer settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub policy: ScoringPolicy,
    pub weights: JointWeights,
    /// Joints compared (or required for framing); all when unset
    pub joints: Option<Vec<Joint>>,
    /// Used when the policy needs a reference and none exists
    pub no_reference: Fallback,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            policy: ScoringPolicy::default(),
            weights: JointWeights::default(),
            joints: None,
            no_reference: Fallback::Zero,
        }
    }
}

impl ScoringConfig {
    pub fn build_scorer(&self) -> SimilarityScorer {
        let scorer = SimilarityScorer::new(self.policy).with_weights(self.weights.clone());
        match &self.joints {
            Some(joints) => scorer.with_joints(joints.clone()),
            None => scorer,
        }
    }
}

/// Width:height ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Vertical 9:16
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };
}

/// HTTP glue settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DanceConfig {
    /// Reference pose file; none means no reference (or lazy seeding)
    pub reference_path: Option<PathBuf>,
    pub scoring: ScoringConfig,
    pub smoothing: ScoreSmoother,
    /// Countdown before dancing, e.g. "5s"; "0s" starts dancing at once
    #[serde(deserialize_with = "deserialize_duration")]
    pub countdown: Duration,
    /// Use the first detected pose as the reference when none is loaded
    pub lazy_seed: bool,
    /// Centered crop before detection; none keeps the camera framing
    pub crop_aspect: Option<AspectRatio>,
    /// Sleep when the camera has no frame ready
    #[serde(deserialize_with = "deserialize_duration")]
    pub idle_delay: Duration,
    /// Longest a streaming consumer waits for one frame
    #[serde(deserialize_with = "deserialize_duration")]
    pub frame_wait: Duration,
    /// Recent score samples kept while dancing
    pub sample_capacity: usize,
    /// Framing percentage below which the "step back" warning shows
    pub step_back_below: f32,
    /// Used when no body is detected in a frame
    pub no_detection: Fallback,
    pub http: HttpConfig,
    pub log_format: LogFormat,
}

impl Default for DanceConfig {
    fn default() -> Self {
        Self {
            reference_path: None,
            scoring: ScoringConfig::default(),
            smoothing: ScoreSmoother::default(),
            countdown: Duration::from_secs(5),
            lazy_seed: false,
            crop_aspect: Some(AspectRatio::PORTRAIT),
            idle_delay: Duration::from_millis(10),
            frame_wait: Duration::from_millis(500),
            sample_capacity: 1,
            step_back_below: 80.0,
            no_detection: Fallback::HoldPrevious,
            http: HttpConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl DanceConfig {
    /// Parse and validate JSON text
    pub fn from_json(json: &str) -> DanceResult<Self> {
        let config: DanceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> DanceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load from `$DANCEMATCH_CONFIG` if set, defaults otherwise
    pub fn from_env() -> DanceResult<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> DanceResult<()> {
        self.smoothing.validate()?;

        if let Some(aspect) = self.crop_aspect {
            if aspect.width == 0 || aspect.height == 0 {
                return Err(DanceError::InvalidConfig(format!(
                    "crop_aspect {}:{} must be non-zero",
                    aspect.width, aspect.height
                )));
            }
        }
        if !(1..=MAX_SAMPLE_CAPACITY).contains(&self.sample_capacity) {
            return Err(DanceError::InvalidConfig(format!(
                "sample_capacity must be within 1..={MAX_SAMPLE_CAPACITY}, got {}",
                self.sample_capacity
            )));
        }
        if self.idle_delay.is_zero() {
            return Err(DanceError::InvalidConfig(
                "idle_delay must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.step_back_below) {
            return Err(DanceError::InvalidConfig(format!(
                "step_back_below must be within 0..=100, got {}",
                self.step_back_below
            )));
        }
        if matches!(&self.scoring.joints, Some(joints) if joints.is_empty()) {
            return Err(DanceError::InvalidConfig(
                "scoring.joints must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config = DanceConfig::from_json("{}").unwrap();
        assert_eq!(config.countdown, Duration::from_secs(5));
        assert_eq!(config.idle_delay, Duration::from_millis(10));
        assert_eq!(config.crop_aspect, Some(AspectRatio::PORTRAIT));
        assert_eq!(config.sample_capacity, 1);
        assert_eq!(config.no_detection, Fallback::HoldPrevious);
        assert_eq!(config.scoring.no_reference, Fallback::Zero);
        assert!(!config.lazy_seed);
    }

    #[test]
    fn test_full_config() {
        let json = r#"{
            "reference_path": "reference.json",
            "scoring": {
                "policy": "visibility_completeness",
                "weights": { "LEFT_WRIST": 3.0 },
                "joints": ["LEFT_WRIST", "RIGHT_WRIST"],
                "no_reference": "hold_previous"
            },
            "smoothing": { "up_rate": 2.0, "down_rate": 1.0 },
            "countdown": "3s",
            "lazy_seed": true,
            "crop_aspect": null,
            "idle_delay": "25ms",
            "sample_capacity": 32,
            "no_detection": "zero",
            "http": { "bind": "127.0.0.1:8080" },
            "log_format": "json"
        }"#;

        let config = DanceConfig::from_json(json).unwrap();
        assert_eq!(config.reference_path, Some(PathBuf::from("reference.json")));
        assert_eq!(config.scoring.policy, ScoringPolicy::VisibilityCompleteness);
        assert_eq!(config.scoring.weights.weight(Joint::LeftWrist), 3.0);
        assert_eq!(config.smoothing, ScoreSmoother::gentle());
        assert_eq!(config.countdown, Duration::from_secs(3));
        assert_eq!(config.idle_delay, Duration::from_millis(25));
        assert_eq!(config.crop_aspect, None);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.http.bind.port(), 8080);

        let scorer = config.scoring.build_scorer();
        assert_eq!(scorer.joints(), &[Joint::LeftWrist, Joint::RightWrist]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(DanceConfig::from_json(r#"{"countdown": "soon"}"#).is_err());
        assert!(DanceConfig::from_json(r#"{"smoothing": {"up_rate": -1.0, "down_rate": 1.0}}"#).is_err());
        assert!(DanceConfig::from_json(r#"{"crop_aspect": {"width": 0, "height": 16}}"#).is_err());
        assert!(DanceConfig::from_json(r#"{"sample_capacity": 0}"#).is_err());
        assert!(DanceConfig::from_json(r#"{"sample_capacity": 4097}"#).is_err());
        assert!(DanceConfig::from_json(r#"{"sample_capacity": 18446744073709551615}"#).is_err());
        assert!(DanceConfig::from_json(r#"{"idle_delay": "0s"}"#).is_err());
        assert!(DanceConfig::from_json(r#"{"scoring": {"joints": []}}"#).is_err());
        assert!(DanceConfig::from_json(r#"{"scoring": {"weights": {"NOSE": 0}}}"#).is_err());
    }

    #[test]
    fn test_largest_sample_capacity_is_accepted() {
        let config = DanceConfig::from_json(r#"{"sample_capacity": 4096}"#).unwrap();
        assert_eq!(config.sample_capacity, MAX_SAMPLE_CAPACITY);
    }

    #[test]
    fn test_zero_countdown_parses() {
        let config = DanceConfig::from_json(r#"{"countdown": "0s"}"#).unwrap();
        assert!(config.countdown.is_zero());
    }
}
