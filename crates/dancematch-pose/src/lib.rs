//! DanceMatch Pose
//!
//! Body pose as comparable STATE. Nothing in this crate touches pixels.
//!
//! # Pipeline
//!
//! Detected Pose → SimilarityScorer → raw score → ScoreSmoother → displayed score
//!
//! The smoother only ever sees two numbers, so scoring policies can change
//! without touching it.

pub mod pose;
pub mod reference;
pub mod score;
pub mod smooth;

pub use pose::*;
pub use reference::*;
pub use score::*;
pub use smooth::*;
