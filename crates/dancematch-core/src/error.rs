//! Error types for DanceMatch

use thiserror::Error;

/// Core DanceMatch errors
#[derive(Error, Debug)]
pub enum DanceError {
    // Capture errors
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Pose detector failed: {0}")]
    DetectorFailed(String),

    #[error("Frame buffer mismatch: expected {expected} bytes, got {actual}")]
    FrameBufferMismatch { expected: usize, actual: usize },

    // Reference data errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Reference data contains no poses")]
    EmptyReference,

    #[error("Invalid pose snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Unknown joint: {0}")]
    UnknownJoint(String),

    // Scoring errors
    #[error("Invalid weight {weight} for joint {joint}: weights must be positive")]
    InvalidWeight { joint: String, weight: f32 },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Result type for DanceMatch operations
pub type DanceResult<T> = Result<T, DanceError>;
