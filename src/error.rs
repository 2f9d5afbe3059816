//! Error types for the vocal range pipeline

use thiserror::Error;

/// Fatal errors that short-circuit the pipeline (spec.md §7)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VocalRangeError {
    /// Input shorter than the minimum analyzable duration
    #[error("input too short: {got_secs:.2}s, need at least {min_secs:.2}s")]
    TooShort { got_secs: f32, min_secs: f32 },

    /// Peak amplitude below the silence floor
    #[error("input is silent: peak amplitude {peak:.6} below floor {floor:.6}")]
    Silent { peak: f32, floor: f32 },

    /// No confidence threshold in the cascade yielded enough frames
    #[error("no singing detected: no confidence threshold yielded >= {min_frames} frames")]
    TrackerFailed { min_frames: usize },

    /// Every tracker frame fell outside the voice range gate
    #[error("all frames outside voice range [{min_hz}, {max_hz}] Hz")]
    OutOfVoiceRange { min_hz: f32, max_hz: f32 },

    /// The asymmetric unrealistic-range trim emptied the frame set
    #[error("no usable range remained after unrealistic-range trim")]
    NoUsableRange,

    /// The caller's audio decode/transcode step failed; surfaced verbatim
    #[error("read failed: {0}")]
    ReadFailed(String),
}

/// Result type for pipeline operations
pub type VocalRangeResult<T> = Result<T, VocalRangeError>;

/// Errors from loading or running the classifier model. Never fatal to the
/// pipeline: callers fall back to the rule engine on any of these (§4.4, §7).
#[derive(Error, Debug)]
pub enum ModelError {
    /// Model file does not exist
    #[error("model not found: {path}")]
    NotFound { path: String },

    /// Model file exists but failed to parse/load
    #[error("failed to load model: {reason}")]
    LoadFailed { reason: String },

    /// Inference call itself failed
    #[error("inference failed: {reason}")]
    InferenceFailed { reason: String },

    /// I/O error while stat-ing or reading the model file
    #[error("model I/O error: {0}")]
    Io(#[from] std::io::Error),
}
