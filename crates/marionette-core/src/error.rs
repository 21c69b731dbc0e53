use thiserror::Error;

use crate::types::BoneIndex;

/// Top-level error type for the Marionette crates.
#[derive(Debug, Error)]
pub enum MarionetteError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),
}

/// Configuration errors, raised while loading or validating node configs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid precision: {0} (must be > 0)")]
    InvalidPrecision(f32),

    #[error("max_iterations must be >= 1")]
    ZeroIterations,

    #[error("Inverted constraint interval: min {min} > max {max}")]
    InvertedInterval { min: f32, max: f32 },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors detected at validity-check or evaluation time.
///
/// None of these abort the update pipeline: a node that hits one produces
/// no pose change for the frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Bone not found: {0}")]
    BoneNotFound(String),

    #[error("Bone {0} is not present in the pose")]
    MissingBone(BoneIndex),

    #[error("Bone {child} does not descend from {parent}")]
    BrokenChain { parent: String, child: String },

    #[error("Chain too short: {len} links (need at least {min})")]
    ChainTooShort { len: usize, min: usize },

    #[error("Socket not found: {0}")]
    SocketNotFound(String),

    #[error("Skeleton forward and up axes are not orthogonal")]
    DegenerateAxes,

    #[error("Degenerate spine: torso pivot coincides with neck")]
    DegenerateSpine,

    #[error("Invalid precision: {0} (must be > 0)")]
    InvalidPrecision(f32),

    #[error("Invalid delta time: {0} (must be >= 0)")]
    InvalidDeltaTime(f32),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
