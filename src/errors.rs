//! Error taxonomy for the whole crate

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SweepError>;

/// Everything that can go wrong during a sweep run.
///
/// `Configuration`, `InvalidRange`, `Precondition` and `UnsupportedMode` are
/// fatal and abort the run before (or instead of) touching any device.
/// `Hardware` aborts the current variation only; the orchestrator logs it and
/// moves on, unless it happens on the very first variation.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("hardware error on {device}: {reason}")]
    Hardware { device: String, reason: String },
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SweepError {
    /// Shorthand for the facade implementations.
    pub fn hardware(device: impl Into<String>, reason: impl Into<String>) -> Self {
        SweepError::Hardware {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Hardware errors are recoverable at the variation level, everything
    /// else kills the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SweepError::Hardware { .. })
    }
}
