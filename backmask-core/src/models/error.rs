use thiserror::Error;

/// Errors raised by the recorder, player, reverser and session interlock.
///
/// Runtime failures of background work are delivered through the same
/// listener callbacks as success, so the type is `Clone`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("invalid audio config: {0}")]
    InvalidConfig(String),

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("file access failed: {0}")]
    FileAccess(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("config mismatch: {0}")]
    ConfigMismatch(String),

    #[error("background thread failed: {0}")]
    Thread(String),
}
