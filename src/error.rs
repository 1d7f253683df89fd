//! Error types for the control surface and the sink collaborator.
//!
//! Only initialisation and control calls return errors. Failures inside the
//! running loops are logged and confined to the loop that hit them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Failed to open stream {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("No video stream found in {0}")]
    NoVideoStream(String),

    #[error("No decoder available for {0}")]
    CodecUnavailable(String),

    #[error("Invalid stream parameters: {0}")]
    InvalidStream(String),

    #[error("Player has no open stream; call init() first")]
    NotInitialized,

    #[error("Player has been released")]
    Released,

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single failed hand-off to the frame sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink runtime binding unavailable: {0}")]
    BindingUnavailable(String),

    #[error("Frame delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Sink panicked: {0}")]
    Panicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
