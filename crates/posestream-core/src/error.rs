//! Error types for POSESTREAM

use thiserror::Error;

/// Core POSESTREAM errors
#[derive(Error, Debug)]
pub enum PoseError {
    // Producer errors
    #[error("Invalid joint: {0}")]
    InvalidJoint(String),

    // Wire errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Frame too large: {size} > {max}")]
    FrameTooLarge { size: usize, max: usize },

    // Transport errors
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Transport error: {0}")]
    TransportError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PoseError {
    /// Malformed or truncated input on the wire
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            PoseError::Protocol(_)
                | PoseError::BufferTooShort { .. }
                | PoseError::FrameTooLarge { .. }
        )
    }
}

/// Result type for POSESTREAM operations
pub type PoseResult<T> = Result<T, PoseError>;
