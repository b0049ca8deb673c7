//! Error types and handling
//!
//! Common error types used across the replay buffer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Buffer-wide error type
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Buffer is not recording")]
    NotRecording,

    #[error("No segments available in the buffer")]
    EmptyWindow,

    #[error("No segment files found on disk")]
    MissingSegments,

    #[error("Assembly error: {0}")]
    Assembly(String),

    #[error("Previous capture loop is still running")]
    RecorderBusy,
}

impl ReplayError {
    /// Stable machine-readable code for the caller-facing layer
    pub fn code(&self) -> &'static str {
        match self {
            ReplayError::Io(_) => "IO_ERROR",
            ReplayError::Serialization(_) => "SERIALIZATION_ERROR",
            ReplayError::Configuration(_) => "CONFIGURATION_ERROR",
            ReplayError::NotRecording => "NOT_RECORDING",
            ReplayError::EmptyWindow => "EMPTY_WINDOW",
            ReplayError::MissingSegments => "MISSING_SEGMENTS",
            ReplayError::Assembly(_) => "ASSEMBLY_ERROR",
            ReplayError::RecorderBusy => "RECORDER_BUSY",
        }
    }

    /// Whether the error is a violated precondition rather than a backend fault
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ReplayError::NotRecording | ReplayError::EmptyWindow | ReplayError::MissingSegments
        )
    }
}

/// Error response for callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<ReplayError> for ErrorResponse {
    fn from(error: ReplayError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using ReplayError
pub type ReplayResult<T> = Result<T, ReplayError>;
