//! Recording errors
//!
//! Classified failures for a recording session. The fatal kinds move the
//! session into the error state; usage errors leave it untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during recording
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("Screen capture is not supported in this environment: {0}")]
    Unsupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    #[error("Encoder fault: {0}")]
    EncoderFault(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Session is not in replay mode")]
    NotReplayMode,

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Start was cancelled")]
    Cancelled,

    #[error("Recorder service is no longer running")]
    ServiceClosed,
}

/// Coarse classification used for state reporting and error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Unsupported,
    PermissionDenied,
    DeviceUnavailable,
    MicrophoneUnavailable,
    EncoderFault,
    Usage,
}

impl RecordingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordingError::Unsupported(_) => ErrorKind::Unsupported,
            RecordingError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            RecordingError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            RecordingError::MicrophoneUnavailable(_) => ErrorKind::MicrophoneUnavailable,
            RecordingError::EncoderFault(_) => ErrorKind::EncoderFault,
            _ => ErrorKind::Usage,
        }
    }

    /// Whether this error ends the session attempt (state -> error)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Unsupported
                | ErrorKind::PermissionDenied
                | ErrorKind::DeviceUnavailable
                | ErrorKind::EncoderFault
        )
    }

    /// Message shown to the user; distinguishes refused from unsupported
    /// from unexpected failures.
    pub fn user_message(&self) -> String {
        match self {
            RecordingError::Unsupported(_) => {
                "Screen recording is not supported here. Try a different browser or host."
                    .to_string()
            }
            RecordingError::PermissionDenied(_) => {
                "Screen capture permission was refused. Start again and allow sharing.".to_string()
            }
            RecordingError::DeviceUnavailable(detail) => {
                format!("Recording could not be started: {}", detail)
            }
            RecordingError::MicrophoneUnavailable(_) => {
                "Microphone unavailable, recording without it.".to_string()
            }
            RecordingError::EncoderFault(detail) => {
                format!("Recording stopped unexpectedly: {}", detail)
            }
            other => other.to_string(),
        }
    }
}

/// Result type for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;
