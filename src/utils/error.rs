//! Error types and handling
//!
//! Application-level error type and the serializable error response handed
//! to whatever presents the recorder.

use crate::config::ConfigError;
use crate::export::ExportError;
use crate::recorder::error::RecordingError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Error response for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

fn recording_code(error: &RecordingError) -> &'static str {
    match error {
        RecordingError::Unsupported(_) => "UNSUPPORTED",
        RecordingError::PermissionDenied(_) => "PERMISSION_DENIED",
        RecordingError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
        RecordingError::MicrophoneUnavailable(_) => "MICROPHONE_UNAVAILABLE",
        RecordingError::EncoderFault(_) => "ENCODER_FAULT",
        RecordingError::AlreadyRecording => "ALREADY_RECORDING",
        RecordingError::NotRecording => "NOT_RECORDING",
        RecordingError::NotReplayMode => "NOT_REPLAY_MODE",
        RecordingError::InvalidConfig(_) => "INVALID_CONFIG",
        RecordingError::Cancelled => "CANCELLED",
        RecordingError::ServiceClosed => "SERVICE_CLOSED",
    }
}

impl From<&RecordingError> for ErrorResponse {
    fn from(error: &RecordingError) -> Self {
        ErrorResponse {
            code: recording_code(error).to_string(),
            message: error.user_message(),
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        if let AppError::Recording(recording) = &error {
            return ErrorResponse::from(recording);
        }
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Export(_) => "EXPORT_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Recording(_) => "RECORDING_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}
