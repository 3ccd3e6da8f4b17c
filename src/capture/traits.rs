//! Capture trait definitions
//!
//! Host-agnostic traits for acquiring capture streams. A host (browser
//! bridge, native platform, or the synthetic host) implements these.

use crate::recorder::error::RecordingError;
use crate::recorder::events::EventSink;
use crate::recorder::state::RecordingConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to ask the host for when acquiring the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConstraints {
    /// Always true; a capture without video is never requested
    pub video: bool,

    /// Whether the shared source should include system audio
    pub system_audio: bool,
}

impl From<&RecordingConfig> for CaptureConstraints {
    fn from(config: &RecordingConfig) -> Self {
        Self {
            video: true,
            system_audio: config.capture_system_audio,
        }
    }
}

/// Classified acquisition failure reported by the host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    #[error("permission denied: {0}")]
    Denied(String),

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("acquisition failed: {0}")]
    Failed(String),
}

impl From<AcquireError> for RecordingError {
    fn from(error: AcquireError) -> Self {
        match error {
            AcquireError::Denied(detail) => RecordingError::PermissionDenied(detail),
            AcquireError::Unsupported(detail) => RecordingError::Unsupported(detail),
            AcquireError::Failed(detail) => RecordingError::DeviceUnavailable(detail),
        }
    }
}

/// Kind of live stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Display,
    Microphone,
}

/// A live capture stream holding host hardware
pub trait MediaStream: Send + Sync {
    /// Host-assigned identifier
    fn id(&self) -> &str;

    fn kind(&self) -> StreamKind;

    fn has_video(&self) -> bool;

    fn has_audio(&self) -> bool;

    /// Register for the host's "stream ended" notification
    fn watch_ended(&mut self, sink: EventSink);

    /// Release the underlying hardware. Must be idempotent.
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// Host capture acquisition
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Ask the host for a screen capture stream
    async fn acquire_display(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, AcquireError>;

    /// Ask the host for a microphone stream
    async fn acquire_microphone(&self) -> Result<Box<dyn MediaStream>, AcquireError>;
}
