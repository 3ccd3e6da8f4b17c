//! Capture acquisition
//!
//! Runs the two permission prompts in order: the screen first, then the
//! microphone only once the screen stream is granted.

use super::traits::{CaptureBackend, CaptureConstraints, MediaStream};
use crate::recorder::error::{RecordingError, RecordingResult};
use crate::recorder::state::{RecordingConfig, TrackSet};

/// Streams granted for one start attempt
pub struct AcquiredMedia {
    pub display: Box<dyn MediaStream>,
    pub microphone: Option<Box<dyn MediaStream>>,
    /// Non-fatal problems met while acquiring
    pub warnings: Vec<String>,
}

impl AcquiredMedia {
    pub fn tracks(&self) -> TrackSet {
        TrackSet {
            video: self.display.has_video(),
            system_audio: self.display.has_audio(),
            microphone: self.microphone.is_some(),
        }
    }

    /// Stop every stream. Safe to call more than once.
    pub fn release(&mut self) {
        self.display.stop();
        if let Some(mic) = self.microphone.as_mut() {
            mic.stop();
        }
    }
}

impl std::fmt::Debug for AcquiredMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquiredMedia")
            .field("display", &self.display.id())
            .field("microphone", &self.microphone.as_ref().map(|m| m.id().to_string()))
            .field("warnings", &self.warnings)
            .finish()
    }
}

impl Drop for AcquiredMedia {
    fn drop(&mut self) {
        self.release();
    }
}

/// Acquire the screen (and optionally the microphone) for `config`.
///
/// Screen failures are returned classified. A microphone failure only adds
/// a warning and the session continues without it.
pub async fn acquire_media(
    backend: &dyn CaptureBackend,
    config: &RecordingConfig,
) -> RecordingResult<AcquiredMedia> {
    let constraints = CaptureConstraints::from(config);
    tracing::info!(
        "Requesting screen capture (system audio: {})",
        constraints.system_audio
    );

    let display = backend.acquire_display(constraints).await.map_err(|e| {
        tracing::warn!("Screen capture refused: {}", e);
        RecordingError::from(e)
    })?;

    let mut warnings = Vec::new();
    if config.capture_system_audio && !display.has_audio() {
        tracing::warn!("System audio requested but the shared source has no audio track");
        warnings.push("The shared source has no system audio; recording video only.".to_string());
    }

    let microphone = if config.capture_microphone {
        match backend.acquire_microphone().await {
            Ok(mic) => {
                tracing::info!("Microphone acquired: {}", mic.id());
                Some(mic)
            }
            Err(e) => {
                tracing::warn!("Microphone unavailable, continuing without it: {}", e);
                warnings.push(RecordingError::MicrophoneUnavailable(e.to_string()).user_message());
                None
            }
        }
    } else {
        None
    };

    Ok(AcquiredMedia {
        display,
        microphone,
        warnings,
    })
}
