//! Recording state management
//!
//! Defines the session states, per-session configuration and the outcome
//! of a finished session.

use super::error::{ErrorKind, RecordingError, RecordingResult};
use crate::export::Artifact;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Current state of the recording system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// No session
    #[default]
    Idle,
    /// Waiting for the host to hand over a capture stream
    AwaitingPermission,
    /// Capturing and receiving chunks
    Active,
    /// Session finished normally
    Stopped,
    /// Session attempt failed
    Error,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::AwaitingPermission => write!(f, "awaiting-permission"),
            SessionState::Active => write!(f, "active"),
            SessionState::Stopped => write!(f, "stopped"),
            SessionState::Error => write!(f, "error"),
        }
    }
}

/// What kind of session to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type")]
pub enum RecordingMode {
    /// Discrete recording; `duration_secs == 0` means stop manually
    Regular { duration_secs: u64 },
    /// Continuous capture keeping only the trailing window
    Replay { window_secs: u64 },
}

impl RecordingMode {
    /// Countdown length for finite recordings
    pub fn time_limit(&self) -> Option<Duration> {
        match self {
            RecordingMode::Regular { duration_secs } if *duration_secs > 0 => {
                Some(Duration::from_secs(*duration_secs))
            }
            _ => None,
        }
    }
}

/// Configuration for starting a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    pub mode: RecordingMode,

    /// Whether to ask the host to share system audio with the screen
    #[serde(default)]
    pub capture_system_audio: bool,

    /// Whether to mix in the microphone
    #[serde(default)]
    pub capture_microphone: bool,
}

impl RecordingConfig {
    pub fn manual() -> Self {
        Self {
            mode: RecordingMode::Regular { duration_secs: 0 },
            capture_system_audio: false,
            capture_microphone: false,
        }
    }

    pub fn timed(duration_secs: u64) -> Self {
        Self {
            mode: RecordingMode::Regular { duration_secs },
            ..Self::manual()
        }
    }

    pub fn replay(window_secs: u64) -> Self {
        Self {
            mode: RecordingMode::Replay { window_secs },
            ..Self::manual()
        }
    }

    pub fn with_audio(mut self, system_audio: bool, microphone: bool) -> Self {
        self.capture_system_audio = system_audio;
        self.capture_microphone = microphone;
        self
    }

    pub fn validate(&self) -> RecordingResult<()> {
        if let RecordingMode::Replay { window_secs: 0 } = self.mode {
            return Err(RecordingError::InvalidConfig(
                "replay window must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why an active session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    User,
    /// The host's own "stop sharing" control ended the stream
    HostRevoked,
    TimerExpired,
}

/// Numbers describing a finished session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub reason: StopReason,
    pub chunk_count: usize,
    pub recorded_ms: u64,
}

/// Terminal outcome of a session
#[derive(Debug, Clone)]
pub enum StopOutcome {
    /// Regular recording with data, concatenated into one artifact
    Saved {
        summary: SessionSummary,
        artifact: Artifact,
    },
    /// Stopped before any chunk arrived
    NoData { summary: SessionSummary },
    /// Replay capture ended; its buffer was discarded
    ReplayEnded { summary: SessionSummary },
    /// Stopped while still waiting for the capture stream
    Cancelled,
}

impl StopOutcome {
    pub fn summary(&self) -> Option<&SessionSummary> {
        match self {
            StopOutcome::Saved { summary, .. }
            | StopOutcome::NoData { summary }
            | StopOutcome::ReplayEnded { summary } => Some(summary),
            StopOutcome::Cancelled => None,
        }
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            StopOutcome::Saved { artifact, .. } => Some(artifact),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StopOutcome::Saved { .. } => "saved",
            StopOutcome::NoData { .. } => "no-data",
            StopOutcome::ReplayEnded { .. } => "replay-ended",
            StopOutcome::Cancelled => "cancelled",
        }
    }
}

/// Which tracks the live session is encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSet {
    pub video: bool,
    pub system_audio: bool,
    pub microphone: bool,
}

/// Snapshot of the recorder for status displays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderStatus {
    pub state: SessionState,
    pub session_id: Option<Uuid>,
    pub mode: Option<RecordingMode>,
    pub tracks: TrackSet,
    pub mime_type: Option<String>,
    pub chunk_count: usize,
    pub buffered_ms: u64,
    pub elapsed_ms: u64,
    /// Time left on a finite recording
    pub remaining_ms: Option<u64>,
    pub warnings: Vec<String>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
}
