//! Session events
//!
//! Host callbacks (stream granted, chunk available, stream ended, encoder
//! fault) and timers are turned into [`SessionEvent`]s and delivered over a
//! single channel, so they reach the coordinator one at a time and in
//! capture order. Outward notifications go out as [`RecordingEvent`]s.

use super::error::{ErrorKind, RecordingResult};
use super::state::{RecordingMode, SessionState, SessionSummary, TrackSet};
use crate::capture::AcquiredMedia;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Input to the coordinator, tagged with the start attempt it belongs to
#[derive(Debug)]
pub enum SessionEvent {
    /// Capture acquisition finished
    Acquired {
        generation: u64,
        outcome: RecordingResult<AcquiredMedia>,
    },
    /// Encoder produced a timeslice
    Chunk {
        generation: u64,
        data: Vec<u8>,
        duration: Duration,
    },
    /// Host ended the capture stream (its own "stop sharing" control)
    StreamEnded { generation: u64 },
    /// Encoder cannot continue
    EncoderFault { generation: u64, message: String },
    /// Finite recording reached its time limit
    CountdownElapsed { generation: u64 },
}

impl SessionEvent {
    pub fn generation(&self) -> u64 {
        match self {
            SessionEvent::Acquired { generation, .. }
            | SessionEvent::Chunk { generation, .. }
            | SessionEvent::StreamEnded { generation }
            | SessionEvent::EncoderFault { generation, .. }
            | SessionEvent::CountdownElapsed { generation } => *generation,
        }
    }
}

/// Sending half handed to streams, encoders and timers of one session
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn chunk(&self, data: Vec<u8>, duration: Duration) {
        self.send(SessionEvent::Chunk {
            generation: self.generation,
            data,
            duration,
        });
    }

    pub fn stream_ended(&self) {
        self.send(SessionEvent::StreamEnded {
            generation: self.generation,
        });
    }

    pub fn encoder_fault(&self, message: impl Into<String>) {
        self.send(SessionEvent::EncoderFault {
            generation: self.generation,
            message: message.into(),
        });
    }

    pub fn countdown_elapsed(&self) {
        self.send(SessionEvent::CountdownElapsed {
            generation: self.generation,
        });
    }

    fn send(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Session event dropped, recorder is gone");
        }
    }
}

/// Events emitted to subscribers (status text, notifications)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type")]
pub enum RecordingEvent {
    StateChanged { state: SessionState },
    Started {
        session_id: Uuid,
        mode: RecordingMode,
        tracks: TrackSet,
        mime_type: String,
    },
    /// Non-fatal problem, e.g. microphone unavailable
    Warning { message: String },
    ChunkCaptured { sequence: u64, buffered_ms: u64 },
    Stopped {
        outcome: String,
        summary: Option<SessionSummary>,
    },
    ClipSaved { file_name: String, duration_ms: u64 },
    Error { kind: ErrorKind, message: String },
}
