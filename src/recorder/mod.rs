//! Recording system module
//!
//! This module implements the session lifecycle:
//! - Chunk sequences and the instant replay ring buffer
//! - The session state machine and the coordinator that drives it
//! - The recorder service that serializes commands and host events

pub mod chunk;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod machine;
pub mod replay;
pub mod service;
pub mod session;
pub mod state;

pub use chunk::{Chunk, ChunkSequence};
pub use coordinator::RecordingCoordinator;
pub use error::{ErrorKind, RecordingError, RecordingResult};
pub use events::{EventSink, RecordingEvent, SessionEvent};
pub use replay::ReplayBuffer;
pub use service::{spawn_recorder, RecorderHandle};
pub use state::{
    RecorderStatus, RecordingConfig, RecordingMode, SessionState, StopOutcome, StopReason,
};
