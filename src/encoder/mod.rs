//! Encoder boundary
//!
//! The host encoder turns the granted streams into time-sliced chunks and
//! pushes them into the session's [`EventSink`].

pub mod codec;

use crate::capture::AcquiredMedia;
use crate::recorder::events::EventSink;
use std::time::Duration;
use thiserror::Error;

pub use codec::{negotiate_mime_type, CANDIDATE_MIME_TYPES};

/// Encoder setup for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Negotiated container/codec type
    pub mime_type: String,

    /// Interval between chunks
    pub timeslice: Duration,
}

/// Encoder initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncoderError {
    #[error("no supported recording format (tried {0})")]
    NoSupportedType(String),

    #[error("encoder init failed: {0}")]
    Init(String),
}

/// Creates encoders on the host
pub trait EncoderFactory: Send + Sync {
    /// Whether the host can encode `mime_type`
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Start encoding `media`; chunks and faults are reported through `sink`
    fn start(
        &self,
        media: &AcquiredMedia,
        options: &EncoderOptions,
        sink: EventSink,
    ) -> Result<Box<dyn MediaEncoder>, EncoderError>;
}

/// A running encoder
pub trait MediaEncoder: Send {
    fn mime_type(&self) -> &str;

    /// Stop producing chunks. Every chunk produced before this returns has
    /// already been handed to the sink. Must be idempotent.
    fn stop(&mut self);
}
