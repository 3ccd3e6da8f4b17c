//! Capture acquisition
//!
//! Host traits for screen and microphone streams, the acquisition sequence,
//! and an in-process synthetic host.

pub mod acquire;
pub mod synthetic;
pub mod traits;

pub use acquire::{acquire_media, AcquiredMedia};
pub use synthetic::{Grant, SyntheticHost};
pub use traits::{AcquireError, CaptureBackend, CaptureConstraints, MediaStream, StreamKind};
