//! Export module
//!
//! Turns captured chunk sequences into downloadable artifacts.

pub mod artifact;
pub mod types;

pub use artifact::{assemble, write_artifact};
pub use types::{Artifact, ArtifactKind, ExportError};
