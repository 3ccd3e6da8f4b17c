//! Export types
//!
//! This module defines the exported artifact and export errors.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What an artifact contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// A full regular recording
    Recording,
    /// The replay buffer at the moment the clip was saved
    ReplayClip,
}

impl ArtifactKind {
    /// File name prefix
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Recording => "screen-recording",
            ArtifactKind::ReplayClip => "instant-replay",
        }
    }
}

/// One downloadable file built from a chunk sequence
#[derive(Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub file_name: String,
    /// MIME type without codec parameters
    pub content_type: String,
    pub chunk_count: usize,
    pub duration_ms: u64,
    pub created_at: DateTime<Local>,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("kind", &self.kind)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("chunk_count", &self.chunk_count)
            .field("duration_ms", &self.duration_ms)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output directory is not usable: {0}")]
    InvalidOutputDir(String),
}
