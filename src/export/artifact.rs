//! Artifact assembly
//!
//! Concatenates a chunk sequence into a single file with a deterministic
//! content type and a timestamped name, and writes it out.

use super::types::{Artifact, ArtifactKind, ExportError};
use crate::recorder::chunk::{concat, Chunk};
use chrono::{DateTime, Local};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Strip codec parameters: `video/webm;codecs=vp9` -> `video/webm`
pub fn content_type(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
        .to_ascii_lowercase()
}

/// File extension for a content type
pub fn extension(content_type: &str) -> &'static str {
    match content_type {
        "video/mp4" => "mp4",
        "video/x-matroska" => "mkv",
        _ => "webm",
    }
}

/// `<label>-<YYYY-MM-DD_HH-MM-SS>.<ext>`
pub fn file_name(kind: ArtifactKind, content_type: &str, at: DateTime<Local>) -> String {
    format!(
        "{}-{}.{}",
        kind.label(),
        at.format("%Y-%m-%d_%H-%M-%S"),
        extension(content_type)
    )
}

/// Build an artifact from `chunks`. Returns `None` when there is nothing to
/// export; an empty file is never produced.
pub fn assemble(
    chunks: &[Chunk],
    mime_type: &str,
    kind: ArtifactKind,
    at: DateTime<Local>,
) -> Option<Artifact> {
    if chunks.is_empty() {
        return None;
    }

    let content_type = content_type(mime_type);
    let duration_ms = chunks
        .iter()
        .map(|c| c.duration.as_millis() as u64)
        .sum();

    Some(Artifact {
        kind,
        file_name: file_name(kind, &content_type, at),
        content_type,
        chunk_count: chunks.len(),
        duration_ms,
        created_at: at,
        data: concat(chunks),
    })
}

/// Write `artifact` into `dir`, creating it if needed. An existing file with
/// the same name is kept and a numbered name is used instead.
pub fn write_artifact(artifact: &Artifact, dir: &Path) -> Result<PathBuf, ExportError> {
    if dir.exists() && !dir.is_dir() {
        return Err(ExportError::InvalidOutputDir(dir.display().to_string()));
    }
    fs::create_dir_all(dir)?;

    let path = Path::new(&artifact.file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| artifact.kind.label().to_string());
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| extension(&artifact.content_type).to_string());

    let mut attempt = 0u32;
    loop {
        let candidate = if attempt == 0 {
            dir.join(&artifact.file_name)
        } else {
            dir.join(format!("{} ({}).{}", stem, attempt, ext))
        };
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut file) => {
                use std::io::Write;
                file.write_all(&artifact.data)?;
                tracing::info!(
                    "Wrote {} ({} bytes) to {:?}",
                    artifact.file_name,
                    artifact.size(),
                    candidate
                );
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}
