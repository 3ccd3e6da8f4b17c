//! Encoded chunks and the unbounded chunk sequence of a regular recording

use std::sync::Arc;
use std::time::Duration;

/// One timeslice of encoded audio+video as delivered by the encoder.
///
/// The payload is reference counted, so cloning a chunk (or a whole
/// snapshot of chunks) never copies encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Capture order within the session, starting at 0
    pub sequence: u64,
    /// Wall-clock time this chunk represents
    pub duration: Duration,
    data: Arc<[u8]>,
}

impl Chunk {
    pub fn new(sequence: u64, duration: Duration, data: Vec<u8>) -> Self {
        Self {
            sequence,
            duration,
            data: data.into(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Append-only chunk list for a regular recording.
#[derive(Debug, Default)]
pub struct ChunkSequence {
    chunks: Vec<Chunk>,
    total_duration: Duration,
    total_bytes: usize,
}

impl ChunkSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: Chunk) {
        self.total_duration += chunk.duration;
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sum of chunk durations
    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Hand the chunks over for export, leaving the sequence empty
    pub fn take(&mut self) -> Vec<Chunk> {
        self.total_duration = Duration::ZERO;
        self.total_bytes = 0;
        std::mem::take(&mut self.chunks)
    }

    pub fn clear(&mut self) {
        self.take();
    }
}

/// Concatenate chunk payloads in order
pub fn concat(chunks: &[Chunk]) -> Vec<u8> {
    let size = chunks.iter().map(Chunk::len).sum();
    let mut out = Vec::with_capacity(size);
    for chunk in chunks {
        out.extend_from_slice(chunk.data());
    }
    out
}

#[cfg(test)]
pub(crate) fn test_chunk(sequence: u64, secs: u64) -> Chunk {
    Chunk::new(
        sequence,
        Duration::from_secs(secs),
        format!("[{}]", sequence).into_bytes(),
    )
}
