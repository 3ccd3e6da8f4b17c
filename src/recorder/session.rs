//! Live session
//!
//! Owns everything an active session holds: the granted streams, the
//! encoder, the countdown task and the chunk store. Releasing (or dropping)
//! the session frees all of it.

use super::chunk::{Chunk, ChunkSequence};
use super::replay::ReplayBuffer;
use super::state::{RecordingConfig, RecordingMode, TrackSet};
use crate::capture::AcquiredMedia;
use crate::encoder::MediaEncoder;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Where chunks go for the session's mode
#[derive(Debug)]
pub enum ChunkStore {
    Recording(ChunkSequence),
    Replay(ReplayBuffer),
}

impl ChunkStore {
    pub fn for_mode(mode: &RecordingMode) -> Self {
        match mode {
            RecordingMode::Regular { .. } => ChunkStore::Recording(ChunkSequence::new()),
            RecordingMode::Replay { window_secs } => {
                ChunkStore::Replay(ReplayBuffer::new(Duration::from_secs(*window_secs)))
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ChunkStore::Recording(seq) => seq.len(),
            ChunkStore::Replay(buffer) => buffer.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration currently held
    pub fn buffered(&self) -> Duration {
        match self {
            ChunkStore::Recording(seq) => seq.total_duration(),
            ChunkStore::Replay(buffer) => buffer.represented_duration(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            ChunkStore::Recording(seq) => seq.clear(),
            ChunkStore::Replay(buffer) => buffer.clear(),
        }
    }
}

pub struct Session {
    pub id: Uuid,
    pub generation: u64,
    pub config: RecordingConfig,
    pub mime_type: String,
    pub tracks: TrackSet,
    pub store: ChunkStore,
    pub started_at: Instant,
    media: AcquiredMedia,
    encoder: Box<dyn MediaEncoder>,
    countdown: Option<JoinHandle<()>>,
    next_sequence: u64,
    captured: Duration,
}

impl Session {
    pub fn new(
        id: Uuid,
        generation: u64,
        config: RecordingConfig,
        media: AcquiredMedia,
        encoder: Box<dyn MediaEncoder>,
    ) -> Self {
        Self {
            id,
            generation,
            store: ChunkStore::for_mode(&config.mode),
            mime_type: encoder.mime_type().to_string(),
            tracks: media.tracks(),
            config,
            started_at: Instant::now(),
            media,
            encoder,
            countdown: None,
            next_sequence: 0,
            captured: Duration::ZERO,
        }
    }

    pub fn set_countdown(&mut self, task: JoinHandle<()>) {
        if let Some(old) = self.countdown.replace(task) {
            old.abort();
        }
    }

    /// Record one encoder timeslice. Returns the stored chunk's sequence.
    pub fn push(&mut self, data: Vec<u8>, duration: Duration) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.captured += duration;

        let chunk = Chunk::new(sequence, duration, data);
        match &mut self.store {
            ChunkStore::Recording(seq) => seq.push(chunk),
            ChunkStore::Replay(buffer) => buffer.push(chunk),
        }
        sequence
    }

    /// Total captured time, including chunks the replay buffer evicted
    pub fn captured(&self) -> Duration {
        self.captured
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.config
            .mode
            .time_limit()
            .map(|limit| limit.saturating_sub(self.elapsed()))
    }

    /// Stop the encoder without releasing the streams yet
    pub fn halt_encoder(&mut self) {
        self.encoder.stop();
    }

    /// Stop the encoder, cancel timers and release every stream
    pub fn release(&mut self) {
        self.encoder.stop();
        if let Some(countdown) = self.countdown.take() {
            countdown.abort();
        }
        self.media.release();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}
