//! Instant replay ring buffer
//!
//! Keeps the trailing window of a continuously running capture. Eviction is
//! by whole chunks from the front, so the represented duration never exceeds
//! the window by more than one chunk.

use super::chunk::Chunk;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug)]
pub struct ReplayBuffer {
    chunks: VecDeque<Chunk>,
    window: Duration,
    represented: Duration,
    /// Duration of the most recent chunk, used for capacity reporting
    chunk_duration: Option<Duration>,
}

impl ReplayBuffer {
    pub fn new(window: Duration) -> Self {
        Self {
            chunks: VecDeque::new(),
            window,
            represented: Duration::ZERO,
            chunk_duration: None,
        }
    }

    /// Append a chunk and evict from the front until only the chunks needed
    /// to cover the window remain.
    pub fn push(&mut self, chunk: Chunk) {
        self.represented += chunk.duration;
        self.chunk_duration = Some(chunk.duration);
        self.chunks.push_back(chunk);
        self.evict();
    }

    /// Change the window and trim right away if the buffer now exceeds it.
    /// Growing the window keeps every chunk currently held.
    pub fn set_window(&mut self, window: Duration) {
        tracing::debug!(
            "Replay window {:?} -> {:?} ({} chunks held)",
            self.window,
            window,
            self.chunks.len()
        );
        self.window = window;
        self.evict();
    }

    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<Chunk> {
        self.chunks.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.represented = Duration::ZERO;
        self.chunk_duration = None;
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total duration of the held chunks
    pub fn represented_duration(&self) -> Duration {
        self.represented
    }

    /// ceil(window / chunk duration), once a chunk duration is known
    pub fn capacity(&self) -> Option<usize> {
        let chunk = self.chunk_duration.filter(|d| !d.is_zero())?;
        let window = self.window.as_nanos();
        let chunk = chunk.as_nanos();
        Some(window.div_ceil(chunk) as usize)
    }

    fn evict(&mut self) {
        while self.represented > self.window {
            let Some(front) = self.chunks.front() else {
                break;
            };
            // Keep the front chunk if dropping it would leave the window uncovered
            if self.represented - front.duration < self.window {
                break;
            }
            self.represented -= front.duration;
            if let Some(evicted) = self.chunks.pop_front() {
                tracing::trace!("Evicted replay chunk #{}", evicted.sequence);
            }
        }
    }
}
