//! Synthetic capture host
//!
//! An in-process stand-in for a real capture platform. Streams hold no
//! hardware but count as live until stopped, and the encoder emits small
//! deterministic payloads on a tokio interval. Permission outcomes, host
//! revocation and encoder faults can be scripted, which makes it the test
//! double for the recorder and the backend of the demo CLI.

use super::acquire::AcquiredMedia;
use super::traits::{AcquireError, CaptureBackend, CaptureConstraints, MediaStream, StreamKind};
use crate::encoder::{EncoderError, EncoderFactory, EncoderOptions, MediaEncoder};
use crate::recorder::events::EventSink;
use crate::recorder::state::TrackSet;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Scripted answer to a permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grant {
    #[default]
    Allow,
    Deny,
    Unsupported,
    Fail,
}

impl Grant {
    fn check(self, what: &str) -> Result<(), AcquireError> {
        match self {
            Grant::Allow => Ok(()),
            Grant::Deny => Err(AcquireError::Denied(format!("{} sharing was refused", what))),
            Grant::Unsupported => Err(AcquireError::Unsupported(format!(
                "{} capture API is not available",
                what
            ))),
            Grant::Fail => Err(AcquireError::Failed(format!("{} could not be opened", what))),
        }
    }
}

const DEFAULT_SUPPORTED_TYPES: &[&str] = &[
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

/// Synthetic host handle. Clones share the same host.
#[derive(Clone)]
pub struct SyntheticHost {
    inner: Arc<HostInner>,
}

struct HostInner {
    display_grant: Mutex<Grant>,
    microphone_grant: Mutex<Grant>,
    shares_audio: AtomicBool,
    acquire_delay: Mutex<Duration>,
    supported_types: Mutex<Vec<String>>,
    encoder_init_failure: Mutex<Option<String>>,
    next_id: AtomicU64,
    live_displays: AtomicUsize,
    peak_live_displays: AtomicUsize,
    live_microphones: AtomicUsize,
    displays: Mutex<Vec<Arc<StreamShared>>>,
    encoder_sink: Mutex<Option<EventSink>>,
}

/// State shared between a stream and the host (for revocation)
struct StreamShared {
    kind: StreamKind,
    live: AtomicBool,
    ended: Mutex<Option<EventSink>>,
}

impl HostInner {
    /// Mark a stream released; returns false if it already was
    fn release(&self, shared: &StreamShared) -> bool {
        if !shared.live.swap(false, Ordering::SeqCst) {
            return false;
        }
        match shared.kind {
            StreamKind::Display => self.live_displays.fetch_sub(1, Ordering::SeqCst),
            StreamKind::Microphone => self.live_microphones.fetch_sub(1, Ordering::SeqCst),
        };
        true
    }

    fn open(&self, kind: StreamKind) -> Arc<StreamShared> {
        match kind {
            StreamKind::Display => {
                let live = self.live_displays.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak_live_displays.fetch_max(live, Ordering::SeqCst);
            }
            StreamKind::Microphone => {
                self.live_microphones.fetch_add(1, Ordering::SeqCst);
            }
        }
        Arc::new(StreamShared {
            kind,
            live: AtomicBool::new(true),
            ended: Mutex::new(None),
        })
    }
}

impl SyntheticHost {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HostInner {
                display_grant: Mutex::new(Grant::Allow),
                microphone_grant: Mutex::new(Grant::Allow),
                shares_audio: AtomicBool::new(true),
                acquire_delay: Mutex::new(Duration::ZERO),
                supported_types: Mutex::new(
                    DEFAULT_SUPPORTED_TYPES.iter().map(|s| s.to_string()).collect(),
                ),
                encoder_init_failure: Mutex::new(None),
                next_id: AtomicU64::new(1),
                live_displays: AtomicUsize::new(0),
                peak_live_displays: AtomicUsize::new(0),
                live_microphones: AtomicUsize::new(0),
                displays: Mutex::new(Vec::new()),
                encoder_sink: Mutex::new(None),
            }),
        }
    }

    pub fn set_display_grant(&self, grant: Grant) {
        *self.inner.display_grant.lock() = grant;
    }

    pub fn set_microphone_grant(&self, grant: Grant) {
        *self.inner.microphone_grant.lock() = grant;
    }

    /// Whether the user ticks "share audio" in the host picker
    pub fn set_shares_audio(&self, shares: bool) {
        self.inner.shares_audio.store(shares, Ordering::SeqCst);
    }

    /// How long the screen prompt stays open
    pub fn set_acquire_delay(&self, delay: Duration) {
        *self.inner.acquire_delay.lock() = delay;
    }

    pub fn set_supported_types(&self, types: &[&str]) {
        *self.inner.supported_types.lock() = types.iter().map(|s| s.to_string()).collect();
    }

    pub fn fail_encoder_init(&self, message: Option<&str>) {
        *self.inner.encoder_init_failure.lock() = message.map(str::to_string);
    }

    pub fn live_display_streams(&self) -> usize {
        self.inner.live_displays.load(Ordering::SeqCst)
    }

    /// Highest number of display streams that were ever live at once
    pub fn peak_live_display_streams(&self) -> usize {
        self.inner.peak_live_displays.load(Ordering::SeqCst)
    }

    pub fn live_microphone_streams(&self) -> usize {
        self.inner.live_microphones.load(Ordering::SeqCst)
    }

    /// Simulate the host's own "stop sharing" button on the newest live
    /// display stream. Returns false if nothing was live.
    pub fn revoke_display(&self) -> bool {
        let shared = {
            let displays = self.inner.displays.lock();
            displays
                .iter()
                .rev()
                .find(|s| s.live.load(Ordering::SeqCst))
                .cloned()
        };
        let Some(shared) = shared else {
            return false;
        };
        tracing::info!("Host revoked display capture");
        self.inner.release(&shared);
        if let Some(sink) = shared.ended.lock().take() {
            sink.stream_ended();
        }
        true
    }

    /// Make the most recently started encoder report a fault
    pub fn inject_encoder_fault(&self, message: &str) -> bool {
        match self.inner.encoder_sink.lock().as_ref() {
            Some(sink) => {
                sink.encoder_fault(message);
                true
            }
            None => false,
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.inner.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for SyntheticHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for SyntheticHost {
    async fn acquire_display(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, AcquireError> {
        let delay = *self.inner.acquire_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let grant = *self.inner.display_grant.lock();
        grant.check("Screen")?;

        let has_audio = constraints.system_audio && self.inner.shares_audio.load(Ordering::SeqCst);
        let shared = self.inner.open(StreamKind::Display);
        {
            let mut displays = self.inner.displays.lock();
            displays.retain(|s| s.live.load(Ordering::SeqCst));
            displays.push(shared.clone());
        }

        let stream = SyntheticStream {
            id: self.next_id("display"),
            has_video: constraints.video,
            has_audio,
            shared,
            host: self.inner.clone(),
        };
        tracing::debug!("Synthetic display stream {} opened", stream.id);
        Ok(Box::new(stream))
    }

    async fn acquire_microphone(&self) -> Result<Box<dyn MediaStream>, AcquireError> {
        let grant = *self.inner.microphone_grant.lock();
        grant.check("Microphone")?;

        let stream = SyntheticStream {
            id: self.next_id("mic"),
            has_video: false,
            has_audio: true,
            shared: self.inner.open(StreamKind::Microphone),
            host: self.inner.clone(),
        };
        tracing::debug!("Synthetic microphone stream {} opened", stream.id);
        Ok(Box::new(stream))
    }
}

struct SyntheticStream {
    id: String,
    has_video: bool,
    has_audio: bool,
    shared: Arc<StreamShared>,
    host: Arc<HostInner>,
}

impl MediaStream for SyntheticStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> StreamKind {
        self.shared.kind
    }

    fn has_video(&self) -> bool {
        self.has_video
    }

    fn has_audio(&self) -> bool {
        self.has_audio
    }

    fn watch_ended(&mut self, sink: EventSink) {
        *self.shared.ended.lock() = Some(sink);
    }

    fn stop(&mut self) {
        self.shared.ended.lock().take();
        if self.host.release(&self.shared) {
            tracing::debug!("Synthetic stream {} released", self.id);
        }
    }

    fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::SeqCst)
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl EncoderFactory for SyntheticHost {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.inner
            .supported_types
            .lock()
            .iter()
            .any(|t| t == mime_type)
    }

    fn start(
        &self,
        media: &AcquiredMedia,
        options: &EncoderOptions,
        sink: EventSink,
    ) -> Result<Box<dyn MediaEncoder>, EncoderError> {
        if let Some(message) = self.inner.encoder_init_failure.lock().clone() {
            return Err(EncoderError::Init(message));
        }
        if !self.is_type_supported(&options.mime_type) {
            return Err(EncoderError::Init(format!(
                "{} is not supported",
                options.mime_type
            )));
        }
        if options.timeslice.is_zero() {
            return Err(EncoderError::Init("timeslice must be positive".to_string()));
        }

        *self.inner.encoder_sink.lock() = Some(sink.clone());

        let tracks = media.tracks();
        let timeslice = options.timeslice;
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + timeslice;
            let mut ticker = tokio::time::interval_at(start, timeslice);
            let mut sequence = 0u64;
            loop {
                ticker.tick().await;
                sink.chunk(synthetic_payload(sequence, tracks), timeslice);
                sequence += 1;
            }
        });

        tracing::debug!(
            "Synthetic encoder started ({}, {:?} slices)",
            options.mime_type,
            timeslice
        );
        Ok(Box::new(SyntheticEncoder {
            mime_type: options.mime_type.clone(),
            task: Some(task),
        }))
    }
}

fn synthetic_payload(sequence: u64, tracks: TrackSet) -> Vec<u8> {
    format!(
        "chunk:{}:v{}s{}m{};",
        sequence, tracks.video as u8, tracks.system_audio as u8, tracks.microphone as u8
    )
    .into_bytes()
}

struct SyntheticEncoder {
    mime_type: String,
    task: Option<JoinHandle<()>>,
}

impl MediaEncoder for SyntheticEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SyntheticEncoder {
    fn drop(&mut self) {
        self.stop();
    }
}
