//! Recording coordinator
//!
//! Owns the single live session and applies user commands and host events
//! to it. All methods are synchronous; the recorder service calls them one
//! at a time from its task.

use super::error::{RecordingError, RecordingResult};
use super::events::{EventSink, RecordingEvent, SessionEvent};
use super::machine::Trigger;
use super::session::{ChunkStore, Session};
use super::state::{
    RecorderStatus, RecordingConfig, RecordingMode, SessionState, SessionSummary, StopOutcome,
    StopReason,
};
use crate::capture::AcquiredMedia;
use crate::config::{RecorderSettings, WindowPolicy};
use crate::encoder::{negotiate_mime_type, EncoderFactory, EncoderOptions};
use crate::export::{self, Artifact, ArtifactKind};
use chrono::Local;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

/// A start attempt waiting for the host to grant capture
struct PendingStart {
    generation: u64,
    session_id: Uuid,
    config: RecordingConfig,
}

/// Result of a start attempt, produced when its media arrives
#[derive(Debug)]
pub struct StartResolution {
    pub generation: u64,
    pub result: RecordingResult<()>,
}

/// How a replay window change was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowChange {
    /// Buffer trimmed in place, capture untouched
    Trimmed,
    /// Capture torn down; a new start attempt must be acquired
    Restarting {
        generation: u64,
        config: RecordingConfig,
    },
}

pub struct RecordingCoordinator {
    /// Current session state, readable from handles
    state: Arc<RwLock<SessionState>>,

    /// The one live session, if active
    session: Option<Session>,

    pending: Option<PendingStart>,

    /// Incremented on every start attempt
    generation: u64,

    settings: RecorderSettings,

    encoders: Arc<dyn EncoderFactory>,

    /// Sender cloned into streams, encoders and timers
    session_tx: mpsc::UnboundedSender<SessionEvent>,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecordingEvent>,

    /// Outcome of a session that stopped on its own, until claimed
    outcome: Option<StopOutcome>,

    last_error: Option<RecordingError>,

    warnings: Vec<String>,
}

impl RecordingCoordinator {
    /// Create a coordinator and the receiver its session events arrive on
    pub fn new(
        encoders: Arc<dyn EncoderFactory>,
        settings: RecorderSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(100);
        let coordinator = Self {
            state: Arc::new(RwLock::new(SessionState::Idle)),
            session: None,
            pending: None,
            generation: 0,
            settings,
            encoders,
            session_tx,
            event_tx,
            outcome: None,
            last_error: None,
            warnings: Vec::new(),
        };
        (coordinator, session_rx)
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn state_handle(&self) -> Arc<RwLock<SessionState>> {
        self.state.clone()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<RecordingEvent> {
        self.event_tx.clone()
    }

    pub fn session_sender(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.session_tx.clone()
    }

    fn emit(&self, event: RecordingEvent) {
        let _ = self.event_tx.send(event);
    }

    fn transition(&mut self, trigger: Trigger) -> Option<SessionState> {
        let current = *self.state.read();
        let Some(next) = current.next(trigger) else {
            tracing::warn!("Ignoring {:?} in state {}", trigger, current);
            return None;
        };
        *self.state.write() = next;
        tracing::debug!("Session state {} -> {} ({:?})", current, next, trigger);
        self.emit(RecordingEvent::StateChanged { state: next });
        Some(next)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    /// Begin a start attempt. Returns the generation whose media the caller
    /// must acquire and deliver as [`SessionEvent::Acquired`].
    pub fn begin_start(&mut self, config: RecordingConfig) -> RecordingResult<u64> {
        config.validate()?;

        let current = self.state();
        if current.is_busy() {
            return Err(RecordingError::AlreadyRecording);
        }
        if matches!(current, SessionState::Stopped | SessionState::Error) {
            self.transition(Trigger::Reset);
        }
        self.transition(Trigger::Start)
            .ok_or(RecordingError::AlreadyRecording)?;

        self.generation += 1;
        self.outcome = None;
        self.last_error = None;
        self.warnings.clear();

        let session_id = Uuid::new_v4();
        tracing::info!(
            "Starting session {} (attempt #{}, {:?})",
            session_id,
            self.generation,
            config.mode
        );
        self.pending = Some(PendingStart {
            generation: self.generation,
            session_id,
            config,
        });
        Ok(self.generation)
    }

    /// Apply the acquisition result for `generation`.
    ///
    /// Returns `None` when the attempt is no longer pending (cancelled or
    /// superseded); any media it carries is released on the spot.
    pub fn complete_start(
        &mut self,
        generation: u64,
        outcome: RecordingResult<AcquiredMedia>,
    ) -> Option<RecordingResult<()>> {
        let pending = match self.pending.take() {
            Some(pending) if pending.generation == generation => pending,
            other => {
                self.pending = other;
                if let Ok(mut media) = outcome {
                    tracing::info!("Releasing media from abandoned start #{}", generation);
                    media.release();
                }
                return None;
            }
        };

        let mut media = match outcome {
            Ok(media) => media,
            Err(e) => {
                self.fail_start(e.clone());
                return Some(Err(e));
            }
        };

        let sink = EventSink::new(generation, self.session_tx.clone());
        let encoder = negotiate_mime_type(
            self.settings.preferred_mime_type.as_deref(),
            self.encoders.as_ref(),
        )
        .and_then(|mime_type| {
            let options = EncoderOptions {
                mime_type,
                timeslice: self.settings.timeslice(),
            };
            self.encoders.start(&media, &options, sink.clone())
        });
        let encoder = match encoder {
            Ok(encoder) => encoder,
            Err(e) => {
                media.release();
                let error = RecordingError::DeviceUnavailable(e.to_string());
                self.fail_start(error.clone());
                return Some(Err(error));
            }
        };

        media.display.watch_ended(sink.clone());
        let warnings = std::mem::take(&mut media.warnings);
        let mut session =
            Session::new(pending.session_id, generation, pending.config, media, encoder);

        if let Some(limit) = session.config.mode.time_limit() {
            let timer_sink = sink;
            session.set_countdown(tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                timer_sink.countdown_elapsed();
            }));
        }

        self.transition(Trigger::Activated);
        tracing::info!(
            "Session {} active ({}, tracks {:?})",
            session.id,
            session.mime_type,
            session.tracks
        );
        self.emit(RecordingEvent::Started {
            session_id: session.id,
            mode: session.config.mode,
            tracks: session.tracks,
            mime_type: session.mime_type.clone(),
        });
        for warning in warnings {
            self.emit(RecordingEvent::Warning {
                message: warning.clone(),
            });
            self.warnings.push(warning);
        }
        self.session = Some(session);
        Some(Ok(()))
    }

    fn fail_start(&mut self, error: RecordingError) {
        tracing::error!("Session start failed: {}", error);
        self.transition(Trigger::StartFailed);
        self.emit(RecordingEvent::Error {
            kind: error.kind(),
            message: error.user_message(),
        });
        self.last_error = Some(error);
    }

    /// Feed one session event into the state machine
    pub fn handle_event(&mut self, event: SessionEvent) -> Option<StartResolution> {
        match event {
            SessionEvent::Acquired { generation, outcome } => {
                return self
                    .complete_start(generation, outcome)
                    .map(|result| StartResolution { generation, result });
            }
            SessionEvent::Chunk {
                generation,
                data,
                duration,
            } => self.on_chunk(generation, data, duration),
            SessionEvent::StreamEnded { generation } if self.is_current(generation) => {
                tracing::info!("Capture ended by the host");
                self.finish(StopReason::HostRevoked);
            }
            SessionEvent::CountdownElapsed { generation } if self.is_current(generation) => {
                tracing::info!("Recording time limit reached");
                self.finish(StopReason::TimerExpired);
            }
            SessionEvent::EncoderFault {
                generation,
                message,
            } if self.is_current(generation) => self.fault(message),
            stale => {
                tracing::trace!("Dropping stale event for attempt #{}", stale.generation());
            }
        }
        None
    }

    fn on_chunk(&mut self, generation: u64, data: Vec<u8>, duration: Duration) {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.generation == generation)
        else {
            tracing::trace!("Dropping chunk for inactive attempt #{}", generation);
            return;
        };
        let sequence = session.push(data, duration);
        let buffered_ms = session.store.buffered().as_millis() as u64;
        tracing::trace!("Chunk #{} stored ({}ms buffered)", sequence, buffered_ms);
        self.emit(RecordingEvent::ChunkCaptured {
            sequence,
            buffered_ms,
        });
    }

    /// Move the active session to stopped and keep its outcome
    fn finish(&mut self, reason: StopReason) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.release();
        self.transition(Trigger::Stop);

        let summary = SessionSummary {
            session_id: session.id,
            reason,
            chunk_count: session.store.len(),
            recorded_ms: session.captured().as_millis() as u64,
        };
        let outcome = match &mut session.store {
            ChunkStore::Recording(seq) => {
                let chunks = seq.take();
                let artifact = export::assemble(
                    &chunks,
                    &session.mime_type,
                    ArtifactKind::Recording,
                    Local::now(),
                );
                match artifact {
                    Some(artifact) => StopOutcome::Saved { summary, artifact },
                    None => StopOutcome::NoData { summary },
                }
            }
            ChunkStore::Replay(buffer) => {
                buffer.clear();
                StopOutcome::ReplayEnded { summary }
            }
        };

        tracing::info!(
            "Session {} stopped ({:?}): {}",
            session.id,
            reason,
            outcome.label()
        );
        self.emit(RecordingEvent::Stopped {
            outcome: outcome.label().to_string(),
            summary: outcome.summary().cloned(),
        });
        self.outcome = Some(outcome);
    }

    fn fault(&mut self, message: String) {
        if let Some(mut session) = self.session.take() {
            session.store.clear();
            session.release();
        }
        self.transition(Trigger::Fault);
        let error = RecordingError::EncoderFault(message);
        tracing::error!("{}", error);
        self.emit(RecordingEvent::Error {
            kind: error.kind(),
            message: error.user_message(),
        });
        self.last_error = Some(error);
    }

    /// Stop producing chunks ahead of a stop, so the caller can drain
    /// everything already delivered.
    pub fn halt_encoder(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.halt_encoder();
        }
    }

    /// User stop.
    ///
    /// While awaiting permission this cancels the attempt. After a session
    /// stopped on its own (time limit, host revoke) it returns that outcome.
    pub fn stop(&mut self) -> RecordingResult<StopOutcome> {
        match self.state() {
            SessionState::AwaitingPermission => {
                if let Some(pending) = self.pending.take() {
                    tracing::info!(
                        "Start #{} cancelled before capture was granted",
                        pending.generation
                    );
                }
                self.transition(Trigger::Cancel);
                self.emit(RecordingEvent::Stopped {
                    outcome: StopOutcome::Cancelled.label().to_string(),
                    summary: None,
                });
                Ok(StopOutcome::Cancelled)
            }
            SessionState::Active => {
                self.finish(StopReason::User);
                self.outcome.take().ok_or(RecordingError::NotRecording)
            }
            SessionState::Stopped => self.outcome.take().ok_or(RecordingError::NotRecording),
            _ => Err(RecordingError::NotRecording),
        }
    }

    /// Change the replay window of the active replay session
    pub fn set_replay_window(&mut self, window_secs: u64) -> RecordingResult<WindowChange> {
        if window_secs == 0 {
            return Err(RecordingError::InvalidConfig(
                "replay window must be at least one second".to_string(),
            ));
        }
        let policy = self.settings.window_policy;
        let session = self.session.as_mut().ok_or(RecordingError::NotRecording)?;
        let ChunkStore::Replay(buffer) = &mut session.store else {
            return Err(RecordingError::NotReplayMode);
        };

        match policy {
            WindowPolicy::Trim => {
                buffer.set_window(Duration::from_secs(window_secs));
                session.config.mode = RecordingMode::Replay { window_secs };
                tracing::info!("Replay window set to {}s", window_secs);
                Ok(WindowChange::Trimmed)
            }
            WindowPolicy::Restart => {
                let config = RecordingConfig {
                    mode: RecordingMode::Replay { window_secs },
                    ..session.config.clone()
                };
                tracing::info!("Restarting capture for a {}s replay window", window_secs);
                self.finish(StopReason::User);
                self.outcome = None;
                let generation = self.begin_start(config.clone())?;
                Ok(WindowChange::Restarting { generation, config })
            }
        }
    }

    /// Export the current replay buffer. `None` if it holds no chunks yet.
    pub fn save_clip(&mut self) -> RecordingResult<Option<Artifact>> {
        let session = self.session.as_ref().ok_or(RecordingError::NotRecording)?;
        let ChunkStore::Replay(buffer) = &session.store else {
            return Err(RecordingError::NotReplayMode);
        };

        let chunks = buffer.snapshot();
        let artifact = export::assemble(
            &chunks,
            &session.mime_type,
            ArtifactKind::ReplayClip,
            Local::now(),
        );
        match &artifact {
            Some(clip) => {
                tracing::info!(
                    "Saved replay clip {} ({} chunks)",
                    clip.file_name,
                    clip.chunk_count
                );
                self.emit(RecordingEvent::ClipSaved {
                    file_name: clip.file_name.clone(),
                    duration_ms: clip.duration_ms,
                });
            }
            None => tracing::info!("Replay buffer is empty, nothing to save"),
        }
        Ok(artifact)
    }

    /// Acknowledge a stopped or failed session and return to idle
    pub fn reset(&mut self) -> RecordingResult<()> {
        match self.state() {
            SessionState::Idle => Ok(()),
            SessionState::Stopped | SessionState::Error => {
                self.transition(Trigger::Reset);
                self.outcome = None;
                self.last_error = None;
                self.warnings.clear();
                Ok(())
            }
            _ => Err(RecordingError::AlreadyRecording),
        }
    }

    /// Claim the outcome of a session that stopped on its own
    pub fn take_outcome(&mut self) -> Option<StopOutcome> {
        self.outcome.take()
    }

    pub fn last_error(&self) -> Option<&RecordingError> {
        self.last_error.as_ref()
    }

    pub fn status(&self) -> RecorderStatus {
        let mut status = RecorderStatus {
            state: self.state(),
            warnings: self.warnings.clone(),
            error_kind: self.last_error.as_ref().map(RecordingError::kind),
            error_message: self.last_error.as_ref().map(RecordingError::user_message),
            ..Default::default()
        };
        if let Some(pending) = &self.pending {
            status.session_id = Some(pending.session_id);
            status.mode = Some(pending.config.mode);
        }
        if let Some(session) = &self.session {
            status.session_id = Some(session.id);
            status.mode = Some(session.config.mode);
            status.tracks = session.tracks;
            status.mime_type = Some(session.mime_type.clone());
            status.chunk_count = session.store.len();
            status.buffered_ms = session.store.buffered().as_millis() as u64;
            status.elapsed_ms = session.elapsed().as_millis() as u64;
            status.remaining_ms = session.remaining().map(|d| d.as_millis() as u64);
        }
        status
    }

    /// Release everything and return to idle, discarding captured data
    pub fn shutdown(&mut self) {
        if self.pending.take().is_some() {
            self.transition(Trigger::Cancel);
        }
        if let Some(mut session) = self.session.take() {
            session.store.clear();
            session.release();
            self.transition(Trigger::Stop);
        }
        if matches!(self.state(), SessionState::Stopped | SessionState::Error) {
            self.transition(Trigger::Reset);
        }
        self.outcome = None;
        tracing::info!("Recorder shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{acquire_media, Grant, SyntheticHost};
    use crate::recorder::state::TrackSet;

    fn coordinator(
        host: &SyntheticHost,
        settings: RecorderSettings,
    ) -> (RecordingCoordinator, mpsc::UnboundedReceiver<SessionEvent>) {
        RecordingCoordinator::new(Arc::new(host.clone()), settings)
    }

    async fn activate(
        coordinator: &mut RecordingCoordinator,
        host: &SyntheticHost,
        config: RecordingConfig,
    ) -> u64 {
        let generation = coordinator.begin_start(config.clone()).unwrap();
        let media = acquire_media(host, &config).await;
        let resolution = coordinator
            .handle_event(SessionEvent::Acquired {
                generation,
                outcome: media,
            })
            .unwrap();
        resolution.result.unwrap();
        generation
    }

    fn chunk(generation: u64, tag: &str, secs: u64) -> SessionEvent {
        SessionEvent::Chunk {
            generation,
            data: tag.as_bytes().to_vec(),
            duration: Duration::from_secs(secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_recording_concatenates_chunks() {
        let host = SyntheticHost::new();
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());
        let generation = activate(&mut coordinator, &host, RecordingConfig::manual()).await;
        assert_eq!(coordinator.state(), SessionState::Active);

        for tag in ["a", "b", "c"] {
            coordinator.handle_event(chunk(generation, tag, 1));
        }

        let outcome = coordinator.stop().unwrap();
        let StopOutcome::Saved { summary, artifact } = outcome else {
            panic!("expected a saved recording");
        };
        assert_eq!(artifact.data, b"abc".to_vec());
        assert_eq!(artifact.chunk_count, 3);
        assert_eq!(summary.recorded_ms, 3000);
        assert_eq!(summary.reason, StopReason::User);
        assert!(artifact.file_name.starts_with("screen-recording-"));
        assert_eq!(coordinator.state(), SessionState::Stopped);
        assert_eq!(host.live_display_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_chunks_is_no_data() {
        let host = SyntheticHost::new();
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());
        activate(&mut coordinator, &host, RecordingConfig::manual()).await;

        let outcome = coordinator.stop().unwrap();
        assert!(matches!(outcome, StopOutcome::NoData { .. }));
        assert_eq!(coordinator.state(), SessionState::Stopped);
        assert!(coordinator.last_error().is_none());
    }

    #[tokio::test]
    async fn test_denied_capture_is_error_and_holds_nothing() {
        let host = SyntheticHost::new();
        host.set_display_grant(Grant::Deny);
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());
        let mut events = coordinator.subscribe();

        let config = RecordingConfig::manual();
        let generation = coordinator.begin_start(config.clone()).unwrap();
        let media = acquire_media(&host, &config).await;
        let resolution = coordinator
            .handle_event(SessionEvent::Acquired {
                generation,
                outcome: media,
            })
            .unwrap();

        assert!(matches!(
            resolution.result,
            Err(RecordingError::PermissionDenied(_))
        ));
        assert_eq!(coordinator.state(), SessionState::Error);
        assert_eq!(host.live_display_streams(), 0);

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            if let RecordingEvent::Error { kind, .. } = event {
                assert_eq!(kind, crate::recorder::error::ErrorKind::PermissionDenied);
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_encoder_init_failure_releases_stream() {
        let host = SyntheticHost::new();
        host.fail_encoder_init(Some("codec busy"));
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());

        let config = RecordingConfig::manual();
        let generation = coordinator.begin_start(config.clone()).unwrap();
        let media = acquire_media(&host, &config).await;
        let result = coordinator.complete_start(generation, media).unwrap();

        assert!(matches!(result, Err(RecordingError::DeviceUnavailable(_))));
        assert_eq!(coordinator.state(), SessionState::Error);
        assert_eq!(host.live_display_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_microphone_denied_keeps_system_audio() {
        let host = SyntheticHost::new();
        host.set_microphone_grant(Grant::Deny);
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());

        activate(
            &mut coordinator,
            &host,
            RecordingConfig::manual().with_audio(true, true),
        )
        .await;

        let status = coordinator.status();
        assert_eq!(status.state, SessionState::Active);
        assert_eq!(
            status.tracks,
            TrackSet {
                video: true,
                system_audio: true,
                microphone: false
            }
        );
        assert_eq!(status.warnings.len(), 1);
        assert!(status.warnings[0].contains("Microphone"));
        assert_eq!(host.live_microphone_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_revoke_stops_like_user() {
        let host = SyntheticHost::new();
        let (mut coordinator, mut rx) = coordinator(&host, RecorderSettings::default());
        let generation = activate(&mut coordinator, &host, RecordingConfig::manual()).await;
        coordinator.handle_event(chunk(generation, "x", 1));

        assert!(host.revoke_display());
        let event = rx.recv().await.unwrap();
        coordinator.handle_event(event);

        assert_eq!(coordinator.state(), SessionState::Stopped);
        let outcome = coordinator.take_outcome().unwrap();
        assert_eq!(outcome.summary().unwrap().reason, StopReason::HostRevoked);
        assert_eq!(outcome.artifact().unwrap().data, b"x".to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_fault_is_error() {
        let host = SyntheticHost::new();
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());
        let generation = activate(&mut coordinator, &host, RecordingConfig::manual()).await;
        coordinator.handle_event(chunk(generation, "x", 1));

        coordinator.handle_event(SessionEvent::EncoderFault {
            generation,
            message: "disk full".to_string(),
        });

        assert_eq!(coordinator.state(), SessionState::Error);
        assert!(matches!(
            coordinator.last_error(),
            Some(RecordingError::EncoderFault(_))
        ));
        assert!(coordinator.take_outcome().is_none());
        assert_eq!(host.live_display_streams(), 0);

        coordinator.reset().unwrap();
        assert_eq!(coordinator.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_events_are_ignored() {
        let host = SyntheticHost::new();
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());
        let first = activate(&mut coordinator, &host, RecordingConfig::manual()).await;
        coordinator.stop().unwrap();

        let second = activate(&mut coordinator, &host, RecordingConfig::manual()).await;
        assert_ne!(first, second);

        coordinator.handle_event(chunk(first, "old", 1));
        coordinator.handle_event(SessionEvent::StreamEnded { generation: first });
        assert_eq!(coordinator.state(), SessionState::Active);
        assert_eq!(coordinator.status().chunk_count, 0);
        assert_eq!(host.peak_live_display_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_start_releases_late_media() {
        let host = SyntheticHost::new();
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());

        let config = RecordingConfig::manual();
        let generation = coordinator.begin_start(config.clone()).unwrap();
        assert!(matches!(coordinator.stop(), Ok(StopOutcome::Cancelled)));
        assert_eq!(coordinator.state(), SessionState::Idle);

        let media = acquire_media(&host, &config).await;
        assert_eq!(host.live_display_streams(), 1);
        assert!(coordinator.complete_start(generation, media).is_none());
        assert_eq!(host.live_display_streams(), 0);
        assert_eq!(coordinator.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_active_is_rejected() {
        let host = SyntheticHost::new();
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());
        activate(&mut coordinator, &host, RecordingConfig::manual()).await;
        assert_eq!(
            coordinator.begin_start(RecordingConfig::manual()),
            Err(RecordingError::AlreadyRecording)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_window_trim_policy() {
        let host = SyntheticHost::new();
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());
        let generation = activate(&mut coordinator, &host, RecordingConfig::replay(60)).await;

        for i in 0..20 {
            coordinator.handle_event(chunk(generation, &format!("{},", i), 5));
        }
        assert_eq!(coordinator.status().chunk_count, 12);

        assert_eq!(
            coordinator.set_replay_window(180).unwrap(),
            WindowChange::Trimmed
        );
        for i in 20..80 {
            coordinator.handle_event(chunk(generation, &format!("{},", i), 5));
            assert!(coordinator.status().buffered_ms <= 180_000);
        }
        assert_eq!(coordinator.status().chunk_count, 36);

        coordinator.set_replay_window(10).unwrap();
        let clip = coordinator.save_clip().unwrap().unwrap();
        assert_eq!(clip.data, b"78,79,".to_vec());
        assert!(clip.file_name.starts_with("instant-replay-"));
        assert_eq!(coordinator.state(), SessionState::Active);
        assert_eq!(host.peak_live_display_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_window_restart_policy() {
        let host = SyntheticHost::new();
        let settings = RecorderSettings {
            window_policy: WindowPolicy::Restart,
            ..Default::default()
        };
        let (mut coordinator, _rx) = coordinator(&host, settings);
        let generation = activate(&mut coordinator, &host, RecordingConfig::replay(60)).await;
        coordinator.handle_event(chunk(generation, "a", 5));

        let change = coordinator.set_replay_window(120).unwrap();
        let WindowChange::Restarting {
            generation: next,
            config,
        } = change
        else {
            panic!("expected a restart");
        };
        assert_eq!(config.mode, RecordingMode::Replay { window_secs: 120 });
        assert_eq!(coordinator.state(), SessionState::AwaitingPermission);
        assert_eq!(host.live_display_streams(), 0);

        let media = acquire_media(&host, &config).await;
        coordinator.complete_start(next, media).unwrap().unwrap();
        assert_eq!(coordinator.state(), SessionState::Active);
        assert_eq!(coordinator.status().chunk_count, 0);
        assert_eq!(host.peak_live_display_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_operations_need_replay_mode() {
        let host = SyntheticHost::new();
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());
        assert_eq!(
            coordinator.save_clip().unwrap_err(),
            RecordingError::NotRecording
        );

        activate(&mut coordinator, &host, RecordingConfig::manual()).await;
        assert_eq!(
            coordinator.set_replay_window(30).unwrap_err(),
            RecordingError::NotReplayMode
        );
        assert_eq!(
            coordinator.save_clip().unwrap_err(),
            RecordingError::NotReplayMode
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_replay_clip_is_none() {
        let host = SyntheticHost::new();
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());
        activate(&mut coordinator, &host, RecordingConfig::replay(30)).await;
        assert!(coordinator.save_clip().unwrap().is_none());

        let outcome = coordinator.stop().unwrap();
        assert!(matches!(outcome, StopOutcome::ReplayEnded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_everything() {
        let host = SyntheticHost::new();
        let (mut coordinator, _rx) = coordinator(&host, RecorderSettings::default());
        activate(
            &mut coordinator,
            &host,
            RecordingConfig::manual().with_audio(false, true),
        )
        .await;
        assert_eq!(host.live_microphone_streams(), 1);

        coordinator.shutdown();
        assert_eq!(coordinator.state(), SessionState::Idle);
        assert_eq!(host.live_display_streams(), 0);
        assert_eq!(host.live_microphone_streams(), 0);
    }
}
