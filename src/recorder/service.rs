//! Recorder service
//!
//! Runs the coordinator on one tokio task. User commands arrive through a
//! [`RecorderHandle`], host events through the session channel, and both
//! are applied strictly one at a time.

use super::coordinator::{RecordingCoordinator, WindowChange};
use super::error::{RecordingError, RecordingResult};
use super::events::{RecordingEvent, SessionEvent};
use super::state::{RecorderStatus, RecordingConfig, SessionState, StopOutcome};
use crate::capture::{acquire_media, CaptureBackend};
use crate::config::RecorderSettings;
use crate::encoder::EncoderFactory;
use crate::export::Artifact;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

type Reply<T> = oneshot::Sender<RecordingResult<T>>;

enum Command {
    Start {
        config: RecordingConfig,
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<StopOutcome>,
    },
    SetReplayWindow {
        window_secs: u64,
        reply: Reply<()>,
    },
    SaveClip {
        reply: Reply<Option<Artifact>>,
    },
    Reset {
        reply: Reply<()>,
    },
    TakeOutcome {
        reply: oneshot::Sender<Option<StopOutcome>>,
    },
    Status {
        reply: oneshot::Sender<RecorderStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running recorder service
#[derive(Clone)]
pub struct RecorderHandle {
    commands: mpsc::Sender<Command>,
    state: Arc<RwLock<SessionState>>,
    events: broadcast::Sender<RecordingEvent>,
}

impl RecorderHandle {
    /// Current state without a round trip to the service
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> RecordingResult<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| RecordingError::ServiceClosed)?;
        rx.await.map_err(|_| RecordingError::ServiceClosed)
    }

    /// Start a session. Resolves once capture is granted and encoding runs,
    /// or with the classified failure.
    pub async fn start(&self, config: RecordingConfig) -> RecordingResult<()> {
        self.request(|reply| Command::Start { config, reply }).await?
    }

    /// Stop the session (or cancel a start still waiting for permission)
    pub async fn stop(&self) -> RecordingResult<StopOutcome> {
        self.request(|reply| Command::Stop { reply }).await?
    }

    pub async fn set_replay_window(&self, window_secs: u64) -> RecordingResult<()> {
        self.request(|reply| Command::SetReplayWindow { window_secs, reply })
            .await?
    }

    /// Export the replay buffer as it is right now
    pub async fn save_clip(&self) -> RecordingResult<Option<Artifact>> {
        self.request(|reply| Command::SaveClip { reply }).await?
    }

    pub async fn reset(&self) -> RecordingResult<()> {
        self.request(|reply| Command::Reset { reply }).await?
    }

    /// Outcome of a session that ended on its own (time limit, host stop)
    pub async fn take_outcome(&self) -> RecordingResult<Option<StopOutcome>> {
        self.request(|reply| Command::TakeOutcome { reply }).await
    }

    pub async fn status(&self) -> RecordingResult<RecorderStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Release everything and end the service task
    pub async fn shutdown(&self) -> RecordingResult<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

/// Spawn the recorder service on the current tokio runtime
pub fn spawn_recorder(
    backend: Arc<dyn CaptureBackend>,
    encoders: Arc<dyn EncoderFactory>,
    settings: RecorderSettings,
) -> (RecorderHandle, JoinHandle<()>) {
    let (coordinator, session_rx) = RecordingCoordinator::new(encoders, settings);
    let (commands_tx, commands_rx) = mpsc::channel(32);

    let handle = RecorderHandle {
        commands: commands_tx,
        state: coordinator.state_handle(),
        events: coordinator.event_sender(),
    };
    let service = RecorderService {
        coordinator,
        backend,
        session_rx,
        commands_rx,
        pending_start: None,
    };
    let task = tokio::spawn(service.run());
    (handle, task)
}

struct RecorderService {
    coordinator: RecordingCoordinator,
    backend: Arc<dyn CaptureBackend>,
    session_rx: mpsc::UnboundedReceiver<SessionEvent>,
    commands_rx: mpsc::Receiver<Command>,
    /// Caller waiting on a start attempt
    pending_start: Option<(u64, Reply<()>)>,
}

impl RecorderService {
    async fn run(mut self) {
        tracing::debug!("Recorder service running");
        loop {
            tokio::select! {
                biased;
                Some(event) = self.session_rx.recv() => self.on_event(event),
                command = self.commands_rx.recv() => match command {
                    Some(command) => {
                        if !self.on_command(command) {
                            break;
                        }
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
            }
        }
        tracing::debug!("Recorder service finished");
    }

    fn on_event(&mut self, event: SessionEvent) {
        if let Some(resolution) = self.coordinator.handle_event(event) {
            self.resolve_start(resolution.generation, resolution.result);
        }
    }

    /// Returns false once the service should exit
    fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start { config, reply } => match self.coordinator.begin_start(config.clone()) {
                Ok(generation) => {
                    self.pending_start = Some((generation, reply));
                    self.spawn_acquisition(generation, config);
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Stop { reply } => {
                self.coordinator.halt_encoder();
                self.drain_events();
                let result = self.coordinator.stop();
                if matches!(result, Ok(StopOutcome::Cancelled)) {
                    if let Some((_, waiting)) = self.pending_start.take() {
                        let _ = waiting.send(Err(RecordingError::Cancelled));
                    }
                }
                let _ = reply.send(result);
            }
            Command::SetReplayWindow { window_secs, reply } => {
                let result = match self.coordinator.set_replay_window(window_secs) {
                    Ok(WindowChange::Trimmed) => Ok(()),
                    Ok(WindowChange::Restarting { generation, config }) => {
                        self.spawn_acquisition(generation, config);
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::SaveClip { reply } => {
                self.drain_events();
                let _ = reply.send(self.coordinator.save_clip());
            }
            Command::Reset { reply } => {
                let _ = reply.send(self.coordinator.reset());
            }
            Command::TakeOutcome { reply } => {
                let _ = reply.send(self.coordinator.take_outcome());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.coordinator.status());
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    /// Apply every event already delivered
    fn drain_events(&mut self) {
        while let Ok(event) = self.session_rx.try_recv() {
            self.on_event(event);
        }
    }

    fn resolve_start(&mut self, generation: u64, result: RecordingResult<()>) {
        match self.pending_start.take() {
            Some((waiting_for, reply)) if waiting_for == generation => {
                let _ = reply.send(result);
            }
            other => self.pending_start = other,
        }
    }

    fn spawn_acquisition(&self, generation: u64, config: RecordingConfig) {
        let backend = self.backend.clone();
        let tx = self.coordinator.session_sender();
        tokio::spawn(async move {
            let outcome = acquire_media(backend.as_ref(), &config).await;
            if tx
                .send(SessionEvent::Acquired {
                    generation,
                    outcome,
                })
                .is_err()
            {
                tracing::debug!("Recorder gone before capture #{} was granted", generation);
            }
        });
    }

    fn shutdown(&mut self) {
        self.coordinator.shutdown();
        if let Some((_, reply)) = self.pending_start.take() {
            let _ = reply.send(Err(RecordingError::Cancelled));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Grant, SyntheticHost};
    use crate::config::WindowPolicy;
    use crate::recorder::state::StopReason;
    use std::time::Duration;
    use tokio::time::sleep;

    fn spawn_with(host: &SyntheticHost, settings: RecorderSettings) -> RecorderHandle {
        let (handle, _task) =
            spawn_recorder(Arc::new(host.clone()), Arc::new(host.clone()), settings);
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_recording_end_to_end() {
        let host = SyntheticHost::new();
        let recorder = spawn_with(&host, RecorderSettings::default());

        recorder.start(RecordingConfig::manual()).await.unwrap();
        assert_eq!(recorder.state(), SessionState::Active);

        sleep(Duration::from_millis(3500)).await;
        let elapsed_ms = recorder.status().await.unwrap().elapsed_ms;
        let outcome = recorder.stop().await.unwrap();

        // Summed chunk durations match the active time to within one chunk
        let recorded_ms = outcome.summary().unwrap().recorded_ms;
        assert_eq!(recorded_ms, 3000);
        assert!(elapsed_ms >= recorded_ms);
        assert!(elapsed_ms - recorded_ms <= 1000);

        let artifact = outcome.artifact().expect("recording should have data");
        assert_eq!(artifact.chunk_count, 3);
        assert_eq!(artifact.duration_ms, 3000);
        assert_eq!(
            artifact.data,
            b"chunk:0:v1s0m0;chunk:1:v1s0m0;chunk:2:v1s0m0;".to_vec()
        );
        assert_eq!(artifact.content_type, "video/webm");
        assert_eq!(recorder.state(), SessionState::Stopped);
        assert_eq!(host.live_display_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_recording_stops_itself() {
        let host = SyntheticHost::new();
        let recorder = spawn_with(&host, RecorderSettings::default());
        let mut events = recorder.subscribe();

        recorder.start(RecordingConfig::timed(5)).await.unwrap();
        let status = recorder.status().await.unwrap();
        assert!(status.remaining_ms.is_some_and(|ms| ms > 4000 && ms <= 5000));

        loop {
            if let RecordingEvent::Stopped { summary, .. } = events.recv().await.unwrap() {
                assert_eq!(summary.unwrap().reason, StopReason::TimerExpired);
                break;
            }
        }
        assert_eq!(recorder.state(), SessionState::Stopped);
        assert_eq!(host.live_display_streams(), 0);

        let outcome = recorder.take_outcome().await.unwrap().unwrap();
        let recorded = outcome.summary().unwrap().recorded_ms;
        // Whole chunks only, within one chunk of the limit
        assert!((4000..=5000).contains(&recorded));
        assert!(recorder.take_outcome().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_denied_start_reports_and_recovers() {
        let host = SyntheticHost::new();
        host.set_display_grant(Grant::Deny);
        let recorder = spawn_with(&host, RecorderSettings::default());

        let err = recorder.start(RecordingConfig::manual()).await.unwrap_err();
        assert!(matches!(err, RecordingError::PermissionDenied(_)));
        assert_eq!(recorder.state(), SessionState::Error);
        assert_eq!(host.live_display_streams(), 0);

        let status = recorder.status().await.unwrap();
        assert_eq!(
            status.error_kind,
            Some(crate::recorder::error::ErrorKind::PermissionDenied)
        );

        // Retry is an explicit new start
        host.set_display_grant(Grant::Allow);
        recorder.start(RecordingConfig::manual()).await.unwrap();
        assert_eq!(recorder.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_unsupported_is_distinguishable() {
        let host = SyntheticHost::new();
        host.set_display_grant(Grant::Unsupported);
        let recorder = spawn_with(&host, RecorderSettings::default());

        let err = recorder.start(RecordingConfig::manual()).await.unwrap_err();
        assert!(matches!(err, RecordingError::Unsupported(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_permission_prompt_cancels() {
        let host = SyntheticHost::new();
        host.set_acquire_delay(Duration::from_secs(2));
        let recorder = spawn_with(&host, RecorderSettings::default());

        let starter = recorder.clone();
        let start = tokio::spawn(async move { starter.start(RecordingConfig::manual()).await });
        sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.state(), SessionState::AwaitingPermission);

        let outcome = recorder.stop().await.unwrap();
        assert!(matches!(outcome, StopOutcome::Cancelled));
        assert_eq!(start.await.unwrap(), Err(RecordingError::Cancelled));

        // The prompt resolves later; the stream must not stay open
        sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.state(), SessionState::Idle);
        assert_eq!(host.live_display_streams(), 0);
        assert_eq!(host.peak_live_display_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_never_overlap() {
        let host = SyntheticHost::new();
        let recorder = spawn_with(&host, RecorderSettings::default());

        for _ in 0..3 {
            recorder.start(RecordingConfig::manual()).await.unwrap();
            assert_eq!(
                recorder.start(RecordingConfig::manual()).await,
                Err(RecordingError::AlreadyRecording)
            );
            sleep(Duration::from_millis(1500)).await;
            recorder.stop().await.unwrap();
        }
        assert_eq!(host.peak_live_display_streams(), 1);
        assert_eq!(host.live_display_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_revoke_finalizes_recording() {
        let host = SyntheticHost::new();
        let recorder = spawn_with(&host, RecorderSettings::default());
        recorder.start(RecordingConfig::manual()).await.unwrap();

        sleep(Duration::from_millis(2500)).await;
        assert!(host.revoke_display());
        sleep(Duration::from_millis(10)).await;

        assert_eq!(recorder.state(), SessionState::Stopped);
        // A stop after the host ended capture hands over that recording
        let outcome = recorder.stop().await.unwrap();
        assert_eq!(outcome.summary().unwrap().reason, StopReason::HostRevoked);
        assert_eq!(outcome.artifact().unwrap().chunk_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_clip_and_window_change() {
        let host = SyntheticHost::new();
        let settings = RecorderSettings {
            timeslice_ms: 5000,
            ..Default::default()
        };
        let recorder = spawn_with(&host, settings);

        recorder.start(RecordingConfig::replay(60)).await.unwrap();
        sleep(Duration::from_millis(100_500)).await;

        let clip = recorder.save_clip().await.unwrap().unwrap();
        assert_eq!(clip.chunk_count, 12);
        assert_eq!(clip.duration_ms, 60_000);
        assert!(String::from_utf8_lossy(&clip.data).starts_with("chunk:8:"));

        recorder.set_replay_window(180).await.unwrap();
        sleep(Duration::from_secs(200)).await;
        let status = recorder.status().await.unwrap();
        assert!(status.buffered_ms <= 180_000);
        assert_eq!(status.chunk_count, 36);

        let outcome = recorder.stop().await.unwrap();
        assert!(matches!(outcome, StopOutcome::ReplayEnded { .. }));
        assert_eq!(host.peak_live_display_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_policy_reacquires_capture() {
        let host = SyntheticHost::new();
        let settings = RecorderSettings {
            window_policy: WindowPolicy::Restart,
            ..Default::default()
        };
        let recorder = spawn_with(&host, settings);

        recorder.start(RecordingConfig::replay(30)).await.unwrap();
        sleep(Duration::from_millis(5500)).await;
        recorder.set_replay_window(90).await.unwrap();
        sleep(Duration::from_millis(10)).await;

        let status = recorder.status().await.unwrap();
        assert_eq!(status.state, SessionState::Active);
        assert_eq!(status.chunk_count, 0);
        assert_eq!(
            status.mode,
            Some(crate::recorder::state::RecordingMode::Replay { window_secs: 90 })
        );
        assert_eq!(host.live_display_streams(), 1);
        assert_eq!(host.peak_live_display_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_fault_mid_session() {
        let host = SyntheticHost::new();
        let recorder = spawn_with(&host, RecorderSettings::default());
        recorder.start(RecordingConfig::manual()).await.unwrap();

        sleep(Duration::from_millis(1500)).await;
        assert!(host.inject_encoder_fault("encoder crashed"));
        sleep(Duration::from_millis(10)).await;

        assert_eq!(recorder.state(), SessionState::Error);
        assert_eq!(host.live_display_streams(), 0);
        assert_eq!(recorder.stop().await.unwrap_err(), RecordingError::NotRecording);
        recorder.reset().await.unwrap();
        assert_eq!(recorder.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_and_closes() {
        let host = SyntheticHost::new();
        let recorder = spawn_with(&host, RecorderSettings::default());
        recorder
            .start(RecordingConfig::manual().with_audio(true, true))
            .await
            .unwrap();

        recorder.shutdown().await.unwrap();
        assert_eq!(host.live_display_streams(), 0);
        assert_eq!(host.live_microphone_streams(), 0);
        assert_eq!(
            recorder.status().await.unwrap_err(),
            RecordingError::ServiceClosed
        );
    }
}
