//! Demo driver: runs recorder sessions against the synthetic host and
//! writes the resulting artifacts to disk.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use screen_replay::capture::{Grant, SyntheticHost};
use screen_replay::export::write_artifact;
use screen_replay::recorder::{RecorderHandle, RecordingEvent, StopOutcome};
use screen_replay::utils::ErrorResponse;
use screen_replay::{init_tracing, spawn_recorder, RecorderSettings, RecordingConfig, WindowPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(name = "screen-replay", version, about = "Screen recording with instant replay")]
struct Cli {
    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for exported recordings and clips
    #[arg(long)]
    output: Option<PathBuf>,

    /// Chunk length in milliseconds
    #[arg(long)]
    timeslice_ms: Option<u64>,

    /// Include system audio
    #[arg(long)]
    system_audio: bool,

    /// Include the microphone
    #[arg(long)]
    mic: bool,

    /// Simulate the user refusing the microphone prompt
    #[arg(long)]
    deny_mic: bool,

    /// Simulate the user refusing the screen prompt
    #[arg(long)]
    deny_capture: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Regular recording
    Record {
        /// Time limit in seconds; 0 records until --stop-after
        #[arg(long, default_value_t = 0)]
        duration: u64,

        /// Stop manually after this many seconds
        #[arg(long, default_value_t = 5)]
        stop_after: u64,
    },
    /// Rolling instant replay
    Replay {
        /// Replay window in seconds
        #[arg(long)]
        window: Option<u64>,

        /// How long to keep the replay running before saving a clip
        #[arg(long, default_value_t = 10)]
        run_for: u64,

        /// Change the window to this many seconds halfway through
        #[arg(long)]
        resize_to: Option<u64>,

        /// Restart capture on window change instead of trimming
        #[arg(long)]
        restart_on_resize: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => RecorderSettings::load(path)
            .with_context(|| format!("failed to load settings from {:?}", path))?,
        None => RecorderSettings::default(),
    };
    if let Some(output) = &cli.output {
        settings.output_dir = output.clone();
    }
    if let Some(timeslice_ms) = cli.timeslice_ms {
        settings.timeslice_ms = timeslice_ms;
    }
    if let Command::Replay {
        restart_on_resize: true,
        ..
    } = cli.command
    {
        settings.window_policy = WindowPolicy::Restart;
    }
    settings.validate()?;

    let host = SyntheticHost::new();
    if cli.deny_capture {
        host.set_display_grant(Grant::Deny);
    }
    if cli.deny_mic {
        host.set_microphone_grant(Grant::Deny);
    }

    let output_dir = settings.output_dir.clone();
    let default_window = settings.replay_window_secs;
    let (recorder, task) = spawn_recorder(Arc::new(host.clone()), Arc::new(host), settings);
    let printer = tokio::spawn(print_events(recorder.clone()));

    let result = match cli.command {
        Command::Record {
            duration,
            stop_after,
        } => {
            let config = RecordingConfig::timed(duration).with_audio(cli.system_audio, cli.mic);
            record(&recorder, config, stop_after, &output_dir).await
        }
        Command::Replay {
            window,
            run_for,
            resize_to,
            ..
        } => {
            let config = RecordingConfig::replay(window.unwrap_or(default_window))
                .with_audio(cli.system_audio, cli.mic);
            replay(&recorder, config, run_for, resize_to, &output_dir).await
        }
    };

    recorder.shutdown().await?;
    task.await?;
    printer.abort();
    result
}

async fn record(
    recorder: &RecorderHandle,
    config: RecordingConfig,
    stop_after: u64,
    output_dir: &std::path::Path,
) -> Result<()> {
    let time_limit = config.mode.time_limit();
    if let Err(e) = recorder.start(config).await {
        report(&e);
        return Ok(());
    }

    let wait = match time_limit {
        // Let the countdown end the session
        Some(limit) => limit + Duration::from_millis(200),
        None => Duration::from_secs(stop_after),
    };
    tokio::time::sleep(wait).await;

    match recorder.stop().await? {
        StopOutcome::Saved { artifact, .. } => {
            let path = write_artifact(&artifact, output_dir)?;
            println!("Saved {} ({} bytes)", path.display(), artifact.size());
        }
        StopOutcome::NoData { .. } => println!("Nothing was captured."),
        other => println!("Session ended: {}", other.label()),
    }
    Ok(())
}

async fn replay(
    recorder: &RecorderHandle,
    config: RecordingConfig,
    run_for: u64,
    resize_to: Option<u64>,
    output_dir: &std::path::Path,
) -> Result<()> {
    if let Err(e) = recorder.start(config).await {
        report(&e);
        return Ok(());
    }

    let half = Duration::from_secs(run_for) / 2;
    tokio::time::sleep(half).await;
    if let Some(window) = resize_to {
        recorder.set_replay_window(window).await?;
    }
    tokio::time::sleep(Duration::from_secs(run_for) - half).await;

    match recorder.save_clip().await? {
        Some(clip) => {
            let path = write_artifact(&clip, output_dir)?;
            println!(
                "Saved clip {} ({} chunks, {}ms)",
                path.display(),
                clip.chunk_count,
                clip.duration_ms
            );
        }
        None => println!("Replay buffer is empty."),
    }
    recorder.stop().await?;
    Ok(())
}

fn report(error: &screen_replay::recorder::RecordingError) {
    let response = ErrorResponse::from(error);
    match serde_json::to_string(&response) {
        Ok(json) => eprintln!("{}", json),
        Err(_) => eprintln!("{}: {}", response.code, response.message),
    }
}

async fn print_events(recorder: RecorderHandle) {
    let mut events = recorder.subscribe();
    loop {
        match events.recv().await {
            Ok(RecordingEvent::ChunkCaptured { .. }) => {}
            Ok(RecordingEvent::Warning { message }) => eprintln!("warning: {}", message),
            Ok(other) => tracing::debug!("event: {:?}", other),
            Err(RecvError::Lagged(skipped)) => tracing::debug!("skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
