//! Screen Replay - screen recording sessions with an instant-replay buffer.
//!
//! Capture and encoding are delegated to a host platform behind the traits in
//! [`capture`] and [`encoder`]. This crate manages the session lifecycle,
//! the rolling replay buffer and artifact export around them.

pub mod capture;
pub mod config;
pub mod encoder;
pub mod export;
pub mod recorder;
pub mod utils;

pub use config::{RecorderSettings, WindowPolicy};
pub use recorder::{spawn_recorder, RecorderHandle, RecordingConfig, RecordingMode, SessionState};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screen_replay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Screen Replay v{}", env!("CARGO_PKG_VERSION"));
}
