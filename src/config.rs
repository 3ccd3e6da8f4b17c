//! Recorder settings
//!
//! Defaults can be overridden from a TOML file; every key is optional.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// What happens to live capture when the replay window changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowPolicy {
    /// Keep capturing; apply the new window to the buffer right away
    #[default]
    Trim,
    /// Tear down the capture and start a fresh one with the new window
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Encoder timeslice: the duration of one chunk
    pub timeslice_ms: u64,
    /// Replay window used when none is given
    pub replay_window_secs: u64,
    /// Preferred MIME type; negotiated against the host's support
    pub preferred_mime_type: Option<String>,
    pub window_policy: WindowPolicy,
    /// Where exported artifacts are written
    pub output_dir: PathBuf,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            timeslice_ms: 1000,
            replay_window_secs: 60,
            preferred_mime_type: None,
            window_policy: WindowPolicy::Trim,
            output_dir: PathBuf::from("recordings"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

impl RecorderSettings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: RecorderSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeslice_ms == 0 {
            return Err(ConfigError::Invalid("timeslice_ms must be positive".to_string()));
        }
        if self.replay_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "replay_window_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }
}
