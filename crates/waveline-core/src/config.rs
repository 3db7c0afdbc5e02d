//! Engine configuration
//!
//! Mirrors the options a caller hands the engine at construction time plus
//! generic YAML load/save helpers. Validation happens once, in
//! [`EngineConfig::validate`], so a bad file list or sample rate surfaces as
//! a construction-time failure instead of a mystery later on.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::DEFAULT_SAMPLE_RATE;

/// Configuration errors raised at engine construction
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Sample rate must be non-zero
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// The initial file list contains an unusable entry
    #[error("Invalid data for audio files: {0}")]
    InvalidFileList(String),

    /// The active channel index is out of any plausible range
    #[error("Invalid audio channel index: {0}")]
    InvalidChannel(usize),
}

/// Engine construction options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Files to load immediately at construction (may be empty)
    pub audio_files: Vec<String>,
    /// Channel index used for snapshots, patches and the waveform
    pub audio_channel: usize,
    /// Engine sample rate; every file is resampled to this on load
    pub sample_rate: u32,
    /// Per-file display colors; files past the end of this list fall back to
    /// the built-in palette
    pub colors: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audio_files: Vec::new(),
            audio_channel: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            colors: Vec::new(),
        }
    }
}

/// Upper bound on the active channel index; decoded audio never carries more
/// channels than this
pub const MAX_CHANNELS: usize = 32;

impl EngineConfig {
    /// Check the configuration for construction-time errors
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.audio_channel >= MAX_CHANNELS {
            return Err(ConfigError::InvalidChannel(self.audio_channel));
        }
        for url in &self.audio_files {
            if url.trim().is_empty() {
                return Err(ConfigError::InvalidFileList(
                    "empty file name".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config. If the file exists but
/// is invalid, logs a warning and returns default config.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: Failed to read config file: {}, using defaults", e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories as needed
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}
