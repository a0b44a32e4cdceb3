//! Runtime configuration.
//!
//! Sources, highest priority first:
//! 1. Command-line flags
//! 2. `ANNOTATOR_CONFIG` (path of the TOML file)
//! 3. TOML file
//! 4. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::annotation::LockState;
use crate::error::{Error, Result};

pub const CONFIG_ENV: &str = "ANNOTATOR_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Recording to replay
    #[serde(default)]
    pub recording: Option<PathBuf>,

    /// Annotation file loaded at startup and used as the save location
    #[serde(default)]
    pub annotations: Option<PathBuf>,

    /// Autosave period in seconds. 0 disables autosave.
    #[serde(default = "default_autosave_secs")]
    pub autosave_secs: u64,

    /// Lock state of every category in a fresh or cleared collection
    #[serde(default)]
    pub default_lock: LockState,

    /// Capacity of each notification channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_autosave_secs() -> u64 {
    60
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recording: None,
            annotations: None,
            autosave_secs: default_autosave_secs(),
            default_lock: LockState::default(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {:?}: {}", path, e)))?;
        let config = Self::from_toml(&text)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// File named on the command line, else the one in `ANNOTATOR_CONFIG`,
    /// else defaults.
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn autosave(&self) -> Option<Duration> {
        (self.autosave_secs > 0).then(|| Duration::from_secs(self.autosave_secs))
    }
}
