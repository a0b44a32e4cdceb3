//! Error types shared by the annotation engine and the playback kernel.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// File could not be opened, read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Annotation file is not valid YAML
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Label name outside the static label table
    #[error("unknown annotation type {0}")]
    UnknownLabel(String),

    /// Annotation file parsed but does not follow the expected layout
    #[error("invalid annotation file: {0}")]
    InvalidFile(String),

    #[error("recording {0:?} contains no readable message")]
    EmptyRecording(PathBuf),

    /// A single recorded message failed to decode
    #[error("decode error: {0}")]
    Decode(String),

    #[error("no recording loaded")]
    NotLoaded,

    #[error("playback already running")]
    AlreadyRunning,
}
