//! Text command vocabulary accepted from the control front end.
//!
//! Commands are validated here; the core only ever sees well-formed calls.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;

use crate::annotation::{Label, Stream};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Annotation { stream: Stream, label: Label },
    Pause,
    Resume,
    TogglePause,
    IsPaused,
    JumpBy(i64),
    JumpTo(i64),
    ClearAll,
    Save(Option<PathBuf>),
    Load(PathBuf),
    Diff(PathBuf),
    SaveDiff(PathBuf),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0}")]
    Unknown(String),

    #[error("{0} needs an argument")]
    MissingArgument(&'static str),

    #[error("{0} takes no argument")]
    UnexpectedArgument(&'static str),

    #[error("not an integer: {0}")]
    BadInteger(String),

    #[error("bad annotation payload: {0}")]
    BadPayload(String),

    #[error("unknown stream {0}")]
    UnknownStream(String),

    #[error("unknown annotation type {0}")]
    UnknownType(String),
}

#[derive(Debug, Deserialize)]
struct AnnotationPayload {
    stream: String,
    #[serde(rename = "type")]
    kind: String,
}

impl Command {
    /// Parse `name` or `name=<argument>`.
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        let (name, argument) = match line.split_once('=') {
            Some((name, argument)) => (name.trim(), Some(argument.trim())),
            None => (line, None),
        };

        match name {
            "annotation" => parse_annotation(argument.ok_or(CommandError::MissingArgument("annotation"))?),
            "pause" => no_argument("pause", argument, Command::Pause),
            "resume" => no_argument("resume", argument, Command::Resume),
            "togglepause" => no_argument("togglepause", argument, Command::TogglePause),
            "ispaused" => no_argument("ispaused", argument, Command::IsPaused),
            "clearall" => no_argument("clearall", argument, Command::ClearAll),
            "jumpby" => Ok(Command::JumpBy(parse_seconds(argument.ok_or(CommandError::MissingArgument("jumpby"))?)?)),
            "jumpto" => Ok(Command::JumpTo(parse_seconds(argument.ok_or(CommandError::MissingArgument("jumpto"))?)?)),
            "save" => Ok(Command::Save(argument.filter(|a| !a.is_empty()).map(PathBuf::from))),
            "load" => Ok(Command::Load(path_argument("load", argument)?)),
            "diff" => Ok(Command::Diff(path_argument("diff", argument)?)),
            "savediff" => Ok(Command::SaveDiff(path_argument("savediff", argument)?)),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn no_argument(name: &'static str, argument: Option<&str>, command: Command) -> Result<Command, CommandError> {
    match argument {
        Some(a) if !a.is_empty() => Err(CommandError::UnexpectedArgument(name)),
        _ => Ok(command),
    }
}

fn parse_seconds(argument: &str) -> Result<i64, CommandError> {
    argument
        .parse()
        .map_err(|_| CommandError::BadInteger(argument.to_string()))
}

fn path_argument(name: &'static str, argument: Option<&str>) -> Result<PathBuf, CommandError> {
    match argument {
        Some(a) if !a.is_empty() => Ok(PathBuf::from(a)),
        _ => Err(CommandError::MissingArgument(name)),
    }
}

fn parse_annotation(argument: &str) -> Result<Command, CommandError> {
    let payload: AnnotationPayload =
        serde_json::from_str(argument).map_err(|e| CommandError::BadPayload(e.to_string()))?;
    let stream = Stream::from_name(&payload.stream).ok_or(CommandError::UnknownStream(payload.stream))?;
    let label = Label::from_name(&payload.kind)
        .ok()
        .filter(|l| l.is_codable())
        .ok_or(CommandError::UnknownType(payload.kind))?;
    Ok(Command::Annotation { stream, label })
}

/// Response to one command, printed as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub ok: bool,
    pub body: Value,
}

impl Reply {
    pub fn ok() -> Self {
        Self::with(json!("ok"))
    }

    pub fn with(body: Value) -> Self {
        Self { ok: true, body }
    }

    pub fn bad_request(message: impl std::fmt::Display) -> Self {
        Self {
            ok: false,
            body: json!(message.to_string()),
        }
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{\"ok\":false}"))
    }
}
