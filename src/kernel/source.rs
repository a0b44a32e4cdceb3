//! Event sources: ordered, topic-tagged streams of timestamped payloads.

use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::event::{RecordedMessage, Topic};
use super::time::Timestamp;
use crate::error::{Error, Result};

pub type MessageIter<'a> = Box<dyn Iterator<Item = Result<RecordedMessage>> + Send + 'a>;

pub trait EventSource: Send {
    /// Time of the first and last message.
    fn bounds(&self) -> (Timestamp, Timestamp);

    /// Messages with `begin <= time <= end`, in time order. An `Err` item is a
    /// single message that failed to decode; iteration may continue past it.
    fn read_range(&mut self, begin: Timestamp, end: Timestamp) -> Result<MessageIter<'_>>;
}

/// Source backed by a vector, for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    messages: Vec<RecordedMessage>,
}

impl MemorySource {
    pub fn new(mut messages: Vec<RecordedMessage>) -> Self {
        messages.sort_by_key(|m| m.time);
        Self { messages }
    }
}

impl EventSource for MemorySource {
    fn bounds(&self) -> (Timestamp, Timestamp) {
        match (self.messages.first(), self.messages.last()) {
            (Some(first), Some(last)) => (first.time, last.time),
            _ => (Timestamp::default(), Timestamp::default()),
        }
    }

    fn read_range(&mut self, begin: Timestamp, end: Timestamp) -> Result<MessageIter<'_>> {
        Ok(Box::new(
            self.messages
                .iter()
                .filter(move |m| m.time >= begin && m.time <= end)
                .cloned()
                .map(Ok),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct RecordLine {
    topic: String,
    time: f64,
    #[serde(default)]
    data: Vec<u8>,
}

/// JSON-lines recording: one `{"topic", "time", "data"}` object per line,
/// in time order.
#[derive(Debug)]
pub struct RecordingFile {
    path: PathBuf,
    begin: Timestamp,
    end: Timestamp,
}

impl RecordingFile {
    /// Open and scan the recording for its bounds. Fails if the file cannot be
    /// read or holds no decodable message of a known topic.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Loading recording {:?}...", path);
        let reader = BufReader::new(File::open(&path)?);

        let mut bounds: Option<(Timestamp, Timestamp)> = None;
        let mut skipped = 0usize;
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match parse_line(&line) {
                Some(Ok(msg)) => {
                    bounds = Some(match bounds {
                        None => (msg.time, msg.time),
                        Some((b, e)) => (b.min(msg.time), e.max(msg.time)),
                    });
                }
                Some(Err(_)) => skipped += 1,
                None => {}
            }
        }

        let (begin, end) = bounds.ok_or_else(|| Error::EmptyRecording(path.clone()))?;
        if skipped > 0 {
            warn!("{} undecodable line(s) in {:?}", skipped, path);
        }
        info!("Loading completed: [{:.3}, {:.3}]", begin.secs, end.secs);
        Ok(Self { path, begin, end })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `None` for blank lines and unknown topics.
fn parse_line(line: &str) -> Option<Result<RecordedMessage>> {
    if line.trim().is_empty() {
        return None;
    }
    let record: RecordLine = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return Some(Err(Error::Decode(e.to_string()))),
    };
    let Some(topic) = Topic::from_name(&record.topic) else {
        debug!("ignoring message on unknown topic {}", record.topic);
        return None;
    };
    let time = Timestamp::from_secs(record.time);
    if !time.is_representable() {
        return Some(Err(Error::Decode(format!(
            "timestamp {} out of range on {}",
            record.time, record.topic
        ))));
    }
    Some(Ok(RecordedMessage {
        topic,
        time,
        data: record.data,
    }))
}

impl EventSource for RecordingFile {
    fn bounds(&self) -> (Timestamp, Timestamp) {
        (self.begin, self.end)
    }

    fn read_range(&mut self, begin: Timestamp, end: Timestamp) -> Result<MessageIter<'_>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let iter = reader
            .lines()
            .filter_map(|line| match line {
                Ok(line) => parse_line(&line),
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    Some(Err(Error::Decode(format!("unreadable line: {}", e))))
                }
                Err(e) => Some(Err(Error::Io(e))),
            })
            .filter(move |item| match item {
                Ok(msg) => msg.time >= begin && msg.time <= end,
                Err(_) => true,
            });
        Ok(Box::new(iter))
    }
}
