//! YAML persistence: `{channel: [{label: [start, stop]}, ...]}`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::annotation::channel::{AnnotationSet, Channel};
use crate::annotation::collection::LockState;
use crate::annotation::labels::Label;
use crate::annotation::types::Annotation;
use crate::error::{Error, Result};
use crate::kernel::time::Timestamp;

type Entry = BTreeMap<String, (f64, f64)>;
type Document = BTreeMap<String, Vec<Entry>>;

pub fn encode(set: &AnnotationSet) -> Result<String> {
    let mut document = Document::new();
    for (channel, collection) in set.iter() {
        let entries = collection
            .iter()
            .map(|a| {
                let mut entry = Entry::new();
                entry.insert(a.label.name().to_string(), (a.start.secs, a.stop.secs));
                entry
            })
            .collect();
        document.insert(channel.file_key().to_string(), entries);
    }
    Ok(serde_yaml::to_string(&document)?)
}

/// Parse a document into a fresh set. Every entry is replayed through
/// `add`, so overlapping input is resolved rather than trusted.
pub fn decode(text: &str, default_lock: LockState) -> Result<AnnotationSet> {
    let document: Document = serde_yaml::from_str(text)?;
    let mut set = AnnotationSet::new(default_lock);

    for (key, entries) in document {
        let channel = Channel::from_file_key(&key)
            .ok_or_else(|| Error::InvalidFile(format!("unknown channel {}", key)))?;
        let collection = set.get_mut(channel);

        for (position, entry) in entries.into_iter().enumerate() {
            if entry.len() != 1 {
                return Err(Error::InvalidFile(format!(
                    "{}[{}]: expected one label per entry, found {}",
                    key,
                    position,
                    entry.len()
                )));
            }
            for (name, (start, stop)) in entry {
                if !start.is_finite() || !stop.is_finite() {
                    return Err(Error::InvalidFile(format!("{}[{}]: non-finite time", key, position)));
                }
                let label = Label::from_name(&name)?;
                collection.add(Annotation {
                    is_conflicted: label.is_conflict(),
                    ..Annotation::new(label, Timestamp::from_secs(start), Timestamp::from_secs(stop))
                });
            }
        }
        debug!("decoded {} interval(s) for {}", collection.len(), channel.name());
    }
    Ok(set)
}

pub fn read_file(path: &Path, default_lock: LockState) -> Result<AnnotationSet> {
    let text = fs::read_to_string(path)?;
    decode(&text, default_lock)
}

pub fn write_file(path: &Path, set: &AnnotationSet) -> Result<()> {
    let text = encode(set)?;
    fs::write(path, text)?;
    Ok(())
}

/// Remembers where the annotations of the session live.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    path: Option<PathBuf>,
}

impl AnnotationStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read a set and adopt `path` as the save location on success.
    pub fn load(&mut self, path: &Path, default_lock: LockState) -> Result<AnnotationSet> {
        let set = read_file(path, default_lock)?;
        info!("Loaded {} annotation(s) from {:?}", set.len(), path);
        self.path = Some(path.to_path_buf());
        Ok(set)
    }

    /// Save to `path`, or to the remembered path when `None`. Returns the path
    /// written, or `None` when there was nowhere to write.
    pub fn save(&mut self, set: &AnnotationSet, path: Option<&Path>) -> Result<Option<PathBuf>> {
        let target = match path.or(self.path.as_deref()) {
            Some(p) => p.to_path_buf(),
            None => {
                debug!("save skipped: no annotation path");
                return Ok(None);
            }
        };
        write_file(&target, set)?;
        info!("Saved {} annotation(s) to {:?}", set.len(), target);
        self.path = Some(target.clone());
        Ok(Some(target))
    }
}
