use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::annotation::channel::{AnnotationSet, Channel, Stream};
use crate::annotation::collection::LockState;
use crate::annotation::diff::diff_sets;
use crate::annotation::labels::{Category, Label};
use crate::annotation::store::{self, AnnotationStore};
use crate::annotation::types::Annotation;
use crate::error::{Error, Result};
use crate::kernel::event::CursorUpdate;
use crate::kernel::time::{Timestamp, PROXIMITY};

/// Labels every subject channel starts from after a load or reset.
pub const BASELINE: [Label; 3] = [Label::NoPlay, Label::Solitary, Label::Passive];

/// Annotation state of one coding session. Owned by the coding thread.
#[derive(Debug)]
pub struct AnnotationSession {
    set: AnnotationSet,
    cursor: Timestamp,
    bounds: Option<(Timestamp, Timestamp)>,
    default_lock: LockState,
    store: AnnotationStore,
}

impl AnnotationSession {
    pub fn new(default_lock: LockState, store: AnnotationStore) -> Self {
        Self {
            set: AnnotationSet::new(default_lock),
            cursor: Timestamp::default(),
            bounds: None,
            default_lock,
            store,
        }
    }

    pub fn set(&self) -> &AnnotationSet {
        &self.set
    }

    pub fn cursor(&self) -> Timestamp {
        self.cursor
    }

    pub fn bounds(&self) -> Option<(Timestamp, Timestamp)> {
        self.bounds
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    /// A recording was loaded. An empty set gets the baseline at `begin`.
    pub fn initialize(&mut self, begin: Timestamp, end: Timestamp) {
        self.bounds = Some((begin, end));
        self.cursor = begin;
        if self.set.is_empty() {
            self.seed_baseline();
        }
        info!("Session initialized: [{:.3}, {:.3}]", begin.secs, end.secs);
    }

    /// Start `label` at the cursor on every channel of `stream`.
    pub fn new_annotation(&mut self, stream: Stream, label: Label) -> Result<()> {
        if !label.is_codable() {
            return Err(Error::UnknownLabel(label.name().to_string()));
        }
        for channel in stream.channels() {
            self.set.get_mut(*channel).add(Annotation::at(label, self.cursor));
        }
        debug!("{} on {:?} at {:.3}", label, stream, self.cursor.secs);
        Ok(())
    }

    pub fn on_cursor(&mut self, update: CursorUpdate) {
        let previous = self.cursor;
        for (_, collection) in self.set.iter_mut() {
            collection.track_cursor(previous, update.time, update.motion);
            collection.update_active(update.time);
        }
        self.cursor = update.time;
    }

    /// Playback resumed: categories whose last stop is at the cursor go live again.
    pub fn on_resume(&mut self) {
        let cursor = self.cursor;
        for (channel, collection) in self.set.iter_mut() {
            for category in Category::ALL {
                if !collection.is_locked(category) {
                    continue;
                }
                if let Some(last) = collection.last_stop_in(category) {
                    if cursor.since(last).abs() <= PROXIMITY {
                        debug!("resume: unlocking {} on {}", category.name(), channel.name());
                        collection.unlock(category);
                    }
                }
            }
        }
    }

    /// Clear every channel and restart from the baseline at the cursor.
    pub fn reset(&mut self) {
        self.set.clear();
        self.seed_baseline();
        info!("Annotations reset at {:.3}", self.cursor.secs);
    }

    /// Replace the set with the contents of `path`. On failure the current set
    /// is left untouched.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let mut loaded = self.store.load(path, self.default_lock)?;

        // Loaded history is protected until the cursor reaches its frontier.
        for (_, collection) in loaded.iter_mut() {
            for category in Category::ALL {
                if collection.last_stop_in(category).is_some() {
                    collection.lock(category);
                }
            }
        }
        self.set = loaded;
        self.on_resume();
        Ok(())
    }

    pub fn save(&mut self, path: Option<&Path>) -> Result<Option<PathBuf>> {
        self.store.save(&self.set, path)
    }

    /// Diff the current set against the set stored at `path`.
    pub fn diff_against(&self, path: &Path) -> Result<AnnotationSet> {
        let other = store::read_file(path, self.default_lock)?;
        Ok(diff_sets(&self.set, &other))
    }

    fn seed_baseline(&mut self) {
        for channel in [Channel::Purple, Channel::Yellow] {
            let collection = self.set.get_mut(channel);
            for label in BASELINE {
                collection.add(Annotation::at(label, self.cursor));
            }
        }
    }
}
