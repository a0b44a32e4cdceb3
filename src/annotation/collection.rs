use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::annotation::labels::{Category, Label};
use crate::annotation::types::Annotation;
use crate::kernel::event::CursorMotion;
use crate::kernel::time::{Timestamp, EPSILON, PROXIMITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Locked,
    #[default]
    Unlocked,
}

/// Ordered interval store for one channel.
///
/// Intervals live in a flat vector sorted by `start`; "current" and "next"
/// are indices into it. Within a category intervals never overlap: `add` and
/// `update_active` are the only mutation paths and both preserve that.
#[derive(Debug, Clone)]
pub struct AnnotationCollection {
    annotations: Vec<Annotation>,
    locks: [LockState; 3],
    default_lock: LockState,
}

impl Default for AnnotationCollection {
    fn default() -> Self {
        Self::new(LockState::Unlocked)
    }
}

impl AnnotationCollection {
    pub fn new(default_lock: LockState) -> Self {
        Self {
            annotations: Vec::new(),
            locks: [default_lock; 3],
            default_lock,
        }
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.annotations.iter()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Insert an interval, carving it out of whatever same-category interval
    /// it lands in.
    pub fn add(&mut self, mut annotation: Annotation) {
        let Some(category) = annotation.category() else {
            warn!("Refusing to store sentinel label {}", annotation.label);
            return;
        };

        // An explicit insertion re-enables live coding for its category.
        self.unlock(category);

        if annotation.stop <= annotation.start {
            annotation.stop = annotation.start.offset(EPSILON);
        }

        let mut remainders = Vec::new();
        for existing in self
            .annotations
            .iter_mut()
            .filter(|a| a.category() == Some(category))
        {
            if existing.contains(annotation.start) {
                if existing.stop > annotation.stop {
                    remainders.push(Annotation {
                        start: annotation.stop,
                        ..*existing
                    });
                }
                existing.stop = annotation.start;
            } else if existing.start > annotation.start && existing.start < annotation.stop {
                // Starts under the new interval: keep only what sticks out.
                existing.start = annotation.stop;
            }
        }

        debug!(
            "add {} [{:.3}, {:.3}) splitting {} interval(s)",
            annotation.label,
            annotation.start.secs,
            annotation.stop.secs,
            remainders.len()
        );

        self.annotations.extend(remainders);
        self.annotations.push(annotation);
        self.purge_degenerate();
        self.sort();
    }

    /// Called once per cursor tick: extend each unlocked category's open
    /// interval up to `cursor`.
    pub fn update_active(&mut self, cursor: Timestamp) {
        self.purge_degenerate();

        for category in Category::ALL {
            if self.is_locked(category) {
                continue;
            }
            let Some(current) = self.closest_stop_before(cursor, category) else {
                continue;
            };
            self.annotations[current].stop = cursor;

            if let Some(next) = self.next_in_category(current) {
                if self.annotations[next].start < cursor {
                    self.annotations[next].start = cursor;
                }
            }
        }

        self.sort();
    }

    /// Lock policy applied before `update_active` on every cursor update.
    ///
    /// A jump further than `PROXIMITY` locks every category. Advancing past a
    /// locked category's last stop unlocks it again.
    pub fn track_cursor(&mut self, previous: Timestamp, cursor: Timestamp, motion: CursorMotion) {
        if motion == CursorMotion::Jump && cursor.since(previous).abs() > PROXIMITY {
            debug!("cursor jump {:.3} -> {:.3}: locking all categories", previous.secs, cursor.secs);
            self.lock_all();
            return;
        }

        if motion != CursorMotion::Advance {
            return;
        }
        for category in Category::ALL {
            if !self.is_locked(category) {
                continue;
            }
            if let Some(last) = self.last_stop_in(category) {
                if previous < last && last <= cursor {
                    debug!("cursor crossed frontier of {}: unlocking", category.name());
                    self.unlock(category);
                }
            }
        }
    }

    /// Label of the interval containing `time`, or `Label::Missing`.
    pub fn label_at(&self, time: Timestamp) -> Label {
        self.annotations
            .iter()
            .find(|a| a.contains(time))
            .map(|a| a.label)
            .unwrap_or(Label::Missing)
    }

    /// Same as `label_at`, restricted to one category.
    pub fn label_in(&self, category: Category, time: Timestamp) -> Label {
        self.annotations
            .iter()
            .filter(|a| a.category() == Some(category))
            .find(|a| a.contains(time))
            .map(|a| a.label)
            .unwrap_or(Label::Missing)
    }

    pub fn filter_by_category(&self, category: Category) -> AnnotationCollection {
        let mut filtered = AnnotationCollection::new(self.default_lock);
        for annotation in self.annotations.iter().filter(|a| a.category() == Some(category)) {
            filtered.add(*annotation);
        }
        filtered
    }

    /// Latest stop over all intervals, `Timestamp::MIN` when empty.
    pub fn last_stop_time(&self) -> Timestamp {
        self.annotations
            .iter()
            .map(|a| a.stop)
            .max()
            .unwrap_or(Timestamp::MIN)
    }

    pub fn last_stop_in(&self, category: Category) -> Option<Timestamp> {
        self.annotations
            .iter()
            .filter(|a| a.category() == Some(category))
            .map(|a| a.stop)
            .max()
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
        self.locks = [self.default_lock; 3];
    }

    pub fn is_locked(&self, category: Category) -> bool {
        self.locks[category.index()] == LockState::Locked
    }

    pub fn lock(&mut self, category: Category) {
        self.locks[category.index()] = LockState::Locked;
    }

    pub fn unlock(&mut self, category: Category) {
        self.locks[category.index()] = LockState::Unlocked;
    }

    pub fn lock_all(&mut self) {
        self.locks = [LockState::Locked; 3];
    }

    pub fn unlock_all(&mut self) {
        self.locks = [LockState::Unlocked; 3];
    }

    fn closest_stop_before(&self, cursor: Timestamp, category: Category) -> Option<usize> {
        self.annotations
            .iter()
            .enumerate()
            .filter(|(_, a)| a.category() == Some(category))
            .filter(|(_, a)| a.stop <= cursor && cursor.since(a.stop) <= PROXIMITY)
            .min_by(|(_, a), (_, b)| cursor.since(a.stop).total_cmp(&cursor.since(b.stop)))
            .map(|(i, _)| i)
    }

    fn next_in_category(&self, index: usize) -> Option<usize> {
        let category = self.annotations[index].category();
        self.annotations
            .iter()
            .enumerate()
            .skip(index + 1)
            .find(|(_, a)| a.category() == category)
            .map(|(i, _)| i)
    }

    fn purge_degenerate(&mut self) {
        self.annotations.retain(|a| !a.is_degenerate());
    }

    fn sort(&mut self) {
        self.annotations.sort_by_key(|a| a.start);
    }
}

impl<'a> IntoIterator for &'a AnnotationCollection {
    type Item = &'a Annotation;
    type IntoIter = std::slice::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.annotations.iter()
    }
}
