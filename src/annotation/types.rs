use serde::Serialize;
use crate::annotation::labels::{Category, Label};
use crate::kernel::time::Timestamp;

/// One coded interval `[start, stop)` on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Annotation {
    pub label: Label,
    pub start: Timestamp,
    pub stop: Timestamp,
    /// Set only on Diff Engine outputs.
    pub is_conflicted: bool,
}

impl Annotation {
    pub fn new(label: Label, start: Timestamp, stop: Timestamp) -> Self {
        Self { label, start, stop, is_conflicted: false }
    }

    /// Zero-length annotation at the cursor, the shape produced by live coding.
    pub fn at(label: Label, cursor: Timestamp) -> Self {
        Self::new(label, cursor, cursor)
    }

    pub fn conflict(category: Category, start: Timestamp, stop: Timestamp) -> Self {
        Self {
            label: category.conflict_label(),
            start,
            stop,
            is_conflicted: true,
        }
    }

    pub fn category(&self) -> Option<Category> {
        self.label.category()
    }

    /// Half-open containment.
    pub fn contains(&self, time: Timestamp) -> bool {
        self.start <= time && time < self.stop
    }

    pub fn is_degenerate(&self) -> bool {
        self.start >= self.stop
    }

    pub fn duration(&self) -> f64 {
        self.stop.since(self.start)
    }
}
