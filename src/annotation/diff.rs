//! Reconciles two independently coded tracks into one agreement/conflict track.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::annotation::channel::AnnotationSet;
use crate::annotation::collection::{AnnotationCollection, LockState};
use crate::annotation::labels::{Category, Label};
use crate::annotation::types::Annotation;
use crate::kernel::time::Timestamp;

/// Diff `track1` against `track2` over one category.
///
/// Spans where the tracks agree keep the shared label. Spans where they
/// disagree, or where only one track has a label, become `OTHER_<category>`
/// conflicts. Spans missing from both are left empty.
pub fn diff(track1: &AnnotationCollection, track2: &AnnotationCollection, category: Category) -> AnnotationCollection {
    let a = track1.filter_by_category(category);
    let b = track2.filter_by_category(category);
    let points = breakpoints(a.as_slice(), b.as_slice());

    let mut out = AnnotationCollection::new(LockState::Unlocked);
    for span in points.windows(2) {
        let (from, to) = (span[0], span[1]);
        if to <= from {
            continue;
        }
        match (a.label_at(from), b.label_at(from)) {
            (Label::Missing, Label::Missing) => {}
            (l1, l2) if l1 == l2 => out.add(Annotation {
                is_conflicted: l1.is_conflict(),
                ..Annotation::new(l1, from, to)
            }),
            _ => out.add(Annotation::conflict(category, from, to)),
        }
    }

    debug!(
        "diff over {}: {} breakpoints, {} intervals",
        category.name(),
        points.len(),
        out.len()
    );
    out
}

/// Merged breakpoint sequence of two sorted, non-overlapping tracks.
fn breakpoints(track1: &[Annotation], track2: &[Annotation]) -> Vec<Timestamp> {
    let first = match (track1.first(), track2.first()) {
        (Some(a), Some(b)) => a.start.min(b.start),
        (Some(a), None) => a.start,
        (None, Some(b)) => b.start,
        (None, None) => return Vec::new(),
    };

    let mut points = vec![first];
    let (mut i, mut j) = (0, 0);
    let mut now = first;
    loop {
        // Tracks whose current interval ends here move on together.
        while i < track1.len() && track1[i].stop <= now {
            i += 1;
        }
        while j < track2.len() && track2[j].stop <= now {
            j += 1;
        }

        let next = [track1.get(i), track2.get(j)]
            .into_iter()
            .flatten()
            .flat_map(|a| [a.start, a.stop])
            .filter(|t| *t > now)
            .min();
        let Some(next) = next else {
            break;
        };
        points.push(next);
        now = next;
    }
    points
}

/// Diff every channel and category of two sets. Each output channel holds the
/// diffs of all three categories.
pub fn diff_sets(a: &AnnotationSet, b: &AnnotationSet) -> AnnotationSet {
    let mut out = AnnotationSet::new(LockState::Unlocked);
    for (channel, track1) in a.iter() {
        let track2 = b.get(channel);
        let target = out.get_mut(channel);
        for category in Category::ALL {
            for annotation in &diff(track1, track2, category) {
                target.add(*annotation);
            }
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelDiff {
    pub intervals: usize,
    pub conflicts: usize,
    pub conflicted_secs: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffSummary {
    pub channels: BTreeMap<String, ChannelDiff>,
}

impl DiffSummary {
    pub fn of(diffed: &AnnotationSet) -> Self {
        let channels = diffed
            .iter()
            .map(|(channel, collection)| {
                let mut entry = ChannelDiff {
                    intervals: collection.len(),
                    ..ChannelDiff::default()
                };
                for annotation in collection.iter().filter(|a| a.is_conflicted) {
                    entry.conflicts += 1;
                    entry.conflicted_secs += annotation.duration();
                }
                (channel.name().to_string(), entry)
            })
            .collect();
        Self { channels }
    }

    pub fn total_conflicts(&self) -> usize {
        self.channels.values().map(|c| c.conflicts).sum()
    }
}
