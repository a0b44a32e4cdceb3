//! Property tests for the interval store and the diff engine.

use proptest::prelude::*;
use proptest::test_runner::Config;

use annotator::annotation::diff::diff;
use annotator::annotation::{Annotation, AnnotationCollection, Category, Label};
use annotator::kernel::event::CursorMotion;
use annotator::kernel::time::Timestamp;

const PICKS: [Label; 8] = [
    Label::GoalOriented,
    Label::Aimless,
    Label::NoPlay,
    Label::Solitary,
    Label::Parallel,
    Label::Prosocial,
    Label::Passive,
    Label::Frustrated,
];

/// (label, start in tenths of a second, length in tenths, possibly zero)
fn interval() -> impl Strategy<Value = (Label, u32, u32)> {
    (prop::sample::select(PICKS.to_vec()), 0u32..500, 0u32..120)
}

fn build(intervals: &[(Label, u32, u32)]) -> AnnotationCollection {
    let mut collection = AnnotationCollection::default();
    for (label, start, length) in intervals {
        let start = Timestamp::from_secs(*start as f64 / 10.0);
        let stop = start.offset(*length as f64 / 10.0);
        collection.add(Annotation::new(*label, start, stop));
    }
    collection
}

fn check_partition(collection: &AnnotationCollection) -> Result<(), TestCaseError> {
    for annotation in collection.iter() {
        prop_assert!(annotation.stop > annotation.start, "degenerate {:?}", annotation);
    }
    for category in Category::ALL {
        let intervals: Vec<_> = collection
            .iter()
            .filter(|a| a.category() == Some(category))
            .collect();
        for pair in intervals.windows(2) {
            prop_assert!(
                pair[0].stop <= pair[1].start,
                "overlap in {}: {:?} / {:?}",
                category.name(),
                pair[0],
                pair[1]
            );
        }
    }
    Ok(())
}

fn conflict_ranges(collection: &AnnotationCollection) -> Vec<(Timestamp, Timestamp)> {
    collection
        .iter()
        .filter(|a| a.is_conflicted)
        .map(|a| (a.start, a.stop))
        .collect()
}

proptest! {
    #![proptest_config(Config {
        cases: 200,
        ..Config::default()
    })]

    #[test]
    fn prop_add_keeps_categories_partitioned(intervals in prop::collection::vec(interval(), 0..40)) {
        let collection = build(&intervals);
        check_partition(&collection)?;

        let starts: Vec<_> = collection.iter().map(|a| a.start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        prop_assert_eq!(starts, sorted);
    }

    #[test]
    fn prop_cursor_ticks_keep_partition(
        intervals in prop::collection::vec(interval(), 1..20),
        steps in prop::collection::vec(0u32..8, 1..60),
    ) {
        let mut collection = build(&intervals);
        let mut cursor = Timestamp::from_secs(0.0);
        for step in steps {
            let next = cursor.offset(step as f64 / 10.0);
            collection.track_cursor(cursor, next, CursorMotion::Advance);
            collection.update_active(next);
            cursor = next;
            check_partition(&collection)?;
        }
    }

    #[test]
    fn prop_diff_with_itself_agrees(intervals in prop::collection::vec(interval(), 0..30)) {
        let a = build(&intervals);
        for category in Category::ALL {
            let out = diff(&a, &a, category);
            prop_assert!(conflict_ranges(&out).is_empty());
            for annotation in out.iter() {
                prop_assert_eq!(a.label_in(category, annotation.start), annotation.label);
            }
        }
    }

    #[test]
    fn prop_diff_conflicts_are_symmetric(
        first in prop::collection::vec(interval(), 0..25),
        second in prop::collection::vec(interval(), 0..25),
    ) {
        let a = build(&first);
        let b = build(&second);
        for category in Category::ALL {
            let ab = diff(&a, &b, category);
            let ba = diff(&b, &a, category);
            check_partition(&ab)?;
            prop_assert_eq!(conflict_ranges(&ab), conflict_ranges(&ba));
        }
    }
}
