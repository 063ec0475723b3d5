//! Property tests for the saturation latch.

use proptest::prelude::*;

use crate::{SaturationManager, SaturationStateChange, Watermarks};

prop_compose! {
    fn arb_watermarks()(low in 0u32..512, gap in 0u32..512) -> Watermarks {
        Watermarks::new(low, low + gap)
    }
}

/// Single-threaded reference: what the latch must report for each delta.
fn model(marks: Watermarks, deltas: &[i64]) -> Vec<SaturationStateChange> {
    let mut size = 0i64;
    let mut saturated = false;
    deltas
        .iter()
        .map(|delta| {
            size += delta;
            if size <= i64::from(marks.low) && saturated {
                saturated = false;
                SaturationStateChange::Desaturated
            } else if size > i64::from(marks.high) && !saturated {
                saturated = true;
                SaturationStateChange::Saturated
            } else {
                SaturationStateChange::NoChange
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn matches_reference_model(
        marks in arb_watermarks(),
        deltas in prop::collection::vec(-600i64..600, 0..200),
    ) {
        let manager = SaturationManager::new(marks);
        let actual: Vec<_> = deltas.iter().map(|d| manager.apply_delta(*d)).collect();
        prop_assert_eq!(actual, model(marks, &deltas));
        prop_assert_eq!(manager.queue_size(), deltas.iter().sum::<i64>());
    }

    #[test]
    fn transitions_strictly_alternate(
        marks in arb_watermarks(),
        deltas in prop::collection::vec(-600i64..600, 0..200),
    ) {
        let manager = SaturationManager::new(marks);
        let mut expect_saturated_next = true;
        for delta in deltas {
            match manager.apply_delta(delta) {
                SaturationStateChange::Saturated => {
                    prop_assert!(expect_saturated_next);
                    expect_saturated_next = false;
                }
                SaturationStateChange::Desaturated => {
                    prop_assert!(!expect_saturated_next);
                    expect_saturated_next = true;
                }
                SaturationStateChange::NoChange => {}
            }
            prop_assert_eq!(manager.is_saturated(), !expect_saturated_next);
        }
    }

    #[test]
    fn deltas_inside_the_gap_never_fire(marks in arb_watermarks(), rounds in 0usize..100) {
        prop_assume!(marks.high > marks.low);
        let manager = SaturationManager::new(marks);
        // Park the queue just above the low watermark, then wobble by one
        // byte without ever leaving the gap.
        prop_assert_eq!(
            manager.apply_delta(i64::from(marks.low) + 1),
            SaturationStateChange::NoChange
        );
        for _ in 0..rounds {
            if marks.high > marks.low + 1 {
                prop_assert_eq!(manager.apply_delta(1), SaturationStateChange::NoChange);
                prop_assert_eq!(manager.apply_delta(-1), SaturationStateChange::NoChange);
            } else {
                prop_assert_eq!(manager.apply_delta(0), SaturationStateChange::NoChange);
            }
        }
        prop_assert!(!manager.is_saturated());
    }
}
