mod support;

use proptest::prelude::*;
use sortline_core::ObjectClass;
use std::collections::BTreeMap;
use support::*;

fn class_strategy() -> impl Strategy<Value = ObjectClass> {
    prop_oneof![Just(DIET), Just(ORIGINAL)]
}

/// Frames with non-decreasing capture times and up to four detections each
fn frames_strategy() -> impl Strategy<Value = Vec<ScriptedFrame>> {
    prop::collection::vec(
        (0i64..700, prop::collection::vec((class_strategy(), 0.0f32..=1.0), 0..4)),
        0..40,
    )
    .prop_map(|steps| {
        let mut at = 1_000_000i64;
        steps
            .into_iter()
            .map(|(gap, detections)| {
                at += gap;
                ScriptedFrame::at(at, detections.into_iter().map(|(c, p)| det(c, p)).collect())
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_run_counts_and_pulses_match_qualifying(frames in frames_strategy()) {
        let mut expected: BTreeMap<i64, BTreeMap<ObjectClass, u32>> = BTreeMap::new();
        let mut qualifying = 0u64;
        for frame in &frames {
            for d in frame.detections.iter().flatten() {
                if d.confidence >= 0.3 {
                    qualifying += 1;
                    *expected
                        .entry(frame.at_millis.div_euclid(1000))
                        .or_default()
                        .entry(d.class)
                        .or_default() += 1;
                }
            }
        }

        let mut scenario = ScenarioBuilder::new(frames).build();
        let summary = scenario.control.run().unwrap();

        prop_assert_eq!(summary.qualifying_detections, qualifying);
        prop_assert_eq!(summary.pulses_issued, qualifying);
        prop_assert_eq!(scenario.writes.lock().len() as u64, qualifying * 2);

        // Exactly the seconds with qualifying detections, in order
        let stamps: Vec<i64> = summary.records.iter().map(|r| r.timestamp.unix()).collect();
        let want: Vec<i64> = expected.keys().copied().collect();
        prop_assert_eq!(stamps, want);

        for record in &summary.records {
            let counts = &expected[&record.timestamp.unix()];
            for class in ObjectClass::ALL {
                prop_assert_eq!(record.counts.get(class), counts.get(&class).copied().unwrap_or(0));
            }
        }
    }

    #[test]
    fn test_every_persisted_set_is_deduplicated(frames in frames_strategy(), failures in 0u32..4) {
        let mut scenario = ScenarioBuilder::new(frames).sink_failures(failures).build();
        let summary = scenario.control.run().unwrap();

        let persisted = scenario.persisted.lock();
        for set in persisted.iter() {
            for pair in set.windows(2) {
                prop_assert!(pair[0].timestamp < pair[1].timestamp);
            }
        }
        // Once anything persisted after the faults, it reflects the final log
        if let Some(last) = persisted.last() {
            prop_assert_eq!(last, &summary.records);
        }
    }
}
