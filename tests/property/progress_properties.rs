//! Property-based tests for reward arithmetic and text validation.
//!
//! Uses proptest to verify:
//! 1. `claim_available` always equals `claimable_count > 0`.
//! 2. `tasks_until_next` stays within `1..=unit_size`.
//! 3. The milestone label is always a multiple of `unit_size` above the count.
//! 4. Text validation accepts exactly the trimmed lengths in `3..=100`.
//! 5. Snapshots survive a JSON round trip without gaining a settable flag.

use proptest::prelude::*;
use taskmint_proto::codec;
use taskmint_proto::progress::ProgressSnapshot;
use taskmint_proto::task::{MAX_TASK_TEXT_LEN, MIN_TASK_TEXT_LEN, validate_task_text};

/// Strategy for snapshots with arbitrary (but valid) counters.
fn arb_snapshot() -> impl Strategy<Value = ProgressSnapshot> {
    (0u64..1_000_000, 0u64..10_000, 1u64..1_000, 0u64..100).prop_filter_map(
        "unit size is positive",
        |(completed, claimed, unit, claimable)| {
            ProgressSnapshot::new(completed, claimed, unit, claimable).ok()
        },
    )
}

proptest! {
    #[test]
    fn claim_available_is_derived(s in arb_snapshot()) {
        prop_assert_eq!(s.claim_available(), s.claimable_count() > 0);
    }

    #[test]
    fn tasks_until_next_in_range(s in arb_snapshot()) {
        let left = s.tasks_until_next();
        prop_assert!(left >= 1);
        prop_assert!(left <= s.unit_size());
    }

    #[test]
    fn next_milestone_is_unit_multiple(s in arb_snapshot()) {
        let label = s.next_milestone();
        prop_assert!(label > s.completed_count());
        prop_assert_eq!(label % s.unit_size(), 0);
    }

    #[test]
    fn progress_fraction_in_unit_interval(s in arb_snapshot()) {
        let f = s.progress_fraction();
        prop_assert!((0.0..1.0).contains(&f));
    }

    #[test]
    fn derive_matches_earned_minus_claimed(
        completed in 0u64..100_000,
        claimed in 0u64..100,
        unit in 1u64..50,
    ) {
        let s = ProgressSnapshot::derive(completed, claimed, unit).unwrap();
        prop_assert_eq!(s.claimable_count(), (completed / unit).saturating_sub(claimed));
        prop_assert_eq!(s.claim_available(), s.claimable_count() > 0);
    }

    #[test]
    fn snapshot_json_round_trip(s in arb_snapshot()) {
        let bytes = codec::encode(&s).unwrap();
        let decoded: ProgressSnapshot = codec::decode(&bytes).unwrap();
        prop_assert_eq!(s, decoded);
    }

    #[test]
    fn validation_accepts_exactly_bounded_lengths(
        body in "[a-zA-Z0-9ёж]{0,120}",
        pad_left in " {0,4}",
        pad_right in "[ \t]{0,4}",
    ) {
        let candidate = format!("{pad_left}{body}{pad_right}");
        let len = body.chars().count();
        let result = validate_task_text(&candidate);
        if (MIN_TASK_TEXT_LEN..=MAX_TASK_TEXT_LEN).contains(&len) {
            prop_assert_eq!(result.unwrap(), body);
        } else {
            prop_assert!(result.is_err());
        }
    }
}
