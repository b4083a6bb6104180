//! Property-Based Test Generators
//!
//! Proptest strategies for claim ids, amounts and download outcome sequences.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::ClaimId;
use domain_claims::FileStatus;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for upstream claim ids
pub fn claim_id_strategy() -> impl Strategy<Value = ClaimId> {
    (1i64..10_000_000i64).prop_map(ClaimId::new)
}

/// Strategy for a set of distinct claim ids
pub fn distinct_claim_ids_strategy(max: usize) -> impl Strategy<Value = Vec<ClaimId>> {
    prop::collection::btree_set(1i64..1_000_000i64, 0..max)
        .prop_map(|ids| ids.into_iter().map(ClaimId::new).collect())
}

/// Strategy for a terminal download status
pub fn download_status_strategy() -> impl Strategy<Value = FileStatus> {
    prop_oneof![Just(FileStatus::Success), Just(FileStatus::Failed)]
}

/// Strategy for a sequence of download outcomes over `files` documents
///
/// Each element is the index of the document and the status recorded for it.
pub fn outcome_sequence_strategy(files: usize, max_len: usize) -> impl Strategy<Value = Vec<(usize, FileStatus)>> {
    prop::collection::vec((0..files.max(1), download_status_strategy()), 0..max_len)
}

/// Strategy for non-negative amounts with two decimal places
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for a tolerance percentage in [0, 100] with two decimal places
pub fn tolerance_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

/// Strategy for timestamps within 2024
pub fn timestamp_2024_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..365 * 24 * 60).prop_map(|minutes| {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_distinct_ids_are_unique(ids in distinct_claim_ids_strategy(50)) {
            let mut sorted = ids.clone();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), ids.len());
        }

        #[test]
        fn test_tolerance_in_range(tolerance in tolerance_strategy()) {
            prop_assert!(tolerance >= Decimal::ZERO);
            prop_assert!(tolerance <= Decimal::ONE_HUNDRED);
        }

        #[test]
        fn test_outcome_indices_in_range(sequence in outcome_sequence_strategy(4, 20)) {
            prop_assert!(sequence.iter().all(|(index, _)| *index < 4));
        }
    }
}
