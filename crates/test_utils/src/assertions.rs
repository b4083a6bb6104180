//! Custom Test Assertions
//!
//! Assertion helpers for claim rollup and audit state that give more
//! meaningful failure messages than plain `assert_eq!`.

use domain_claims::{AttachmentStatus, AuditStatus, Claim, FileRecord};
use rust_decimal::Decimal;

/// Asserts the claim's rollup agrees with its latest successful file records
///
/// # Arguments
///
/// * `claim` - The stored claim snapshot
/// * `files` - Every stored file record of the claim
///
/// # Panics
///
/// Panics if the downloaded count differs from the number of latest
/// successful records, or if the attachment status does not follow from the
/// counts.
pub fn assert_completeness_invariant(claim: &Claim, files: &[FileRecord]) {
    let successful = files
        .iter()
        .filter(|record| record.claim_id == claim.claim_id && record.is_latest_version && record.is_successful())
        .count() as u32;

    assert_eq!(
        claim.downloaded_files_count, successful,
        "Claim {} reports {} downloaded files but {} latest records succeeded",
        claim.claim_id, claim.downloaded_files_count, successful
    );

    let complete = claim.total_files_count > 0 && successful == claim.total_files_count;
    assert_eq!(
        claim.attachment_status == AttachmentStatus::Complete,
        complete,
        "Claim {} is {} with {}/{} files",
        claim.claim_id,
        claim.attachment_status,
        successful,
        claim.total_files_count
    );

    if successful == 0 {
        assert_eq!(
            claim.attachment_status,
            AttachmentStatus::Pending,
            "Claim {} has no downloads but is {}",
            claim.claim_id,
            claim.attachment_status
        );
    }
}

/// Asserts the claim's attachment counters and status
pub fn assert_attachment(claim: &Claim, status: AttachmentStatus, downloaded: u32, total: u32) {
    assert_eq!(
        (claim.attachment_status, claim.downloaded_files_count, claim.total_files_count),
        (status, downloaded, total),
        "Unexpected attachment state for claim {}",
        claim.claim_id
    );
}

/// Asserts the claim's audit status and, optionally, the recorded reason
pub fn assert_audit(claim: &Claim, status: Option<AuditStatus>, reason_contains: Option<&str>) {
    assert_eq!(
        claim.audit_status, status,
        "Unexpected audit status for claim {} (reason: {:?})",
        claim.claim_id, claim.audit_reason
    );

    if let Some(fragment) = reason_contains {
        let reason = claim.audit_reason.as_deref().unwrap_or_default();
        assert!(
            reason.contains(fragment),
            "Audit reason '{}' of claim {} does not mention '{}'",
            reason,
            claim.claim_id,
            fragment
        );
    }
}

/// Asserts that two decimals differ by at most `tolerance`
pub fn assert_decimal_approx_eq(actual: Decimal, expected: Decimal, tolerance: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "Decimals differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual,
        expected,
        diff,
        tolerance
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decimal_approx_eq_passes() {
        assert_decimal_approx_eq(dec!(100.004), dec!(100.00), dec!(0.01));
    }

    #[test]
    #[should_panic(expected = "differ by more than tolerance")]
    fn test_decimal_approx_eq_fails() {
        assert_decimal_approx_eq(dec!(100.5), dec!(100.00), dec!(0.01));
    }
}
