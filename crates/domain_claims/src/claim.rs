//! Claim aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ClaimId, CoreError};
use crate::error::ClaimError;

/// Claim-level rollup of document download completeness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttachmentStatus {
    /// No document of the current version has been downloaded
    Pending,
    /// Some, but not all, documents have been downloaded
    Partial,
    /// Every document of the current version has been downloaded
    Complete,
}

impl AttachmentStatus {
    /// Derives the rollup from the number of successful latest-version
    /// downloads and the number of documents upstream reports for the claim.
    pub fn from_counts(successful: u32, total: u32) -> Self {
        if total > 0 && successful == total {
            AttachmentStatus::Complete
        } else if successful == 0 {
            AttachmentStatus::Pending
        } else {
            AttachmentStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentStatus::Pending => "PENDING",
            AttachmentStatus::Partial => "PARTIAL",
            AttachmentStatus::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for AttachmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttachmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AttachmentStatus::Pending),
            "PARTIAL" => Ok(AttachmentStatus::Partial),
            "COMPLETE" => Ok(AttachmentStatus::Complete),
            other => Err(CoreError::validation(format!("unknown attachment status '{}'", other))),
        }
    }
}

/// Claim-level state of the amount-matching review
///
/// A claim without an audit status has not been processed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditStatus {
    /// Documents processed, awaiting amount matching
    Pending,
    /// Amounts reconciled
    Complete,
    /// Amounts failed to reconcile
    Rejected,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "PENDING",
            AuditStatus::Complete => "COMPLETE",
            AuditStatus::Rejected => "REJECTED",
        }
    }

    /// COMPLETE and REJECTED have no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuditStatus::Complete | AuditStatus::Rejected)
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AuditStatus::Pending),
            "COMPLETE" => Ok(AuditStatus::Complete),
            "REJECTED" => Ok(AuditStatus::Rejected),
            other => Err(CoreError::validation(format!("unknown audit status '{}'", other))),
        }
    }
}

/// A claim as reported by the upstream source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamClaim {
    pub claim_id: ClaimId,
    pub claim_no: String,
    pub vin: Option<String>,
    pub gross_credit: Option<Decimal>,
    pub report_date: Option<DateTime<Utc>>,
    pub labour_amount: Option<Decimal>,
    pub part_amount: Option<Decimal>,
    /// Last time the claim changed upstream
    pub upstream_updated_at: DateTime<Utc>,
    pub auditing_date: Option<DateTime<Utc>>,
    pub dealer_code: Option<String>,
    pub dealer_name: Option<String>,
}

/// Why a claim was selected for a download pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// The claim has never been seen locally
    NewClaim,
    /// Upstream changed the claim after the local snapshot was taken
    UpstreamUpdated,
    /// Some documents of the current version are still missing
    AttachmentsIncomplete,
}

impl SelectionReason {
    /// Decides whether `upstream` needs a download pass given the local snapshot
    pub fn evaluate(upstream: &UpstreamClaim, local: Option<&Claim>) -> Option<Self> {
        match local {
            None => Some(SelectionReason::NewClaim),
            Some(local) if upstream.upstream_updated_at > local.upstream_updated_at => {
                Some(SelectionReason::UpstreamUpdated)
            }
            Some(local) if local.attachment_status != AttachmentStatus::Complete => {
                Some(SelectionReason::AttachmentsIncomplete)
            }
            Some(_) => None,
        }
    }
}

/// The locally tracked state of a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Upstream identifier
    pub claim_id: ClaimId,
    /// Claim number
    pub claim_no: String,
    /// Vehicle identification number
    pub vin: Option<String>,
    pub dealer_code: Option<String>,
    pub dealer_name: Option<String>,
    pub report_date: Option<DateTime<Utc>>,
    pub gross_credit: Option<Decimal>,
    /// Labour amount declared in the dealer system
    pub labour_amount: Option<Decimal>,
    /// Parts amount declared in the dealer system
    pub part_amount: Option<Decimal>,
    /// Upstream update timestamp mirrored at the last reconciliation
    pub upstream_updated_at: DateTime<Utc>,
    pub auditing_date: Option<DateTime<Utc>>,
    /// Documents upstream reported at the last enumeration
    pub total_files_count: u32,
    /// Latest-version documents downloaded successfully
    pub downloaded_files_count: u32,
    pub attachment_status: AttachmentStatus,
    pub audit_status: Option<AuditStatus>,
    /// Reason recorded with the last audit decision
    pub audit_reason: Option<String>,
    pub last_modified_at: DateTime<Utc>,
}

impl Claim {
    /// Creates the local snapshot for a claim seen for the first time
    pub fn from_upstream(upstream: &UpstreamClaim, now: DateTime<Utc>) -> Self {
        Self {
            claim_id: upstream.claim_id,
            claim_no: upstream.claim_no.clone(),
            vin: upstream.vin.clone(),
            dealer_code: upstream.dealer_code.clone(),
            dealer_name: upstream.dealer_name.clone(),
            report_date: upstream.report_date,
            gross_credit: upstream.gross_credit,
            labour_amount: upstream.labour_amount,
            part_amount: upstream.part_amount,
            upstream_updated_at: upstream.upstream_updated_at,
            auditing_date: upstream.auditing_date,
            total_files_count: 0,
            downloaded_files_count: 0,
            attachment_status: AttachmentStatus::Pending,
            audit_status: None,
            audit_reason: None,
            last_modified_at: now,
        }
    }

    /// Overwrites the upstream-mirrored fields, leaving tracking state alone
    pub fn refresh_from_upstream(&mut self, upstream: &UpstreamClaim, now: DateTime<Utc>) {
        self.claim_no = upstream.claim_no.clone();
        self.vin = upstream.vin.clone();
        self.dealer_code = upstream.dealer_code.clone();
        self.dealer_name = upstream.dealer_name.clone();
        self.report_date = upstream.report_date;
        self.gross_credit = upstream.gross_credit;
        self.labour_amount = upstream.labour_amount;
        self.part_amount = upstream.part_amount;
        self.upstream_updated_at = upstream.upstream_updated_at;
        self.auditing_date = upstream.auditing_date;
        self.last_modified_at = now;
    }

    /// Replaces the observed document count
    pub fn set_total_files(&mut self, total: u32, now: DateTime<Utc>) {
        self.total_files_count = total;
        self.last_modified_at = now;
    }

    /// Applies a freshly aggregated download count
    pub fn apply_attachment_rollup(&mut self, successful: u32, now: DateTime<Utc>) {
        self.downloaded_files_count = successful;
        self.attachment_status = AttachmentStatus::from_counts(successful, self.total_files_count);
        self.last_modified_at = now;
    }

    /// Attachments are complete and the audit has not concluded
    pub fn is_ready_for_processing(&self) -> bool {
        self.attachment_status == AttachmentStatus::Complete
            && matches!(self.audit_status, None | Some(AuditStatus::Pending))
    }

    /// Attachments are complete and documents have been processed
    pub fn is_ready_for_audit(&self) -> bool {
        self.attachment_status == AttachmentStatus::Complete
            && self.audit_status == Some(AuditStatus::Pending)
    }

    /// Marks the claim as processed and awaiting amount matching
    pub fn mark_ready_for_matching(&mut self, now: DateTime<Utc>) {
        self.audit_status = Some(AuditStatus::Pending);
        self.last_modified_at = now;
    }

    /// Records the outcome of amount matching
    ///
    /// Only a claim awaiting matching can conclude its audit.
    pub fn conclude_audit(
        &mut self,
        passed: bool,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<AuditStatus, ClaimError> {
        let target = if passed { AuditStatus::Complete } else { AuditStatus::Rejected };

        if self.audit_status != Some(AuditStatus::Pending) {
            return Err(ClaimError::InvalidStatusTransition {
                from: describe_audit_status(self.audit_status),
                to: target.to_string(),
            });
        }

        self.audit_status = Some(target);
        self.audit_reason = Some(reason.into());
        self.last_modified_at = now;
        Ok(target)
    }

    /// Declared labour plus parts amount, missing values counting as zero
    pub fn total_declared_amount(&self) -> Decimal {
        self.labour_amount.unwrap_or_default() + self.part_amount.unwrap_or_default()
    }
}

/// Renders an optional audit status for messages
pub fn describe_audit_status(status: Option<AuditStatus>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "NONE".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn upstream(updated_at: DateTime<Utc>) -> UpstreamClaim {
        UpstreamClaim {
            claim_id: ClaimId::new(1),
            claim_no: "WC-0001".to_string(),
            vin: Some("LGXC74C40N0000001".to_string()),
            gross_credit: Some(dec!(1500)),
            report_date: Some(updated_at),
            labour_amount: Some(dec!(1000)),
            part_amount: Some(dec!(500)),
            upstream_updated_at: updated_at,
            auditing_date: None,
            dealer_code: Some("D001".to_string()),
            dealer_name: Some("Dealer One".to_string()),
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_rollup_from_counts() {
        assert_eq!(AttachmentStatus::from_counts(0, 0), AttachmentStatus::Pending);
        assert_eq!(AttachmentStatus::from_counts(0, 3), AttachmentStatus::Pending);
        assert_eq!(AttachmentStatus::from_counts(1, 3), AttachmentStatus::Partial);
        assert_eq!(AttachmentStatus::from_counts(3, 3), AttachmentStatus::Complete);
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in [AttachmentStatus::Pending, AttachmentStatus::Partial, AttachmentStatus::Complete] {
            assert_eq!(status.as_str().parse::<AttachmentStatus>().unwrap(), status);
        }
        for status in [AuditStatus::Pending, AuditStatus::Complete, AuditStatus::Rejected] {
            assert_eq!(status.as_str().parse::<AuditStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<AuditStatus>().is_err());
    }

    #[test]
    fn test_selection_reasons() {
        let now = base_time();
        let fresh = upstream(now);
        assert_eq!(SelectionReason::evaluate(&fresh, None), Some(SelectionReason::NewClaim));

        let mut local = Claim::from_upstream(&fresh, now);
        assert_eq!(
            SelectionReason::evaluate(&fresh, Some(&local)),
            Some(SelectionReason::AttachmentsIncomplete)
        );

        local.total_files_count = 1;
        local.apply_attachment_rollup(1, now);
        assert_eq!(SelectionReason::evaluate(&fresh, Some(&local)), None);

        let updated = upstream(now + Duration::hours(1));
        assert_eq!(
            SelectionReason::evaluate(&updated, Some(&local)),
            Some(SelectionReason::UpstreamUpdated)
        );
    }

    #[test]
    fn test_refresh_keeps_tracking_state() {
        let now = base_time();
        let mut claim = Claim::from_upstream(&upstream(now), now);
        claim.set_total_files(2, now);
        claim.apply_attachment_rollup(2, now);

        let mut changed = upstream(now + Duration::days(1));
        changed.labour_amount = Some(dec!(1200));
        claim.refresh_from_upstream(&changed, now + Duration::days(1));

        assert_eq!(claim.labour_amount, Some(dec!(1200)));
        assert_eq!(claim.attachment_status, AttachmentStatus::Complete);
        assert_eq!(claim.total_files_count, 2);
    }

    #[test]
    fn test_audit_transitions() {
        let now = base_time();
        let mut claim = Claim::from_upstream(&upstream(now), now);
        assert!(!claim.is_ready_for_processing());

        claim.set_total_files(1, now);
        claim.apply_attachment_rollup(1, now);
        assert!(claim.is_ready_for_processing());
        assert!(!claim.is_ready_for_audit());

        assert!(claim.conclude_audit(true, "ok", now).is_err());

        claim.mark_ready_for_matching(now);
        assert!(claim.is_ready_for_audit());

        let status = claim.conclude_audit(false, "Amount mismatch in: parts", now).unwrap();
        assert_eq!(status, AuditStatus::Rejected);
        assert!(!claim.is_ready_for_processing());
        assert!(claim.conclude_audit(true, "retry", now).is_err());
    }

    #[test]
    fn test_total_declared_amount_treats_missing_as_zero() {
        let now = base_time();
        let mut claim = Claim::from_upstream(&upstream(now), now);
        claim.part_amount = None;
        assert_eq!(claim.total_declared_amount(), dec!(1000));
    }
}
