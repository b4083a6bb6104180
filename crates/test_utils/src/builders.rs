//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults. Tests
//! only set the fields they care about.

use chrono::{DateTime, Utc};
use core_kernel::{ClaimId, FileId};
use rust_decimal::Decimal;
use std::path::PathBuf;

use domain_claims::{DownloadOutcome, FileStatus, UpstreamClaim, UpstreamFile};

use crate::fixtures::{AmountFixtures, IdFixtures, TemporalFixtures};

/// Builder for upstream claims
pub struct UpstreamClaimBuilder {
    claim: UpstreamClaim,
}

impl Default for UpstreamClaimBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamClaimBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        let claim_id = IdFixtures::claim_id();
        Self {
            claim: UpstreamClaim {
                claim_id,
                claim_no: format!("WC{}", claim_id),
                vin: Some("9BWZZZ377VT004251".to_string()),
                gross_credit: Some(AmountFixtures::gross_credit()),
                report_date: Some(TemporalFixtures::report_date()),
                labour_amount: Some(AmountFixtures::labour()),
                part_amount: Some(AmountFixtures::parts()),
                upstream_updated_at: TemporalFixtures::upstream_updated_at(),
                auditing_date: None,
                dealer_code: Some("BR-0042".to_string()),
                dealer_name: Some("Concessionaria Paulista".to_string()),
            },
        }
    }

    /// Sets the claim id; the claim number follows it
    pub fn with_claim_id(mut self, id: ClaimId) -> Self {
        self.claim.claim_id = id;
        self.claim.claim_no = format!("WC{}", id);
        self
    }

    pub fn with_claim_no(mut self, claim_no: impl Into<String>) -> Self {
        self.claim.claim_no = claim_no.into();
        self
    }

    pub fn with_amounts(mut self, labour: Decimal, parts: Decimal) -> Self {
        self.claim.labour_amount = Some(labour);
        self.claim.part_amount = Some(parts);
        self.claim.gross_credit = Some(labour + parts);
        self
    }

    pub fn with_report_date(mut self, date: DateTime<Utc>) -> Self {
        self.claim.report_date = Some(date);
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.claim.upstream_updated_at = updated_at;
        self
    }

    pub fn build(self) -> UpstreamClaim {
        self.claim
    }
}

/// Builder for upstream document records
pub struct UpstreamFileBuilder {
    file: UpstreamFile,
}

impl Default for UpstreamFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamFileBuilder {
    pub fn new() -> Self {
        Self {
            file: UpstreamFile {
                claim_id: IdFixtures::claim_id(),
                file_id: IdFixtures::file_id(),
                file_name: "invoice.pdf".to_string(),
                create_timestamp: TemporalFixtures::document_created_at(),
            },
        }
    }

    /// A document of `claim_id` whose id is derived from `index`
    pub fn for_claim(claim_id: ClaimId, index: usize) -> Self {
        Self::new()
            .with_claim_id(claim_id)
            .with_file_id(IdFixtures::file_id_for(claim_id, index))
            .with_file_name(format!("invoice_{}.pdf", index))
    }

    pub fn with_claim_id(mut self, id: ClaimId) -> Self {
        self.file.claim_id = id;
        self
    }

    pub fn with_file_id(mut self, id: FileId) -> Self {
        self.file.file_id = id;
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file.file_name = name.into();
        self
    }

    pub fn with_created_at(mut self, created: DateTime<Utc>) -> Self {
        self.file.create_timestamp = created;
        self
    }

    pub fn build(self) -> UpstreamFile {
        self.file
    }
}

/// Builder for download outcomes
pub struct DownloadOutcomeBuilder {
    outcome: DownloadOutcome,
}

impl Default for DownloadOutcomeBuilder {
    fn default() -> Self {
        Self::success()
    }
}

impl DownloadOutcomeBuilder {
    /// A successful download of the fixture document
    pub fn success() -> Self {
        let claim_id = IdFixtures::claim_id();
        let file_id = IdFixtures::file_id();
        Self {
            outcome: DownloadOutcome {
                local_path: Some(PathBuf::from(format!("/srv/claims/20240304/CLAIM_{}_{}.pdf", claim_id, file_id))),
                file_id,
                claim_id,
                claim_no: format!("WC{}", claim_id),
                remote_file_name: "invoice.pdf".to_string(),
                status: FileStatus::Success,
                error_message: None,
                claim_last_modified: Some(TemporalFixtures::upstream_updated_at()),
            },
        }
    }

    /// A failed download of the fixture document
    pub fn failure(reason: impl Into<String>) -> Self {
        let mut builder = Self::success();
        builder.outcome.status = FileStatus::Failed;
        builder.outcome.local_path = None;
        builder.outcome.error_message = Some(reason.into());
        builder
    }

    pub fn with_file_id(mut self, id: FileId) -> Self {
        self.outcome.file_id = id;
        self
    }

    pub fn with_claim_id(mut self, id: ClaimId) -> Self {
        self.outcome.claim_id = id;
        self.outcome.claim_no = format!("WC{}", id);
        self
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.outcome.local_path = Some(path.into());
        self
    }

    pub fn with_claim_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.outcome.claim_last_modified = Some(at);
        self
    }

    pub fn build(self) -> DownloadOutcome {
        self.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_builder_keeps_number_in_step() {
        let claim = UpstreamClaimBuilder::new().with_claim_id(ClaimId::new(5)).build();
        assert_eq!(claim.claim_no, "WC5");
    }

    #[test]
    fn test_failure_builder_has_no_path() {
        let outcome = DownloadOutcomeBuilder::failure("HTTP 404").build();
        assert_eq!(outcome.status, FileStatus::Failed);
        assert!(outcome.local_path.is_none());
        assert_eq!(outcome.error_message.as_deref(), Some("HTTP 404"));
    }

    #[test]
    fn test_file_builder_for_claim() {
        let a = UpstreamFileBuilder::for_claim(ClaimId::new(9), 1).build();
        let b = UpstreamFileBuilder::for_claim(ClaimId::new(9), 2).build();
        assert_ne!(a.file_id, b.file_id);
        assert_eq!(a.claim_id, ClaimId::new(9));
    }
}
