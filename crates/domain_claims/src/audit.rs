//! Audit status machine
//!
//! A claim becomes auditable once all of its current documents are
//! downloaded. Processing moves it to PENDING, and amount matching concludes
//! it as COMPLETE or REJECTED:
//!
//! ```text
//!   (none) --process--> PENDING --match--> COMPLETE
//!                          |
//!                          +----mismatch--> REJECTED
//! ```
//!
//! COMPLETE and REJECTED are terminal.

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use core_kernel::ClaimId;

use crate::analyzer::{DocumentAnalyzer, ProcessingResults};
use crate::claim::{describe_audit_status, AuditStatus, Claim};
use crate::error::ClaimError;
use crate::matching::{match_amounts, MatchResult, MatchingConfig, MatchingReport};
use crate::ports::TrackingStorePort;

/// Reason recorded for a claim without processing results
pub const NO_RESULTS_REASON: &str = "No processing results available";

/// Counts of one processing pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Counts of one audit pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub audited: usize,
    pub completed: usize,
    pub rejected: usize,
    pub failed_writes: usize,
}

/// Drives claims through processing and amount matching
///
/// The machine is the only writer of claim audit status.
pub struct AuditStatusMachine {
    store: Arc<dyn TrackingStorePort>,
    analyzer: Arc<dyn DocumentAnalyzer>,
    config: MatchingConfig,
}

impl AuditStatusMachine {
    pub fn new(
        store: Arc<dyn TrackingStorePort>,
        analyzer: Arc<dyn DocumentAnalyzer>,
        config: MatchingConfig,
    ) -> Self {
        Self { store, analyzer, config }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Claims with complete attachments whose audit is unset or PENDING
    pub async fn claims_ready_for_processing(&self) -> Result<Vec<Claim>, ClaimError> {
        Ok(self.store.claims_ready_for_processing().await?)
    }

    /// Claims awaiting matching, oldest report date first, capped at the batch size
    pub async fn claims_ready_for_audit(&self) -> Result<Vec<Claim>, ClaimError> {
        Ok(self.store.claims_ready_for_audit(self.config.max_claims_per_batch).await?)
    }

    async fn analyze(&self, claim_id: ClaimId) -> Result<ProcessingResults, ClaimError> {
        let paths: Vec<PathBuf> = self
            .store
            .latest_successful_files(claim_id)
            .await?
            .into_iter()
            .filter_map(|record| record.local_path)
            .collect();

        if paths.is_empty() {
            return Ok(ProcessingResults::new());
        }
        self.analyzer.process(claim_id, &paths).await
    }

    /// Processes the claim's downloaded documents and marks it PENDING
    #[instrument(skip(self, claim), fields(claim_id = %claim.claim_id))]
    pub async fn process_claim(&self, claim: &Claim) -> Result<ProcessingResults, ClaimError> {
        if claim.audit_status.is_some_and(|status| status.is_terminal()) {
            return Err(ClaimError::InvalidStatusTransition {
                from: describe_audit_status(claim.audit_status),
                to: AuditStatus::Pending.to_string(),
            });
        }

        let results = self.analyze(claim.claim_id).await?;

        self.store
            .set_audit_status(claim.claim_id, AuditStatus::Pending, None)
            .await?;

        info!(documents = results.len(), "Claim processed, awaiting matching");
        Ok(results)
    }

    /// Processes every claim ready for processing
    ///
    /// Returns the processing results by claim so the audit pass can reuse them.
    pub async fn process_ready_claims(&self) -> (BTreeMap<ClaimId, ProcessingResults>, ProcessingSummary) {
        let mut results = BTreeMap::new();
        let mut summary = ProcessingSummary::default();

        let claims = match self.claims_ready_for_processing().await {
            Ok(claims) => claims,
            Err(e) => {
                error!(error = %e, "Failed to load claims ready for processing");
                return (results, summary);
            }
        };

        for claim in &claims {
            match self.process_claim(claim).await {
                Ok(processed) => {
                    summary.processed += 1;
                    results.insert(claim.claim_id, processed);
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(claim_id = %claim.claim_id, error = %e, "Failed to process claim");
                }
            }
        }

        (results, summary)
    }

    /// Matches each claim's declared amounts against the amounts extracted
    /// from its processing results
    ///
    /// A claim without results, or whose extraction fails, gets a failed
    /// match with the corresponding reason.
    pub fn run_matching(
        &self,
        claims: &[Claim],
        processing_results: &BTreeMap<ClaimId, ProcessingResults>,
    ) -> BTreeMap<ClaimId, MatchResult> {
        let mut matches = BTreeMap::new();

        for claim in claims {
            let result = match processing_results.get(&claim.claim_id).filter(|results| !results.is_empty()) {
                None => {
                    warn!(claim_id = %claim.claim_id, "No processing results found");
                    MatchResult::unmatched(claim.claim_id, NO_RESULTS_REASON)
                }
                Some(results) => match self.analyzer.extract_amounts(claim, results) {
                    Ok(extracted) => match_amounts(
                        claim.claim_id,
                        claim.labour_amount.unwrap_or_default(),
                        claim.part_amount.unwrap_or_default(),
                        extracted,
                        results.keys().cloned().collect(),
                        &self.config,
                    ),
                    Err(e) => {
                        error!(claim_id = %claim.claim_id, error = %e, "Error matching claim");
                        MatchResult::unmatched(claim.claim_id, format!("Processing error: {}", e))
                    }
                },
            };
            matches.insert(claim.claim_id, result);
        }

        let successful = matches.values().filter(|result| result.match_success).count();
        info!(successful, total = claims.len(), "Batch matching completed");
        matches
    }

    /// Concludes the audit of each claim from its match result
    pub async fn apply_results(&self, claims: &[Claim], matches: &BTreeMap<ClaimId, MatchResult>) -> AuditSummary {
        let mut summary = AuditSummary::default();
        let now = Utc::now();

        for claim in claims {
            let Some(result) = matches.get(&claim.claim_id) else {
                continue;
            };

            let mut updated = claim.clone();
            let target = match updated.conclude_audit(result.match_success, result.reason.clone(), now) {
                Ok(target) => target,
                Err(e) => {
                    warn!(claim_id = %claim.claim_id, error = %e, "Refusing audit transition");
                    continue;
                }
            };

            match self
                .store
                .set_audit_status(claim.claim_id, target, Some(result.reason.as_str()))
                .await
            {
                Ok(()) => {
                    summary.audited += 1;
                    match target {
                        AuditStatus::Complete => summary.completed += 1,
                        _ => summary.rejected += 1,
                    }
                }
                Err(e) => {
                    summary.failed_writes += 1;
                    error!(claim_id = %claim.claim_id, error = %e, "Failed to store audit status");
                }
            }
        }

        summary
    }

    /// Audits the claims awaiting matching
    ///
    /// Results from this cycle's processing pass are used where present;
    /// claims processed in an earlier cycle are analyzed again first.
    pub async fn audit_ready_claims(
        &self,
        mut processing_results: BTreeMap<ClaimId, ProcessingResults>,
    ) -> AuditSummary {
        let claims = match self.claims_ready_for_audit().await {
            Ok(claims) => claims,
            Err(e) => {
                error!(error = %e, "Failed to load claims ready for audit");
                return AuditSummary::default();
            }
        };

        if claims.is_empty() {
            info!("No claims awaiting matching");
            return AuditSummary::default();
        }

        let mut analysis_errors = BTreeMap::new();
        for claim in &claims {
            if processing_results.contains_key(&claim.claim_id) {
                continue;
            }
            match self.analyze(claim.claim_id).await {
                Ok(results) => {
                    processing_results.insert(claim.claim_id, results);
                }
                Err(e) => {
                    warn!(claim_id = %claim.claim_id, error = %e, "Failed to analyze documents for audit");
                    analysis_errors.insert(claim.claim_id, e);
                }
            }
        }

        let mut matches = self.run_matching(&claims, &processing_results);
        for (claim_id, e) in analysis_errors {
            matches.insert(claim_id, MatchResult::unmatched(claim_id, format!("Processing error: {}", e)));
        }
        info!("\n{}", MatchingReport::new(&matches));
        self.apply_results(&claims, &matches).await
    }
}
