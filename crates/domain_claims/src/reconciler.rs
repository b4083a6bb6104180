//! Claim reconciliation against the upstream source

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use core_kernel::{ClaimId, PortError};

use crate::claim::{Claim, SelectionReason};
use crate::ports::{ClaimFilter, ClaimSourcePort, TrackingStorePort};

/// Which upstream claims are considered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimQuery {
    pub region_name: String,
    pub status_type_code: String,
    pub report_date_from: DateTime<Utc>,
}

/// Mirrors upstream claims into the tracking store and selects the ones that
/// need a download pass
pub struct ClaimReconciler {
    source: Arc<dyn ClaimSourcePort>,
    store: Arc<dyn TrackingStorePort>,
    query: ClaimQuery,
}

impl ClaimReconciler {
    pub fn new(source: Arc<dyn ClaimSourcePort>, store: Arc<dyn TrackingStorePort>, query: ClaimQuery) -> Self {
        Self { source, store, query }
    }

    /// Returns the claims that are new, were updated upstream, or still miss
    /// documents, after upserting every upstream claim.
    ///
    /// Failures never propagate: a lookup or query failure yields an empty
    /// selection, and a failing upsert only affects that claim. A claim whose
    /// first upsert fails is not selected until a later cycle stores it.
    pub async fn find_claims_needing_attention(&self, now: DateTime<Utc>) -> Vec<Claim> {
        let filter = match self.resolve_filter(now).await {
            Ok(filter) => filter,
            Err(e) => {
                error!(error = %e, region = %self.query.region_name, "Failed to resolve upstream lookup ids");
                return Vec::new();
            }
        };

        let upstream_claims = match self.source.fetch_claims(&filter).await {
            Ok(claims) => claims,
            Err(e) => {
                error!(error = %e, "Failed to fetch upstream claims");
                return Vec::new();
            }
        };

        if upstream_claims.is_empty() {
            info!("No upstream claims in the report window");
            return Vec::new();
        }

        let ids: Vec<ClaimId> = upstream_claims.iter().map(|claim| claim.claim_id).collect();
        let local: HashMap<ClaimId, Claim> = match self.store.get_claims(&ids).await {
            Ok(claims) => claims.into_iter().map(|claim| (claim.claim_id, claim)).collect(),
            Err(e) => {
                error!(error = %e, "Failed to read local claim snapshots");
                return Vec::new();
            }
        };

        let mut selected = Vec::new();
        let mut upsert_failures = 0usize;

        for upstream in &upstream_claims {
            let snapshot = local.get(&upstream.claim_id);
            let reason = SelectionReason::evaluate(upstream, snapshot);

            let stored = match self.store.upsert_claim(upstream).await {
                Ok(claim) => claim,
                Err(e) => {
                    upsert_failures += 1;
                    warn!(claim_id = %upstream.claim_id, error = %e, "Failed to upsert claim");
                    match snapshot {
                        Some(existing) => {
                            let mut merged = existing.clone();
                            merged.refresh_from_upstream(upstream, now);
                            merged
                        }
                        // Nothing stored to track downloads against.
                        None => continue,
                    }
                }
            };

            if let Some(reason) = reason {
                debug!(claim_id = %upstream.claim_id, reason = ?reason, "Claim selected for download");
                selected.push(stored);
            }
        }

        info!(
            upstream = upstream_claims.len(),
            selected = selected.len(),
            upsert_failures,
            "Claim reconciliation finished"
        );
        selected
    }

    async fn resolve_filter(&self, now: DateTime<Utc>) -> Result<ClaimFilter, PortError> {
        let region_id = self.source.region_id(&self.query.region_name).await?;
        let status_id = self.source.status_code_id(&self.query.status_type_code).await?;
        Ok(ClaimFilter {
            region_id,
            status_id,
            report_date_from: self.query.report_date_from,
            as_of: now,
        })
    }
}
