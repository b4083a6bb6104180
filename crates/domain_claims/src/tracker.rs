//! Download outcome tracking and attachment rollup

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, instrument};

use core_kernel::ClaimId;

use crate::claim::AttachmentStatus;
use crate::error::ClaimError;
use crate::file_record::{DownloadOutcome, FileRecord};
use crate::ports::TrackingStorePort;

/// Records download outcomes and keeps the claim rollup in step with them
///
/// The tracker is the only writer of file record status.
#[derive(Clone)]
pub struct DownloadTracker {
    store: Arc<dyn TrackingStorePort>,
}

impl DownloadTracker {
    pub fn new(store: Arc<dyn TrackingStorePort>) -> Self {
        Self { store }
    }

    /// Merges the outcome into the file record keyed by its file id, then
    /// recomputes the owning claim's attachment rollup.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::Store`] when the merge fails (the merge is
    /// rolled back) or when the rollup cannot be written.
    #[instrument(skip(self, outcome), fields(file_id = %outcome.file_id, claim_id = %outcome.claim_id, status = %outcome.status))]
    pub async fn record_outcome(&self, outcome: &DownloadOutcome) -> Result<FileRecord, ClaimError> {
        let record = self.store.merge_file_record(outcome).await.map_err(|e| {
            error!(error = %e, "Could not record download status");
            ClaimError::from(e)
        })?;

        self.recompute_attachment(outcome.claim_id).await?;
        debug!("Download status recorded");
        Ok(record)
    }

    /// Derives the claim's rollup from a fresh count of latest successful
    /// downloads and stores it
    pub async fn recompute_attachment(&self, claim_id: ClaimId) -> Result<AttachmentStatus, ClaimError> {
        let successful = self.store.count_latest_successes(claim_id).await?;
        let mut claim = self
            .store
            .get_claim(claim_id)
            .await?
            .ok_or_else(|| ClaimError::ClaimNotFound(claim_id.to_string()))?;

        claim.apply_attachment_rollup(successful, Utc::now());
        self.store
            .update_attachment_rollup(claim_id, claim.downloaded_files_count, claim.attachment_status)
            .await?;

        debug!(
            claim_id = %claim_id,
            downloaded = claim.downloaded_files_count,
            total = claim.total_files_count,
            status = %claim.attachment_status,
            "Attachment rollup updated"
        );
        Ok(claim.attachment_status)
    }
}
