//! Claims Domain Ports
//!
//! Port interfaces the claim audit workflow needs from the outside world.
//!
//! # Architecture
//!
//! - `ClaimSourcePort`: read-only access to the upstream dealer system
//! - `TrackingStorePort`: the local tracking database, written by the
//!   reconciler, the download tracker and the audit machine
//! - `DownloadReportPort`: maintenance and reporting queries over the tracked
//!   downloads, used by the cleanup sweep and the monitor
//! - `DocumentTransferPort`: moves one document from the document server to
//!   local storage
//!
//! Adapters for the database ports live in `infra_db`, the transfer adapter in
//! `infra_http`, and in-memory versions of all of them in [`crate::memory`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_claims::ports::TrackingStorePort;
//! use std::sync::Arc;
//!
//! pub struct DownloadTracker {
//!     store: Arc<dyn TrackingStorePort>,
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use core_kernel::{ClaimId, DomainPort, FileId, PortError};

use crate::claim::{AttachmentStatus, AuditStatus, Claim, UpstreamClaim};
use crate::file_record::{DownloadOutcome, FileRecord, FileStatus, UpstreamFile};

/// Filter applied to the upstream claim query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimFilter {
    /// Region the claims belong to
    pub region_id: i64,
    /// Upstream status code the claims must carry
    pub status_id: i64,
    /// Lower bound of the report date window
    pub report_date_from: DateTime<Utc>,
    /// Upper bound of the report date window; claims must also have been
    /// updated before this instant
    pub as_of: DateTime<Utc>,
}

/// Read access to the upstream claim source
#[async_trait]
pub trait ClaimSourcePort: DomainPort {
    /// Resolves a region name to its upstream id
    async fn region_id(&self, region_name: &str) -> Result<i64, PortError>;

    /// Resolves a status type code to its upstream id
    async fn status_code_id(&self, type_code: &str) -> Result<i64, PortError>;

    /// Claims matching the filter, ordered by report date ascending
    async fn fetch_claims(&self, filter: &ClaimFilter) -> Result<Vec<UpstreamClaim>, PortError>;

    /// Document metadata for a batch of claims, restricted to one document type
    async fn fetch_files(
        &self,
        claim_ids: &[ClaimId],
        document_type: &str,
    ) -> Result<Vec<UpstreamFile>, PortError>;
}

/// The local tracking store
///
/// Every method commits on its own; a failing write leaves no partial state.
#[async_trait]
pub trait TrackingStorePort: DomainPort {
    /// Point read of a claim snapshot
    async fn get_claim(&self, claim_id: ClaimId) -> Result<Option<Claim>, PortError>;

    /// Snapshots of the given claims; unknown ids are skipped
    async fn get_claims(&self, claim_ids: &[ClaimId]) -> Result<Vec<Claim>, PortError>;

    /// Inserts the claim if absent, otherwise overwrites its upstream-mirrored fields
    async fn upsert_claim(&self, upstream: &UpstreamClaim) -> Result<Claim, PortError>;

    /// Replaces the observed document count
    async fn set_total_files(&self, claim_id: ClaimId, total: u32) -> Result<(), PortError>;

    /// Stores a recomputed attachment rollup
    async fn update_attachment_rollup(
        &self,
        claim_id: ClaimId,
        downloaded: u32,
        status: AttachmentStatus,
    ) -> Result<(), PortError>;

    /// Stores an audit status together with its reason
    async fn set_audit_status(
        &self,
        claim_id: ClaimId,
        status: AuditStatus,
        reason: Option<&str>,
    ) -> Result<(), PortError>;

    /// Claims with complete attachments whose audit is unset or PENDING
    async fn claims_ready_for_processing(&self) -> Result<Vec<Claim>, PortError>;

    /// Claims with complete attachments awaiting matching, oldest report date first
    async fn claims_ready_for_audit(&self, limit: u32) -> Result<Vec<Claim>, PortError>;

    /// Retires every file record of the claim; returns the number of records touched
    async fn mark_files_not_latest(&self, claim_id: ClaimId) -> Result<u64, PortError>;

    /// All file records of the given claims
    async fn file_records_for_claims(&self, claim_ids: &[ClaimId]) -> Result<Vec<FileRecord>, PortError>;

    /// Merges a download outcome keyed by file id, see [`FileRecord::merge`]
    ///
    /// The merge runs in its own transaction; on error it is rolled back.
    async fn merge_file_record(&self, outcome: &DownloadOutcome) -> Result<FileRecord, PortError>;

    /// Number of latest-version records in SUCCESS for the claim
    async fn count_latest_successes(&self, claim_id: ClaimId) -> Result<u32, PortError>;

    /// Latest-version records in SUCCESS for the claim, ordered by file id
    async fn latest_successful_files(&self, claim_id: ClaimId) -> Result<Vec<FileRecord>, PortError>;
}

/// Count of records in one status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: FileStatus,
    pub count: u64,
    pub first_download: Option<DateTime<Utc>>,
    pub last_download: Option<DateTime<Utc>>,
}

/// Per-status counts over all tracked downloads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadStatistics {
    /// Ordered by count, largest first
    pub by_status: Vec<StatusCount>,
}

impl DownloadStatistics {
    pub fn new(mut by_status: Vec<StatusCount>) -> Self {
        by_status.sort_by(|a, b| b.count.cmp(&a.count).then(a.status.as_str().cmp(b.status.as_str())));
        Self { by_status }
    }

    pub fn total(&self) -> u64 {
        self.by_status.iter().map(|entry| entry.count).sum()
    }

    pub fn count_of(&self, status: FileStatus) -> u64 {
        self.by_status
            .iter()
            .find(|entry| entry.status == status)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    /// Share of `status` in percent, 0 when nothing is tracked
    pub fn percentage(&self, status: FileStatus) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.count_of(status) as f64 * 100.0 / total as f64
    }
}

/// Number of records written on one day in one status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub status: FileStatus,
    pub count: u64,
}

/// Maintenance and reporting over tracked downloads
#[async_trait]
pub trait DownloadReportPort: DomainPort {
    async fn download_statistics(&self) -> Result<DownloadStatistics, PortError>;

    /// Records written at or after `since`, newest first
    async fn recent_downloads(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<FileRecord>, PortError>;

    /// FAILED records, oldest first
    async fn failed_downloads(&self) -> Result<Vec<FileRecord>, PortError>;

    /// Number of records the cleanup sweep would delete
    async fn count_cleanup_candidates(&self, older_than: DateTime<Utc>) -> Result<u64, PortError>;

    /// Deletes FAILED, non-latest records written before `older_than`
    async fn cleanup_failed(&self, older_than: DateTime<Utc>) -> Result<u64, PortError>;

    /// Moves FAILED records back to PENDING and clears their error
    ///
    /// With `file_ids` set only those records are reset.
    async fn reset_failed(&self, file_ids: Option<&[FileId]>) -> Result<u64, PortError>;

    /// Per-day, per-status counts of records written at or after `since`,
    /// newest day first
    async fn daily_breakdown(&self, since: DateTime<Utc>) -> Result<Vec<DailyCount>, PortError>;
}

/// One document to transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub file_id: FileId,
    pub claim_id: ClaimId,
    pub create_timestamp: DateTime<Utc>,
}

impl TransferRequest {
    pub fn from_file(file: &UpstreamFile) -> Self {
        Self {
            file_id: file.file_id.clone(),
            claim_id: file.claim_id,
            create_timestamp: file.create_timestamp,
        }
    }

    /// Date folder shared by the remote address and the local path
    pub fn date_folder(&self) -> String {
        self.create_timestamp.format("%Y%m%d").to_string()
    }

    /// Address relative to the document server base URL
    pub fn remote_path(&self) -> String {
        format!("/{}/{}", self.date_folder(), self.file_id)
    }

    /// Where the document is stored under `storage_root`
    pub fn local_path(&self, storage_root: &Path) -> PathBuf {
        storage_root
            .join(self.date_folder())
            .join(format!("CLAIM_{}_{}.pdf", self.claim_id, self.file_id))
    }
}

/// Result of a transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    Failed { reason: String },
}

/// Moves documents from the document server to local storage
///
/// Transfers never return an error: every failure is reported as
/// [`TransferOutcome::Failed`] with a reason.
#[async_trait]
pub trait DocumentTransferPort: DomainPort {
    async fn transfer(&self, request: &TransferRequest) -> TransferOutcome;
}
