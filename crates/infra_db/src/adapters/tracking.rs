//! PostgreSQL Tracking Store Adapter
//!
//! Implements [`TrackingStorePort`] and [`DownloadReportPort`] on top of the
//! [`TrackingRepository`]. Row types are mapped to domain types here, and
//! stored status text that no longer parses is reported as a transformation
//! error instead of being silently coerced.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::PostgresTrackingStore;
//! use domain_claims::TrackingStorePort;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn TrackingStorePort> = Arc::new(PostgresTrackingStore::new(pool));
//! let ready = store.claims_ready_for_processing().await?;
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, ClaimId, DomainPort, FileId, HealthCheckResult, HealthCheckable, PortError,
};
use domain_claims::ports::{DailyCount, DownloadStatistics, StatusCount};
use domain_claims::{
    AttachmentStatus, AuditStatus, Claim, DownloadOutcome, DownloadReportPort, FileRecord,
    FileStatus, TrackingStorePort, UpstreamClaim,
};

use crate::error::DatabaseError;
use crate::repositories::tracking::{ClaimRow, ClaimUpsert, FileRecordRow, TrackingRepository};

const ADAPTER_ID: &str = "postgres-tracking-store";

/// PostgreSQL-backed tracking store
#[derive(Debug, Clone)]
pub struct PostgresTrackingStore {
    repository: TrackingRepository,
    pool: PgPool,
}

impl PostgresTrackingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: TrackingRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &TrackingRepository {
        &self.repository
    }
}

impl DomainPort for PostgresTrackingStore {}

#[async_trait]
impl HealthCheckable for PostgresTrackingStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn invalid(field: &str, value: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::InvalidData(format!("{} '{}'", field, value))
}

fn count_from_db(field: &str, value: i32) -> Result<u32, DatabaseError> {
    u32::try_from(value).map_err(|_| invalid(field, value))
}

fn count_to_db(value: u32) -> Result<i32, PortError> {
    i32::try_from(value).map_err(|_| PortError::validation(format!("count {} out of range", value)))
}

impl TryFrom<ClaimRow> for Claim {
    type Error = DatabaseError;

    fn try_from(row: ClaimRow) -> Result<Self, Self::Error> {
        let attachment_status = row
            .attachment_status
            .parse::<AttachmentStatus>()
            .map_err(|_| invalid("attachment_status", &row.attachment_status))?;
        let audit_status = row
            .audit_status
            .as_deref()
            .map(|s| s.parse::<AuditStatus>().map_err(|_| invalid("audit_status", s)))
            .transpose()?;

        Ok(Claim {
            claim_id: ClaimId::new(row.claim_id),
            claim_no: row.claim_no,
            vin: row.vin,
            dealer_code: row.dealer_code,
            dealer_name: row.dealer_name,
            report_date: row.report_date,
            gross_credit: row.gross_credit,
            labour_amount: row.labour_amount,
            part_amount: row.part_amount,
            upstream_updated_at: row.upstream_updated_at,
            auditing_date: row.auditing_date,
            total_files_count: count_from_db("total_files_count", row.total_files_count)?,
            downloaded_files_count: count_from_db("downloaded_files_count", row.downloaded_files_count)?,
            attachment_status,
            audit_status,
            audit_reason: row.audit_reason,
            last_modified_at: row.last_modified_at,
        })
    }
}

impl From<&UpstreamClaim> for ClaimUpsert {
    fn from(claim: &UpstreamClaim) -> Self {
        Self {
            claim_id: claim.claim_id.value(),
            claim_no: claim.claim_no.clone(),
            vin: claim.vin.clone(),
            dealer_code: claim.dealer_code.clone(),
            dealer_name: claim.dealer_name.clone(),
            report_date: claim.report_date,
            gross_credit: claim.gross_credit,
            labour_amount: claim.labour_amount,
            part_amount: claim.part_amount,
            upstream_updated_at: claim.upstream_updated_at,
            auditing_date: claim.auditing_date,
        }
    }
}

impl TryFrom<FileRecordRow> for FileRecord {
    type Error = DatabaseError;

    fn try_from(row: FileRecordRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<FileStatus>()
            .map_err(|_| invalid("status", &row.status))?;

        Ok(FileRecord {
            file_id: FileId::new(row.file_id),
            claim_id: ClaimId::new(row.claim_id),
            claim_no: row.claim_no,
            remote_file_name: row.remote_file_name,
            local_path: row.local_file_path.map(PathBuf::from),
            status,
            is_latest_version: row.is_latest_version,
            error_message: row.error_message,
            download_timestamp: row.download_timestamp,
            claim_last_modified: row.claim_last_modified,
        })
    }
}

impl From<&FileRecord> for FileRecordRow {
    fn from(record: &FileRecord) -> Self {
        Self {
            file_id: record.file_id.as_str().to_string(),
            claim_id: record.claim_id.value(),
            claim_no: record.claim_no.clone(),
            remote_file_name: record.remote_file_name.clone(),
            local_file_path: record
                .local_path
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned()),
            status: record.status.as_str().to_string(),
            is_latest_version: record.is_latest_version,
            error_message: record.error_message.clone(),
            download_timestamp: record.download_timestamp,
            claim_last_modified: record.claim_last_modified,
        }
    }
}

fn claims_from_rows(rows: Vec<ClaimRow>) -> Result<Vec<Claim>, PortError> {
    rows.into_iter()
        .map(|row| Claim::try_from(row).map_err(PortError::from))
        .collect()
}

fn files_from_rows(rows: Vec<FileRecordRow>) -> Result<Vec<FileRecord>, PortError> {
    rows.into_iter()
        .map(|row| FileRecord::try_from(row).map_err(PortError::from))
        .collect()
}

fn raw_ids(claim_ids: &[ClaimId]) -> Vec<i64> {
    claim_ids.iter().map(ClaimId::value).collect()
}

fn ensure_updated(rows: u64, claim_id: ClaimId) -> Result<(), PortError> {
    if rows == 0 {
        Err(PortError::not_found("Claim", claim_id))
    } else {
        Ok(())
    }
}

// ============================================================================
// TrackingStorePort
// ============================================================================

#[async_trait]
impl TrackingStorePort for PostgresTrackingStore {
    #[instrument(skip(self))]
    async fn get_claim(&self, claim_id: ClaimId) -> Result<Option<Claim>, PortError> {
        let row = self.repository.find_claim(claim_id.value()).await?;
        row.map(Claim::try_from).transpose().map_err(PortError::from)
    }

    #[instrument(skip(self, claim_ids), fields(count = claim_ids.len()))]
    async fn get_claims(&self, claim_ids: &[ClaimId]) -> Result<Vec<Claim>, PortError> {
        if claim_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.repository.find_claims(&raw_ids(claim_ids)).await?;
        claims_from_rows(rows)
    }

    #[instrument(skip(self, upstream), fields(claim_id = %upstream.claim_id))]
    async fn upsert_claim(&self, upstream: &UpstreamClaim) -> Result<Claim, PortError> {
        let row = self.repository.upsert_claim(&ClaimUpsert::from(upstream)).await?;
        debug!("Claim upserted");
        Ok(Claim::try_from(row)?)
    }

    #[instrument(skip(self))]
    async fn set_total_files(&self, claim_id: ClaimId, total: u32) -> Result<(), PortError> {
        let rows = self
            .repository
            .set_total_files(claim_id.value(), count_to_db(total)?)
            .await?;
        ensure_updated(rows, claim_id)
    }

    #[instrument(skip(self))]
    async fn update_attachment_rollup(
        &self,
        claim_id: ClaimId,
        downloaded: u32,
        status: AttachmentStatus,
    ) -> Result<(), PortError> {
        let rows = self
            .repository
            .update_attachment_rollup(claim_id.value(), count_to_db(downloaded)?, status.as_str())
            .await?;
        ensure_updated(rows, claim_id)
    }

    #[instrument(skip(self, reason))]
    async fn set_audit_status(
        &self,
        claim_id: ClaimId,
        status: AuditStatus,
        reason: Option<&str>,
    ) -> Result<(), PortError> {
        let rows = self
            .repository
            .set_audit_status(claim_id.value(), status.as_str(), reason)
            .await?;
        ensure_updated(rows, claim_id)
    }

    async fn claims_ready_for_processing(&self) -> Result<Vec<Claim>, PortError> {
        let rows = self.repository.claims_ready_for_processing().await?;
        claims_from_rows(rows)
    }

    async fn claims_ready_for_audit(&self, limit: u32) -> Result<Vec<Claim>, PortError> {
        let rows = self.repository.claims_ready_for_audit(i64::from(limit)).await?;
        claims_from_rows(rows)
    }

    #[instrument(skip(self))]
    async fn mark_files_not_latest(&self, claim_id: ClaimId) -> Result<u64, PortError> {
        Ok(self.repository.mark_files_not_latest(claim_id.value()).await?)
    }

    async fn file_records_for_claims(&self, claim_ids: &[ClaimId]) -> Result<Vec<FileRecord>, PortError> {
        if claim_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.repository.files_for_claims(&raw_ids(claim_ids)).await?;
        files_from_rows(rows)
    }

    /// Merges the outcome under a row lock so concurrent outcomes for the
    /// same file serialize
    #[instrument(skip(self, outcome), fields(file_id = %outcome.file_id, status = %outcome.status))]
    async fn merge_file_record(&self, outcome: &DownloadOutcome) -> Result<FileRecord, PortError> {
        let mut tx = self.repository.begin().await?;

        let existing = TrackingRepository::lock_file(&mut tx, outcome.file_id.as_str())
            .await?
            .map(FileRecord::try_from)
            .transpose()?;

        let merged = FileRecord::merge(existing.as_ref(), outcome, Utc::now());
        let stored = TrackingRepository::write_file(&mut tx, &FileRecordRow::from(&merged)).await?;

        tx.commit()
            .await
            .map_err(|e| PortError::from(DatabaseError::TransactionFailed(e.to_string())))?;

        Ok(FileRecord::try_from(stored)?)
    }

    async fn count_latest_successes(&self, claim_id: ClaimId) -> Result<u32, PortError> {
        let count = self.repository.count_latest_successes(claim_id.value()).await?;
        u32::try_from(count).map_err(|_| PortError::transformation(format!("count {} out of range", count)))
    }

    async fn latest_successful_files(&self, claim_id: ClaimId) -> Result<Vec<FileRecord>, PortError> {
        let rows = self.repository.latest_successful_files(claim_id.value()).await?;
        files_from_rows(rows)
    }
}

// ============================================================================
// DownloadReportPort
// ============================================================================

fn non_negative(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

#[async_trait]
impl DownloadReportPort for PostgresTrackingStore {
    async fn download_statistics(&self) -> Result<DownloadStatistics, PortError> {
        let rows = self.repository.status_counts().await?;
        let by_status = rows
            .into_iter()
            .map(|row| {
                let status = row
                    .status
                    .parse::<FileStatus>()
                    .map_err(|_| PortError::from(invalid("status", &row.status)))?;
                Ok(StatusCount {
                    status,
                    count: non_negative(row.count),
                    first_download: row.first_download,
                    last_download: row.last_download,
                })
            })
            .collect::<Result<Vec<_>, PortError>>()?;
        Ok(DownloadStatistics::new(by_status))
    }

    async fn recent_downloads(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<FileRecord>, PortError> {
        let rows = self.repository.recent_files(since, i64::from(limit)).await?;
        files_from_rows(rows)
    }

    async fn failed_downloads(&self) -> Result<Vec<FileRecord>, PortError> {
        let rows = self.repository.failed_files().await?;
        files_from_rows(rows)
    }

    async fn count_cleanup_candidates(&self, older_than: DateTime<Utc>) -> Result<u64, PortError> {
        let count = self.repository.count_stale_failures(older_than).await?;
        Ok(non_negative(count))
    }

    #[instrument(skip(self))]
    async fn cleanup_failed(&self, older_than: DateTime<Utc>) -> Result<u64, PortError> {
        Ok(self.repository.delete_stale_failures(older_than).await?)
    }

    #[instrument(skip(self, file_ids), fields(selected = file_ids.map(|ids| ids.len())))]
    async fn reset_failed(&self, file_ids: Option<&[FileId]>) -> Result<u64, PortError> {
        let ids = file_ids.map(|ids| ids.iter().map(|id| id.as_str().to_string()).collect());
        Ok(self.repository.reset_failed(ids).await?)
    }

    async fn daily_breakdown(&self, since: DateTime<Utc>) -> Result<Vec<DailyCount>, PortError> {
        let rows = self.repository.daily_counts(since).await?;
        rows.into_iter()
            .map(|row| {
                let status = row
                    .status
                    .parse::<FileStatus>()
                    .map_err(|_| PortError::from(invalid("status", &row.status)))?;
                Ok(DailyCount {
                    day: row.day,
                    status,
                    count: non_negative(row.count),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file_row(status: &str) -> FileRecordRow {
        FileRecordRow {
            file_id: "F-1".to_string(),
            claim_id: 7,
            claim_no: "WC7".to_string(),
            remote_file_name: "invoice.pdf".to_string(),
            local_file_path: Some("/data/20240301/CLAIM_7_F-1.pdf".to_string()),
            status: status.to_string(),
            is_latest_version: true,
            error_message: None,
            download_timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            claim_last_modified: None,
        }
    }

    #[test]
    fn test_file_row_maps_both_ways() {
        let row = file_row("SUCCESS");
        let record = FileRecord::try_from(row.clone()).unwrap();

        assert_eq!(record.status, FileStatus::Success);
        assert_eq!(record.local_path, Some(PathBuf::from("/data/20240301/CLAIM_7_F-1.pdf")));
        assert_eq!(FileRecordRow::from(&record), row);
    }

    #[test]
    fn test_unknown_status_is_invalid_data() {
        let error = FileRecord::try_from(file_row("DONE")).unwrap_err();
        assert!(matches!(error, DatabaseError::InvalidData(_)));
    }

    #[test]
    fn test_negative_count_is_invalid_data() {
        assert!(count_from_db("total_files_count", -1).is_err());
        assert_eq!(count_from_db("total_files_count", 3).unwrap(), 3);
    }
}
