//! In-memory adapters
//!
//! Implementations of every port backed by maps behind `tokio` locks. They
//! carry failure switches so callers can exercise the degraded paths of the
//! workflow without a database or document server.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use core_kernel::{
    AdapterHealth, ClaimId, DomainPort, FileId, HealthCheckResult, HealthCheckable, PortError,
};

use crate::claim::{AttachmentStatus, AuditStatus, Claim, UpstreamClaim};
use crate::file_record::{DownloadOutcome, FileRecord, FileStatus, UpstreamFile};
use crate::ports::{
    ClaimFilter, ClaimSourcePort, DailyCount, DocumentTransferPort, DownloadReportPort, DownloadStatistics,
    StatusCount, TrackingStorePort, TransferOutcome, TransferRequest,
};
use crate::resolver::DEFAULT_DOCUMENT_TYPE;

// ============================================================================
// Upstream source
// ============================================================================

/// In-memory upstream claim source
#[derive(Debug, Default)]
pub struct InMemoryClaimSource {
    regions: Arc<RwLock<HashMap<String, i64>>>,
    status_codes: Arc<RwLock<HashMap<String, i64>>>,
    claims: Arc<RwLock<Vec<UpstreamClaim>>>,
    files: Arc<RwLock<Vec<(UpstreamFile, String)>>>,
    failing_claims: Arc<RwLock<HashSet<ClaimId>>>,
    fail_claim_query: Arc<RwLock<bool>>,
    fetch_batches: Arc<RwLock<Vec<usize>>>,
}

impl InMemoryClaimSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_region(&self, name: impl Into<String>, id: i64) {
        self.regions.write().await.insert(name.into(), id);
    }

    pub async fn add_status_code(&self, code: impl Into<String>, id: i64) {
        self.status_codes.write().await.insert(code.into(), id);
    }

    /// Adds or replaces an upstream claim
    pub async fn put_claim(&self, claim: UpstreamClaim) {
        let mut claims = self.claims.write().await;
        claims.retain(|existing| existing.claim_id != claim.claim_id);
        claims.push(claim);
    }

    /// Adds a document of the default type
    pub async fn add_file(&self, file: UpstreamFile) {
        self.add_file_of_type(file, DEFAULT_DOCUMENT_TYPE).await;
    }

    pub async fn add_file_of_type(&self, file: UpstreamFile, document_type: impl Into<String>) {
        self.files.write().await.push((file, document_type.into()));
    }

    /// Removes every document of a claim
    pub async fn remove_files(&self, claim_id: ClaimId) {
        self.files.write().await.retain(|(file, _)| file.claim_id != claim_id);
    }

    /// Makes any document query that includes `claim_id` fail
    pub async fn fail_files_for(&self, claim_id: ClaimId) {
        self.failing_claims.write().await.insert(claim_id);
    }

    pub async fn fail_claim_query(&self, fail: bool) {
        *self.fail_claim_query.write().await = fail;
    }

    /// Sizes of the claim id batches passed to `fetch_files`, in call order
    pub async fn fetch_batches(&self) -> Vec<usize> {
        self.fetch_batches.read().await.clone()
    }
}

impl DomainPort for InMemoryClaimSource {}

#[async_trait]
impl ClaimSourcePort for InMemoryClaimSource {
    async fn region_id(&self, region_name: &str) -> Result<i64, PortError> {
        self.regions
            .read()
            .await
            .get(region_name)
            .copied()
            .ok_or_else(|| PortError::not_found("Region", region_name))
    }

    async fn status_code_id(&self, type_code: &str) -> Result<i64, PortError> {
        self.status_codes
            .read()
            .await
            .get(type_code)
            .copied()
            .ok_or_else(|| PortError::not_found("StatusCode", type_code))
    }

    async fn fetch_claims(&self, filter: &ClaimFilter) -> Result<Vec<UpstreamClaim>, PortError> {
        if *self.fail_claim_query.read().await {
            return Err(PortError::connection("upstream claim query failed"));
        }

        let mut claims: Vec<UpstreamClaim> = self
            .claims
            .read()
            .await
            .iter()
            .filter(|claim| {
                claim
                    .report_date
                    .map_or(false, |date| date >= filter.report_date_from && date <= filter.as_of)
                    && claim.upstream_updated_at < filter.as_of
            })
            .cloned()
            .collect();
        claims.sort_by_key(|claim| claim.report_date);
        Ok(claims)
    }

    async fn fetch_files(&self, claim_ids: &[ClaimId], document_type: &str) -> Result<Vec<UpstreamFile>, PortError> {
        self.fetch_batches.write().await.push(claim_ids.len());

        let failing = self.failing_claims.read().await;
        if claim_ids.iter().any(|id| failing.contains(id)) {
            return Err(PortError::connection("upstream document query failed"));
        }

        let wanted: HashSet<&ClaimId> = claim_ids.iter().collect();
        Ok(self
            .files
            .read()
            .await
            .iter()
            .filter(|(file, kind)| wanted.contains(&file.claim_id) && kind == document_type)
            .map(|(file, _)| file.clone())
            .collect())
    }
}

// ============================================================================
// Tracking store
// ============================================================================

/// In-memory tracking store
#[derive(Debug, Default)]
pub struct InMemoryTrackingStore {
    claims: Arc<RwLock<HashMap<ClaimId, Claim>>>,
    files: Arc<RwLock<HashMap<FileId, FileRecord>>>,
    failing_merges: Arc<RwLock<HashSet<FileId>>>,
    failing_invalidations: Arc<RwLock<HashSet<ClaimId>>>,
    failing_upserts: Arc<RwLock<HashSet<ClaimId>>>,
}

impl InMemoryTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn claim(&self, claim_id: ClaimId) -> Option<Claim> {
        self.claims.read().await.get(&claim_id).cloned()
    }

    pub async fn file(&self, file_id: &FileId) -> Option<FileRecord> {
        self.files.read().await.get(file_id).cloned()
    }

    /// Every stored file record, ordered by file id
    pub async fn all_files(&self) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self.files.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        records
    }

    pub async fn insert_claim(&self, claim: Claim) {
        self.claims.write().await.insert(claim.claim_id, claim);
    }

    pub async fn insert_file(&self, record: FileRecord) {
        self.files.write().await.insert(record.file_id.clone(), record);
    }

    pub async fn fail_merges_for(&self, file_id: FileId) {
        self.failing_merges.write().await.insert(file_id);
    }

    pub async fn fail_invalidation_for(&self, claim_id: ClaimId) {
        self.failing_invalidations.write().await.insert(claim_id);
    }

    pub async fn fail_upserts_for(&self, claim_id: ClaimId) {
        self.failing_upserts.write().await.insert(claim_id);
    }

    fn sort_by_report_date(claims: &mut [Claim]) {
        claims.sort_by(|a, b| match (a.report_date, b.report_date) {
            (Some(x), Some(y)) => x.cmp(&y).then(a.claim_id.cmp(&b.claim_id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.claim_id.cmp(&b.claim_id),
        });
    }

    async fn update_claim<F>(&self, claim_id: ClaimId, update: F) -> Result<(), PortError>
    where
        F: FnOnce(&mut Claim) + Send,
    {
        let mut claims = self.claims.write().await;
        let claim = claims
            .get_mut(&claim_id)
            .ok_or_else(|| PortError::not_found("Claim", claim_id))?;
        update(claim);
        Ok(())
    }
}

impl DomainPort for InMemoryTrackingStore {}

#[async_trait]
impl HealthCheckable for InMemoryTrackingStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult {
            adapter_id: "in-memory-tracking-store".to_string(),
            status: AdapterHealth::Healthy,
            latency_ms: 0,
            message: Some(format!("{} file records", self.files.read().await.len())),
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl TrackingStorePort for InMemoryTrackingStore {
    async fn get_claim(&self, claim_id: ClaimId) -> Result<Option<Claim>, PortError> {
        Ok(self.claims.read().await.get(&claim_id).cloned())
    }

    async fn get_claims(&self, claim_ids: &[ClaimId]) -> Result<Vec<Claim>, PortError> {
        let claims = self.claims.read().await;
        Ok(claim_ids.iter().filter_map(|id| claims.get(id).cloned()).collect())
    }

    async fn upsert_claim(&self, upstream: &UpstreamClaim) -> Result<Claim, PortError> {
        if self.failing_upserts.read().await.contains(&upstream.claim_id) {
            return Err(PortError::internal(format!("upsert of claim {} failed", upstream.claim_id)));
        }

        let now = Utc::now();
        let mut claims = self.claims.write().await;
        let claim = claims
            .entry(upstream.claim_id)
            .and_modify(|claim| claim.refresh_from_upstream(upstream, now))
            .or_insert_with(|| Claim::from_upstream(upstream, now));
        Ok(claim.clone())
    }

    async fn set_total_files(&self, claim_id: ClaimId, total: u32) -> Result<(), PortError> {
        self.update_claim(claim_id, |claim| claim.set_total_files(total, Utc::now()))
            .await
    }

    async fn update_attachment_rollup(
        &self,
        claim_id: ClaimId,
        downloaded: u32,
        status: AttachmentStatus,
    ) -> Result<(), PortError> {
        self.update_claim(claim_id, |claim| {
            claim.downloaded_files_count = downloaded;
            claim.attachment_status = status;
            claim.last_modified_at = Utc::now();
        })
        .await
    }

    async fn set_audit_status(
        &self,
        claim_id: ClaimId,
        status: AuditStatus,
        reason: Option<&str>,
    ) -> Result<(), PortError> {
        let reason = reason.map(str::to_string);
        self.update_claim(claim_id, |claim| {
            claim.audit_status = Some(status);
            claim.audit_reason = reason;
            claim.last_modified_at = Utc::now();
        })
        .await
    }

    async fn claims_ready_for_processing(&self) -> Result<Vec<Claim>, PortError> {
        let mut ready: Vec<Claim> = self
            .claims
            .read()
            .await
            .values()
            .filter(|claim| claim.is_ready_for_processing())
            .cloned()
            .collect();
        Self::sort_by_report_date(&mut ready);
        Ok(ready)
    }

    async fn claims_ready_for_audit(&self, limit: u32) -> Result<Vec<Claim>, PortError> {
        let mut ready: Vec<Claim> = self
            .claims
            .read()
            .await
            .values()
            .filter(|claim| claim.is_ready_for_audit())
            .cloned()
            .collect();
        Self::sort_by_report_date(&mut ready);
        ready.truncate(limit as usize);
        Ok(ready)
    }

    async fn mark_files_not_latest(&self, claim_id: ClaimId) -> Result<u64, PortError> {
        if self.failing_invalidations.read().await.contains(&claim_id) {
            return Err(PortError::internal(format!("invalidation of claim {} failed", claim_id)));
        }

        let mut touched = 0;
        for record in self.files.write().await.values_mut() {
            if record.claim_id == claim_id {
                record.is_latest_version = false;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn file_records_for_claims(&self, claim_ids: &[ClaimId]) -> Result<Vec<FileRecord>, PortError> {
        let wanted: HashSet<&ClaimId> = claim_ids.iter().collect();
        let mut records: Vec<FileRecord> = self
            .files
            .read()
            .await
            .values()
            .filter(|record| wanted.contains(&record.claim_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        Ok(records)
    }

    async fn merge_file_record(&self, outcome: &DownloadOutcome) -> Result<FileRecord, PortError> {
        if self.failing_merges.read().await.contains(&outcome.file_id) {
            return Err(PortError::internal(format!("merge of file {} failed", outcome.file_id)));
        }

        let mut files = self.files.write().await;
        let merged = FileRecord::merge(files.get(&outcome.file_id), outcome, Utc::now());
        files.insert(merged.file_id.clone(), merged.clone());
        Ok(merged)
    }

    async fn count_latest_successes(&self, claim_id: ClaimId) -> Result<u32, PortError> {
        let count = self
            .files
            .read()
            .await
            .values()
            .filter(|record| record.claim_id == claim_id && record.is_latest_version && record.is_successful())
            .count();
        Ok(count as u32)
    }

    async fn latest_successful_files(&self, claim_id: ClaimId) -> Result<Vec<FileRecord>, PortError> {
        let mut records: Vec<FileRecord> = self
            .files
            .read()
            .await
            .values()
            .filter(|record| record.claim_id == claim_id && record.is_latest_version && record.is_successful())
            .cloned()
            .collect();
        records.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        Ok(records)
    }
}

#[async_trait]
impl DownloadReportPort for InMemoryTrackingStore {
    async fn download_statistics(&self) -> Result<DownloadStatistics, PortError> {
        let mut grouped: HashMap<FileStatus, StatusCount> = HashMap::new();
        for record in self.files.read().await.values() {
            let entry = grouped.entry(record.status).or_insert(StatusCount {
                status: record.status,
                count: 0,
                first_download: None,
                last_download: None,
            });
            entry.count += 1;
            entry.first_download = Some(
                entry
                    .first_download
                    .map_or(record.download_timestamp, |first| first.min(record.download_timestamp)),
            );
            entry.last_download = Some(
                entry
                    .last_download
                    .map_or(record.download_timestamp, |last| last.max(record.download_timestamp)),
            );
        }
        Ok(DownloadStatistics::new(grouped.into_values().collect()))
    }

    async fn recent_downloads(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<FileRecord>, PortError> {
        let mut records: Vec<FileRecord> = self
            .files
            .read()
            .await
            .values()
            .filter(|record| record.download_timestamp >= since)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.download_timestamp.cmp(&a.download_timestamp));
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn failed_downloads(&self) -> Result<Vec<FileRecord>, PortError> {
        let mut records: Vec<FileRecord> = self
            .files
            .read()
            .await
            .values()
            .filter(|record| record.status == FileStatus::Failed)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.download_timestamp);
        Ok(records)
    }

    async fn count_cleanup_candidates(&self, older_than: DateTime<Utc>) -> Result<u64, PortError> {
        let count = self
            .files
            .read()
            .await
            .values()
            .filter(|record| is_cleanup_candidate(record, older_than))
            .count();
        Ok(count as u64)
    }

    async fn cleanup_failed(&self, older_than: DateTime<Utc>) -> Result<u64, PortError> {
        let mut files = self.files.write().await;
        let before = files.len();
        files.retain(|_, record| !is_cleanup_candidate(record, older_than));
        Ok((before - files.len()) as u64)
    }

    async fn reset_failed(&self, file_ids: Option<&[FileId]>) -> Result<u64, PortError> {
        let selected: Option<HashSet<&FileId>> = file_ids.map(|ids| ids.iter().collect());
        let mut reset = 0;
        for record in self.files.write().await.values_mut() {
            let wanted = selected.as_ref().map_or(true, |ids| ids.contains(&record.file_id));
            if record.status == FileStatus::Failed && wanted {
                record.status = FileStatus::Pending;
                record.error_message = None;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn daily_breakdown(&self, since: DateTime<Utc>) -> Result<Vec<DailyCount>, PortError> {
        let mut grouped: BTreeMap<(NaiveDate, &'static str), (FileStatus, u64)> = BTreeMap::new();
        for record in self.files.read().await.values() {
            if record.download_timestamp < since {
                continue;
            }
            let key = (record.download_timestamp.date_naive(), record.status.as_str());
            grouped.entry(key).or_insert((record.status, 0)).1 += 1;
        }

        let mut days: Vec<DailyCount> = grouped
            .into_iter()
            .map(|((day, _), (status, count))| DailyCount { day, status, count })
            .collect();
        days.sort_by(|a, b| b.day.cmp(&a.day).then(a.status.as_str().cmp(b.status.as_str())));
        Ok(days)
    }
}

fn is_cleanup_candidate(record: &FileRecord, older_than: DateTime<Utc>) -> bool {
    record.status == FileStatus::Failed && !record.is_latest_version && record.download_timestamp < older_than
}

// ============================================================================
// Document transfer
// ============================================================================

/// Transfer adapter that writes placeholder documents under a storage root
///
/// Every request succeeds unless a failure was scripted for its file id.
#[derive(Debug)]
pub struct ScriptedTransfer {
    storage_root: PathBuf,
    failures: Arc<RwLock<HashMap<FileId, String>>>,
    requests: Arc<RwLock<Vec<TransferRequest>>>,
}

impl ScriptedTransfer {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            failures: Arc::default(),
            requests: Arc::default(),
        }
    }

    pub async fn fail(&self, file_id: FileId, reason: impl Into<String>) {
        self.failures.write().await.insert(file_id, reason.into());
    }

    pub async fn succeed(&self, file_id: &FileId) {
        self.failures.write().await.remove(file_id);
    }

    /// Requests received so far, in arrival order
    pub async fn requests(&self) -> Vec<TransferRequest> {
        self.requests.read().await.clone()
    }
}

impl DomainPort for ScriptedTransfer {}

#[async_trait]
impl DocumentTransferPort for ScriptedTransfer {
    async fn transfer(&self, request: &TransferRequest) -> TransferOutcome {
        self.requests.write().await.push(request.clone());

        if let Some(reason) = self.failures.read().await.get(&request.file_id) {
            return TransferOutcome::Failed { reason: reason.clone() };
        }

        let path = request.local_path(&self.storage_root);
        let body = format!("%PDF-1.4 placeholder for {}", request.file_id);

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return TransferOutcome::Failed { reason: e.to_string() };
            }
        }
        match tokio::fs::write(&path, body.as_bytes()).await {
            Ok(()) => TransferOutcome::Downloaded { path, bytes: body.len() as u64 },
            Err(e) => TransferOutcome::Failed { reason: e.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn outcome(file_id: &str, status: FileStatus) -> DownloadOutcome {
        DownloadOutcome {
            file_id: FileId::new(file_id),
            claim_id: ClaimId::new(1),
            claim_no: "WC-1".to_string(),
            remote_file_name: format!("{}.pdf", file_id),
            local_path: Some(PathBuf::from(format!("/tmp/{}.pdf", file_id))),
            status,
            error_message: None,
            claim_last_modified: None,
        }
    }

    #[tokio::test]
    async fn test_merge_failure_writes_nothing() {
        let store = InMemoryTrackingStore::new();
        store.fail_merges_for(FileId::new("F1")).await;

        assert!(store.merge_file_record(&outcome("F1", FileStatus::Success)).await.is_err());
        assert!(store.file(&FileId::new("F1")).await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_only_removes_stale_failures() {
        let store = InMemoryTrackingStore::new();
        let old = Utc::now() - Duration::days(40);
        for (id, status, latest) in [
            ("A", FileStatus::Failed, false),
            ("B", FileStatus::Failed, true),
            ("C", FileStatus::Success, false),
        ] {
            let mut record = FileRecord::merge(None, &outcome(id, status), old);
            record.is_latest_version = latest;
            store.insert_file(record).await;
        }

        let cutoff = Utc::now() - Duration::days(30);
        assert_eq!(store.count_cleanup_candidates(cutoff).await.unwrap(), 1);
        assert_eq!(store.cleanup_failed(cutoff).await.unwrap(), 1);
        assert!(store.file(&FileId::new("A")).await.is_none());
        assert_eq!(store.all_files().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_failed_for_selected_ids() {
        let store = InMemoryTrackingStore::new();
        for id in ["A", "B"] {
            let mut failed = outcome(id, FileStatus::Failed);
            failed.error_message = Some("HTTP 404".to_string());
            store.merge_file_record(&failed).await.unwrap();
        }

        let reset = store.reset_failed(Some(&[FileId::new("A")])).await.unwrap();
        assert_eq!(reset, 1);

        let a = store.file(&FileId::new("A")).await.unwrap();
        assert_eq!(a.status, FileStatus::Pending);
        assert_eq!(a.error_message, None);
        assert_eq!(store.file(&FileId::new("B")).await.unwrap().status, FileStatus::Failed);

        assert_eq!(store.reset_failed(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scripted_transfer_writes_file() {
        let root = std::env::temp_dir().join(format!("scripted-transfer-{}", std::process::id()));
        let transfer = ScriptedTransfer::new(&root);
        let request = TransferRequest {
            file_id: FileId::new("F9"),
            claim_id: ClaimId::new(9),
            create_timestamp: Utc::now(),
        };

        match transfer.transfer(&request).await {
            TransferOutcome::Downloaded { path, bytes } => {
                assert!(path.exists());
                assert!(bytes > 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        transfer.fail(FileId::new("F9"), "HTTP 503").await;
        assert_eq!(
            transfer.transfer(&request).await,
            TransferOutcome::Failed { reason: "HTTP 503".to_string() }
        );
        let _ = std::fs::remove_dir_all(root);
    }
}
