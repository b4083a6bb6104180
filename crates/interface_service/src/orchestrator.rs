//! Cycle orchestration
//!
//! One cycle runs the phases strictly in order:
//!
//! ```text
//! reconcile -> resolve files -> download (bounded pool) -> process -> audit -> cleanup
//! ```
//!
//! No phase failure aborts the cycle. Each phase logs its summary counts and
//! hands a neutral result to the next one.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use tracing::{error, info, info_span, warn, Instrument};

use core_kernel::CycleId;
use domain_claims::{
    AuditStatusMachine, AuditSummary, ClaimQuery, ClaimReconciler, ClaimSourcePort,
    DocumentAnalyzer, DocumentTransferPort, DownloadOutcome, DownloadReportPort, DownloadTracker, FileCandidate,
    FileSetResolver, MatchingConfig, ProcessingSummary, TrackingStorePort, TransferOutcome,
    TransferRequest,
};

/// The adapters a cycle runs against
#[derive(Clone)]
pub struct ServicePorts {
    pub source: Arc<dyn ClaimSourcePort>,
    pub store: Arc<dyn TrackingStorePort>,
    pub reports: Arc<dyn DownloadReportPort>,
    pub transfer: Arc<dyn DocumentTransferPort>,
    pub analyzer: Arc<dyn DocumentAnalyzer>,
}

/// Tunables of a cycle
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub claim_query: ClaimQuery,
    pub document_type: String,
    pub file_batch_size: usize,
    /// Concurrent downloads; 1 downloads sequentially
    pub max_workers: usize,
    pub matching: MatchingConfig,
    /// Age after which superseded FAILED records are swept
    pub failed_retention: chrono::Duration,
}

/// Counts of the download phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    /// Unchanged documents still on disk, recorded again without a transfer
    pub reused: usize,
    pub failed: usize,
    /// Outcomes that could not be stored
    pub write_failures: usize,
}

impl DownloadSummary {
    fn add(mut self, result: FileResult) -> Self {
        match result {
            FileResult::Downloaded => self.downloaded += 1,
            FileResult::Reused => self.reused += 1,
            FileResult::Failed => self.failed += 1,
            FileResult::NotRecorded => self.write_failures += 1,
        }
        self
    }
}

/// Everything a cycle did
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub cycle_id: CycleId,
    pub started_at: DateTime<Utc>,
    pub claims_selected: usize,
    pub files_resolved: usize,
    pub downloads: DownloadSummary,
    pub processing: ProcessingSummary,
    pub audit: AuditSummary,
    pub records_cleaned: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileResult {
    Downloaded,
    Reused,
    Failed,
    NotRecorded,
}

/// Runs reconciliation, download and audit cycles
pub struct CycleOrchestrator {
    reconciler: ClaimReconciler,
    resolver: FileSetResolver,
    tracker: DownloadTracker,
    audit: AuditStatusMachine,
    transfer: Arc<dyn DocumentTransferPort>,
    reports: Arc<dyn DownloadReportPort>,
    max_workers: usize,
    failed_retention: chrono::Duration,
}

impl CycleOrchestrator {
    pub fn new(ports: ServicePorts, settings: CycleSettings) -> Self {
        Self {
            reconciler: ClaimReconciler::new(
                Arc::clone(&ports.source),
                Arc::clone(&ports.store),
                settings.claim_query,
            ),
            resolver: FileSetResolver::new(
                ports.source,
                Arc::clone(&ports.store),
                settings.document_type,
                settings.file_batch_size,
            ),
            tracker: DownloadTracker::new(Arc::clone(&ports.store)),
            audit: AuditStatusMachine::new(ports.store, ports.analyzer, settings.matching),
            transfer: ports.transfer,
            reports: ports.reports,
            max_workers: settings.max_workers.max(1),
            failed_retention: settings.failed_retention,
        }
    }

    /// Runs one full cycle at the current instant
    pub async fn run_cycle(&self) -> CycleSummary {
        self.run_cycle_at(Utc::now()).await
    }

    /// Runs one full cycle treating `now` as the cycle instant
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> CycleSummary {
        let cycle_id = CycleId::new();
        let span = info_span!("cycle", %cycle_id);
        self.run_phases(cycle_id, now).instrument(span).await
    }

    async fn run_phases(&self, cycle_id: CycleId, now: DateTime<Utc>) -> CycleSummary {
        let start = Instant::now();
        info!(at = %now, "Starting claim document cycle");

        let claims = self.reconciler.find_claims_needing_attention(now).await;
        info!(claims = claims.len(), "Reconciliation finished");

        let candidates = if claims.is_empty() {
            Vec::new()
        } else {
            self.resolver.resolve_files_for(&claims).await
        };
        let files_resolved = candidates.len();
        info!(files = files_resolved, "File resolution finished");

        let downloads = self.download_all(candidates).await;
        info!(
            downloaded = downloads.downloaded,
            reused = downloads.reused,
            failed = downloads.failed,
            write_failures = downloads.write_failures,
            "Download phase finished"
        );

        let (results, processing) = self.audit.process_ready_claims().await;
        info!(processed = processing.processed, failed = processing.failed, "Processing phase finished");

        let audit = self.audit.audit_ready_claims(results).await;
        info!(
            audited = audit.audited,
            completed = audit.completed,
            rejected = audit.rejected,
            failed_writes = audit.failed_writes,
            "Audit phase finished"
        );

        let records_cleaned = self.cleanup(now).await;

        let summary = CycleSummary {
            cycle_id,
            started_at: now,
            claims_selected: claims.len(),
            files_resolved,
            downloads,
            processing,
            audit,
            records_cleaned,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(duration_ms = summary.duration_ms, "Cycle completed");
        summary
    }

    /// Downloads and records every candidate through a pool of `max_workers`
    async fn download_all(&self, candidates: Vec<FileCandidate>) -> DownloadSummary {
        if candidates.is_empty() {
            return DownloadSummary::default();
        }

        stream::iter(candidates)
            .map(|candidate| self.download_one(candidate))
            .buffer_unordered(self.max_workers)
            .fold(DownloadSummary::default(), |summary, result| async move { summary.add(result) })
            .await
    }

    async fn download_one(&self, candidate: FileCandidate) -> FileResult {
        let (outcome, result) = match self.reusable_path(&candidate).await {
            Some(path) => (DownloadOutcome::success(&candidate, path), FileResult::Reused),
            None => {
                let request = TransferRequest::from_file(&candidate.file);
                match self.transfer.transfer(&request).await {
                    TransferOutcome::Downloaded { path, .. } => {
                        (DownloadOutcome::success(&candidate, path), FileResult::Downloaded)
                    }
                    TransferOutcome::Failed { reason } => {
                        (DownloadOutcome::failure(&candidate, reason), FileResult::Failed)
                    }
                }
            }
        };

        match self.tracker.record_outcome(&outcome).await {
            Ok(_) => result,
            Err(e) => {
                error!(file_id = %outcome.file_id, claim_id = %outcome.claim_id, error = %e, "Failed to record download outcome");
                FileResult::NotRecorded
            }
        }
    }

    /// The stored path of an unchanged download that is still on disk
    async fn reusable_path(&self, candidate: &FileCandidate) -> Option<std::path::PathBuf> {
        let path = candidate.reusable_download()?;
        match tokio::fs::try_exists(path).await {
            Ok(true) => Some(path.to_path_buf()),
            Ok(false) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not check earlier download");
                None
            }
        }
    }

    async fn cleanup(&self, now: DateTime<Utc>) -> u64 {
        let cutoff = now - self.failed_retention;
        match self.reports.cleanup_failed(cutoff).await {
            Ok(0) => 0,
            Ok(deleted) => {
                info!(deleted, cutoff = %cutoff, "Removed superseded failed records");
                deleted
            }
            Err(e) => {
                warn!(error = %e, "Cleanup of failed records failed");
                0
            }
        }
    }
}
