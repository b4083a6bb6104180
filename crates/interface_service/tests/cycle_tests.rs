//! End-to-end cycle tests over the in-memory adapters

use std::sync::Arc;

use chrono::Duration;
use rust_decimal_macros::dec;
use tempfile::TempDir;

use core_kernel::ClaimId;
use domain_claims::{
    AttachmentStatus, AuditStatus, ClaimQuery, FileStatus, FixedAmountsAnalyzer, InMemoryClaimSource,
    InMemoryTrackingStore, MatchingConfig, ScriptedTransfer, DEFAULT_DOCUMENT_TYPE,
};
use interface_service::{CycleOrchestrator, CycleSettings, DownloadSummary, ServicePorts};
use test_utils::{
    assert_attachment, assert_audit, assert_completeness_invariant, IdFixtures, LookupFixtures,
    TemporalFixtures, UpstreamClaimBuilder, UpstreamFileBuilder,
};

struct Harness {
    source: Arc<InMemoryClaimSource>,
    store: Arc<InMemoryTrackingStore>,
    transfer: Arc<ScriptedTransfer>,
    _storage: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let storage = TempDir::new().unwrap();
        let source = Arc::new(InMemoryClaimSource::new());
        source.add_region(LookupFixtures::region_name(), LookupFixtures::region_id()).await;
        source
            .add_status_code(LookupFixtures::status_type_code(), LookupFixtures::status_id())
            .await;

        Self {
            source,
            store: Arc::new(InMemoryTrackingStore::new()),
            transfer: Arc::new(ScriptedTransfer::new(storage.path())),
            _storage: storage,
        }
    }

    /// Registers an upstream claim with `files` documents
    async fn add_claim(&self, claim_id: ClaimId, files: usize) {
        self.source
            .put_claim(UpstreamClaimBuilder::new().with_claim_id(claim_id).build())
            .await;
        for index in 0..files {
            self.source
                .add_file(UpstreamFileBuilder::for_claim(claim_id, index).build())
                .await;
        }
    }

    fn orchestrator(&self, analyzer: FixedAmountsAnalyzer, max_workers: usize) -> CycleOrchestrator {
        let ports = ServicePorts {
            source: self.source.clone(),
            store: self.store.clone(),
            reports: self.store.clone(),
            transfer: self.transfer.clone(),
            analyzer: Arc::new(analyzer),
        };
        CycleOrchestrator::new(ports, settings(max_workers))
    }
}

fn settings(max_workers: usize) -> CycleSettings {
    CycleSettings {
        claim_query: ClaimQuery {
            region_name: LookupFixtures::region_name().to_string(),
            status_type_code: LookupFixtures::status_type_code().to_string(),
            report_date_from: TemporalFixtures::report_window_start(),
        },
        document_type: DEFAULT_DOCUMENT_TYPE.to_string(),
        file_batch_size: 999,
        max_workers,
        matching: MatchingConfig::default(),
        failed_retention: Duration::days(30),
    }
}

fn declared_amounts(claim_id: ClaimId) -> FixedAmountsAnalyzer {
    FixedAmountsAnalyzer::new().with_amounts(claim_id, dec!(1000.00), dec!(500.00))
}

#[tokio::test]
async fn test_cycle_downloads_and_completes_matching_claim() {
    let harness = Harness::new().await;
    let claim_id = IdFixtures::claim_id();
    harness.add_claim(claim_id, 2).await;

    let summary = harness
        .orchestrator(declared_amounts(claim_id), 4)
        .run_cycle_at(TemporalFixtures::cycle_time())
        .await;

    assert_eq!(summary.claims_selected, 1);
    assert_eq!(summary.files_resolved, 2);
    assert_eq!(
        summary.downloads,
        DownloadSummary { downloaded: 2, reused: 0, failed: 0, write_failures: 0 }
    );
    assert_eq!(summary.processing.processed, 1);
    assert_eq!(summary.audit.completed, 1);

    let claim = harness.store.claim(claim_id).await.unwrap();
    assert_attachment(&claim, AttachmentStatus::Complete, 2, 2);
    assert_audit(&claim, Some(AuditStatus::Complete), Some("within tolerance"));
    assert_completeness_invariant(&claim, &harness.store.all_files().await);
}

#[tokio::test]
async fn test_cycle_rejects_parts_mismatch() {
    let harness = Harness::new().await;
    let claim_id = IdFixtures::claim_id();
    harness.add_claim(claim_id, 1).await;
    let analyzer = FixedAmountsAnalyzer::new().with_amounts(claim_id, dec!(1000.00), dec!(600.00));

    let summary = harness
        .orchestrator(analyzer, 2)
        .run_cycle_at(TemporalFixtures::cycle_time())
        .await;

    assert_eq!(summary.audit.rejected, 1);
    let claim = harness.store.claim(claim_id).await.unwrap();
    assert_audit(&claim, Some(AuditStatus::Rejected), Some("parts"));
    assert!(!claim.audit_reason.unwrap_or_default().contains("labour"));
}

#[tokio::test]
async fn test_failed_transfer_leaves_claim_partial_and_unaudited() {
    let harness = Harness::new().await;
    let claim_id = IdFixtures::claim_id();
    harness.add_claim(claim_id, 2).await;
    let broken = IdFixtures::file_id_for(claim_id, 1);
    harness.transfer.fail(broken.clone(), "HTTP error 503").await;

    let summary = harness
        .orchestrator(declared_amounts(claim_id), 2)
        .run_cycle_at(TemporalFixtures::cycle_time())
        .await;

    assert_eq!(summary.downloads.downloaded, 1);
    assert_eq!(summary.downloads.failed, 1);
    assert_eq!(summary.processing.processed, 0);

    let claim = harness.store.claim(claim_id).await.unwrap();
    assert_attachment(&claim, AttachmentStatus::Partial, 1, 2);
    assert_audit(&claim, None, None);

    let record = harness.store.file(&broken).await.unwrap();
    assert_eq!(record.status, FileStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("HTTP error 503"));
    assert!(record.local_path.is_none());
}

#[tokio::test]
async fn test_retry_reuses_unchanged_download() {
    let harness = Harness::new().await;
    let claim_id = IdFixtures::claim_id();
    harness.add_claim(claim_id, 2).await;
    let healthy = IdFixtures::file_id_for(claim_id, 0);
    let broken = IdFixtures::file_id_for(claim_id, 1);
    harness.transfer.fail(broken.clone(), "HTTP error 503").await;

    let orchestrator = harness.orchestrator(declared_amounts(claim_id), 2);
    orchestrator.run_cycle_at(TemporalFixtures::cycle_time()).await;

    harness.transfer.succeed(&broken).await;
    let second = orchestrator
        .run_cycle_at(TemporalFixtures::cycle_time() + Duration::hours(1))
        .await;

    assert_eq!(second.claims_selected, 1);
    assert_eq!(
        second.downloads,
        DownloadSummary { downloaded: 1, reused: 1, failed: 0, write_failures: 0 }
    );

    let requests = harness.transfer.requests().await;
    assert_eq!(requests.iter().filter(|r| r.file_id == healthy).count(), 1);
    assert_eq!(requests.iter().filter(|r| r.file_id == broken).count(), 2);

    let claim = harness.store.claim(claim_id).await.unwrap();
    assert_attachment(&claim, AttachmentStatus::Complete, 2, 2);
    assert_audit(&claim, Some(AuditStatus::Complete), None);
}

#[tokio::test]
async fn test_complete_claim_is_not_selected_again() {
    let harness = Harness::new().await;
    let claim_id = IdFixtures::claim_id();
    harness.add_claim(claim_id, 1).await;

    let orchestrator = harness.orchestrator(declared_amounts(claim_id), 1);
    orchestrator.run_cycle_at(TemporalFixtures::cycle_time()).await;
    let second = orchestrator
        .run_cycle_at(TemporalFixtures::cycle_time() + Duration::hours(1))
        .await;

    assert_eq!(second.claims_selected, 0);
    assert_eq!(second.files_resolved, 0);
    assert_eq!(harness.transfer.requests().await.len(), 1);
}

#[tokio::test]
async fn test_upstream_update_downloads_again_without_reopening_audit() {
    let harness = Harness::new().await;
    let claim_id = IdFixtures::claim_id();
    harness.add_claim(claim_id, 2).await;

    let orchestrator = harness.orchestrator(declared_amounts(claim_id), 2);
    orchestrator.run_cycle_at(TemporalFixtures::cycle_time()).await;

    harness
        .source
        .put_claim(
            UpstreamClaimBuilder::new()
                .with_claim_id(claim_id)
                .with_updated_at(TemporalFixtures::upstream_amended_at())
                .build(),
        )
        .await;
    let second = orchestrator
        .run_cycle_at(TemporalFixtures::cycle_time() + Duration::hours(1))
        .await;

    assert_eq!(second.downloads.downloaded, 2);
    assert_eq!(second.downloads.reused, 0);
    assert_eq!(second.processing.processed, 0);

    let claim = harness.store.claim(claim_id).await.unwrap();
    assert_eq!(claim.upstream_updated_at, TemporalFixtures::upstream_amended_at());
    assert_attachment(&claim, AttachmentStatus::Complete, 2, 2);
    assert_audit(&claim, Some(AuditStatus::Complete), None);

    for record in harness.store.all_files().await {
        assert!(record.is_latest_version);
        assert_eq!(record.claim_last_modified, Some(TemporalFixtures::upstream_amended_at()));
    }
}

#[tokio::test]
async fn test_failed_fetch_for_amended_claim_keeps_audit_pending() {
    let harness = Harness::new().await;
    let claims = [IdFixtures::claim_id(), IdFixtures::other_claim_id()];
    let mut analyzer = FixedAmountsAnalyzer::new();
    for claim_id in claims {
        harness.add_claim(claim_id, 1).await;
        analyzer = analyzer.with_amounts(claim_id, dec!(1000.00), dec!(500.00));
    }
    let ports = ServicePorts {
        source: harness.source.clone(),
        store: harness.store.clone(),
        reports: harness.store.clone(),
        transfer: harness.transfer.clone(),
        analyzer: Arc::new(analyzer),
    };
    let mut settings = settings(2);
    settings.matching.max_claims_per_batch = 1;
    let orchestrator = CycleOrchestrator::new(ports, settings);

    orchestrator.run_cycle_at(TemporalFixtures::cycle_time()).await;

    let mut waiting = None;
    for claim_id in claims {
        let claim = harness.store.claim(claim_id).await.unwrap();
        if claim.audit_status == Some(AuditStatus::Pending) {
            waiting = Some(claim_id);
        }
    }
    let waiting = waiting.unwrap();
    assert_attachment(&harness.store.claim(waiting).await.unwrap(), AttachmentStatus::Complete, 1, 1);

    harness
        .source
        .put_claim(
            UpstreamClaimBuilder::new()
                .with_claim_id(waiting)
                .with_updated_at(TemporalFixtures::upstream_amended_at())
                .build(),
        )
        .await;
    harness.source.fail_files_for(waiting).await;
    orchestrator
        .run_cycle_at(TemporalFixtures::cycle_time() + Duration::hours(1))
        .await;

    let claim = harness.store.claim(waiting).await.unwrap();
    assert_attachment(&claim, AttachmentStatus::Pending, 0, 1);
    assert_audit(&claim, Some(AuditStatus::Pending), None);
    assert_completeness_invariant(&claim, &harness.store.all_files().await);
}

#[tokio::test]
async fn test_worker_count_does_not_change_outcome() {
    let claims = [IdFixtures::claim_id(), IdFixtures::other_claim_id(), ClaimId::new(1_000_003)];
    let mut outcomes = Vec::new();

    for workers in [1, 8] {
        let harness = Harness::new().await;
        let mut analyzer = FixedAmountsAnalyzer::new();
        for (position, claim_id) in claims.iter().enumerate() {
            harness.add_claim(*claim_id, position + 2).await;
            analyzer = analyzer.with_amounts(*claim_id, dec!(1000.00), dec!(500.00));
        }
        harness
            .transfer
            .fail(IdFixtures::file_id_for(claims[2], 0), "HTTP error 404")
            .await;

        let summary = harness
            .orchestrator(analyzer, workers)
            .run_cycle_at(TemporalFixtures::cycle_time())
            .await;
        assert_eq!(summary.files_resolved, 2 + 3 + 4);

        let mut state = Vec::new();
        for claim_id in claims {
            let claim = harness.store.claim(claim_id).await.unwrap();
            assert_completeness_invariant(&claim, &harness.store.all_files().await);
            state.push((
                claim_id,
                claim.attachment_status,
                claim.downloaded_files_count,
                claim.total_files_count,
                claim.audit_status,
            ));
        }
        outcomes.push((summary.downloads, state));
    }

    assert_eq!(outcomes[0], outcomes[1]);
    let (downloads, state) = &outcomes[0];
    assert_eq!(downloads.downloaded, 8);
    assert_eq!(downloads.failed, 1);
    assert_eq!(state[2].1, AttachmentStatus::Partial);
}

#[tokio::test]
async fn test_unknown_region_selects_nothing() {
    let harness = Harness::new().await;
    harness.add_claim(IdFixtures::claim_id(), 1).await;
    let mut settings = settings(2);
    settings.claim_query.region_name = "ATLANTIS".to_string();

    let ports = ServicePorts {
        source: harness.source.clone(),
        store: harness.store.clone(),
        reports: harness.store.clone(),
        transfer: harness.transfer.clone(),
        analyzer: Arc::new(FixedAmountsAnalyzer::new()),
    };
    let summary = CycleOrchestrator::new(ports, settings)
        .run_cycle_at(TemporalFixtures::cycle_time())
        .await;

    assert_eq!(summary.claims_selected, 0);
    assert!(harness.transfer.requests().await.is_empty());
    assert!(harness.store.claim(IdFixtures::claim_id()).await.is_none());
}

#[tokio::test]
async fn test_store_write_failure_is_counted_not_fatal() {
    let harness = Harness::new().await;
    let claim_id = IdFixtures::claim_id();
    harness.add_claim(claim_id, 2).await;
    harness
        .store
        .fail_merges_for(IdFixtures::file_id_for(claim_id, 1))
        .await;

    let summary = harness
        .orchestrator(declared_amounts(claim_id), 2)
        .run_cycle_at(TemporalFixtures::cycle_time())
        .await;

    assert_eq!(summary.downloads.downloaded, 1);
    assert_eq!(summary.downloads.write_failures, 1);
    let claim = harness.store.claim(claim_id).await.unwrap();
    assert_attachment(&claim, AttachmentStatus::Partial, 1, 2);
}
