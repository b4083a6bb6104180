//! Monitoring report tests over the in-memory tracking store

use std::sync::Arc;

use chrono::{Duration, Utc};

use core_kernel::FileId;
use domain_claims::{DownloadReportPort, FileRecord, FileStatus, InMemoryTrackingStore, TrackingStorePort};
use interface_service::DownloadMonitor;
use test_utils::{DownloadOutcomeBuilder, IdFixtures};

async fn seeded_store() -> Arc<InMemoryTrackingStore> {
    let store = Arc::new(InMemoryTrackingStore::new());
    let claim_id = IdFixtures::claim_id();

    for index in 0..3 {
        let outcome = DownloadOutcomeBuilder::success()
            .with_file_id(IdFixtures::file_id_for(claim_id, index))
            .build();
        store.merge_file_record(&outcome).await.unwrap();
    }
    let failed = DownloadOutcomeBuilder::failure("HTTP error 404")
        .with_file_id(IdFixtures::file_id_for(claim_id, 3))
        .build();
    store.merge_file_record(&failed).await.unwrap();

    store
}

/// A superseded FAILED record written `days` ago
fn stale_failure(file_id: &str, days: i64) -> FileRecord {
    let outcome = DownloadOutcomeBuilder::failure("Request error: connection reset")
        .with_file_id(FileId::new(file_id))
        .build();
    let mut record = FileRecord::merge(None, &outcome, Utc::now() - Duration::days(days));
    record.is_latest_version = false;
    record
}

#[tokio::test]
async fn test_health_counts_by_status() {
    let store = seeded_store().await;
    let monitor = DownloadMonitor::new(store.clone());

    let report = monitor.health(Utc::now()).await.unwrap();

    assert_eq!(report.statistics.total(), 4);
    assert_eq!(report.statistics.count_of(FileStatus::Success), 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.last_24_hours, 4);

    let text = report.to_string();
    assert!(text.contains("Total files tracked: 4"));
    assert!(text.contains("SUCCESS: 3 (75.0%)"));
    assert!(text.contains("Failed downloads: 1"));
}

#[tokio::test]
async fn test_health_of_empty_store() {
    let monitor = DownloadMonitor::new(Arc::new(InMemoryTrackingStore::new()));

    let report = monitor.health(Utc::now()).await.unwrap();

    assert_eq!(report.statistics.total(), 0);
    assert!(report.to_string().contains("No failed downloads"));
}

#[tokio::test]
async fn test_recent_activity_excludes_older_records() {
    let store = seeded_store().await;
    store.insert_file(stale_failure("OLD-1", 3)).await;
    let monitor = DownloadMonitor::new(store.clone());

    let recent = monitor.recent_activity(24, Utc::now()).await.unwrap();

    assert_eq!(recent.records.len(), 4);
    assert!(recent.records.iter().all(|record| record.file_id.as_str() != "OLD-1"));
    assert!(recent.to_string().contains("Last 24 hours"));
}

#[tokio::test]
async fn test_failed_report_lists_failures_oldest_first() {
    let store = seeded_store().await;
    store.insert_file(stale_failure("OLD-1", 3)).await;
    let monitor = DownloadMonitor::new(store.clone());

    let failed = monitor.failed().await.unwrap();

    let ids: Vec<&str> = failed.records.iter().map(|record| record.file_id.as_str()).collect();
    assert_eq!(ids, vec!["OLD-1", IdFixtures::file_id_for(IdFixtures::claim_id(), 3).as_str()]);
    assert!(failed.to_string().contains("HTTP error 404"));
}

#[tokio::test]
async fn test_cleanup_requires_confirmation() {
    let store = seeded_store().await;
    store.insert_file(stale_failure("OLD-1", 45)).await;
    store.insert_file(stale_failure("RECENT-1", 5)).await;
    let monitor = DownloadMonitor::new(store.clone());

    let dry_run = monitor.cleanup(30, false, Utc::now()).await.unwrap();
    assert_eq!(dry_run.candidates, 1);
    assert_eq!(dry_run.deleted, None);
    assert!(store.file(&FileId::new("OLD-1")).await.is_some());

    let confirmed = monitor.cleanup(30, true, Utc::now()).await.unwrap();
    assert_eq!(confirmed.deleted, Some(1));
    assert!(store.file(&FileId::new("OLD-1")).await.is_none());
    assert!(store.file(&FileId::new("RECENT-1")).await.is_some());
    assert_eq!(store.all_files().await.len(), 5);
}

#[tokio::test]
async fn test_reset_failed_without_ids_resets_all() {
    let store = seeded_store().await;
    store.insert_file(stale_failure("OLD-1", 3)).await;
    let monitor = DownloadMonitor::new(store.clone());

    assert_eq!(monitor.reset_failed(&[]).await.unwrap(), 2);
    assert!(store.failed_downloads().await.unwrap().is_empty());

    let record = store.file(&FileId::new("OLD-1")).await.unwrap();
    assert_eq!(record.status, FileStatus::Pending);
    assert_eq!(record.error_message, None);
}

#[tokio::test]
async fn test_reset_failed_for_selected_ids() {
    let store = seeded_store().await;
    store.insert_file(stale_failure("OLD-1", 3)).await;
    let monitor = DownloadMonitor::new(store.clone());

    assert_eq!(monitor.reset_failed(&[FileId::new("OLD-1")]).await.unwrap(), 1);
    assert_eq!(store.failed_downloads().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_export_includes_daily_breakdown() {
    let store = seeded_store().await;
    let monitor = DownloadMonitor::new(store.clone());
    let now = Utc::now();

    let export = monitor.export(now).await.unwrap();

    assert_eq!(export.generated_at, now);
    assert_eq!(export.daily.iter().map(|day| day.count).sum::<u64>(), 4);
    let text = export.to_string();
    assert!(text.contains("Daily Breakdown (Last 30 Days)"));
    assert!(text.contains("Status: FAILED"));
    assert!(text.contains(&format!("{} - SUCCESS: 3", now.format("%Y-%m-%d"))));
}
